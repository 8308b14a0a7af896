// ABOUTME: Flow definition types: versions, the closed step union and piece references
// ABOUTME: Provides exhaustive traversal used to find code steps and referenced pieces

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ProjectId = String;
pub type FlowId = String;
pub type FlowVersionId = String;
pub type FlowRunId = String;
pub type FileId = String;

/// Whether a flow version can still be edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowVersionState {
    /// Mutable in place; built code may change between runs
    Draft,
    /// Published and immutable
    Locked,
}

impl FlowVersionState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::Locked => "locked",
        }
    }
}

/// A third-party integration package referenced by a step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PieceRef {
    pub piece_name: String,
    pub piece_version: String,
}

/// Where a flow's trigger gets its events from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSource {
    Empty,
    Webhook,
    Schedule {
        cron_expression: String,
    },
    Piece {
        piece_name: String,
        piece_version: String,
        trigger_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSettings {
    pub source: TriggerSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceActionSettings {
    pub piece_name: String,
    pub piece_version: String,
    pub action_name: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeActionSettings {
    /// File holding the zipped user source; required before the step can be built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_source_id: Option<FileId>,
    #[serde(default)]
    pub input: Value,
}

/// Settings of a single step. The set of step kinds is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepSettings {
    Trigger(TriggerSettings),
    PieceAction(PieceActionSettings),
    CodeAction(CodeActionSettings),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    pub name: String,
    pub display_name: String,
    pub settings: StepSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<FlowStep>>,
}

impl FlowStep {
    /// Referenced piece, if this step runs one
    pub fn piece(&self) -> Option<PieceRef> {
        match &self.settings {
            StepSettings::Trigger(trigger) => match &trigger.source {
                TriggerSource::Piece {
                    piece_name,
                    piece_version,
                    ..
                } => Some(PieceRef {
                    piece_name: piece_name.clone(),
                    piece_version: piece_version.clone(),
                }),
                TriggerSource::Empty | TriggerSource::Webhook | TriggerSource::Schedule { .. } => {
                    None
                }
            },
            StepSettings::PieceAction(action) => Some(PieceRef {
                piece_name: action.piece_name.clone(),
                piece_version: action.piece_version.clone(),
            }),
            StepSettings::CodeAction(_) => None,
        }
    }

    pub fn code_settings(&self) -> Option<&CodeActionSettings> {
        match &self.settings {
            StepSettings::CodeAction(code) => Some(code),
            StepSettings::Trigger(_) | StepSettings::PieceAction(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowVersion {
    pub id: FlowVersionId,
    pub flow_id: FlowId,
    pub display_name: String,
    pub state: FlowVersionState,
    pub trigger: FlowStep,
}

impl FlowVersion {
    pub fn is_draft(&self) -> bool {
        self.state == FlowVersionState::Draft
    }

    /// All steps in execution order, starting with the trigger
    pub fn all_steps(&self) -> Vec<&FlowStep> {
        let mut steps = Vec::new();
        let mut current = Some(&self.trigger);
        while let Some(step) = current {
            steps.push(step);
            current = step.next_action.as_deref();
        }
        steps
    }

    /// Code action steps, in execution order
    pub fn code_steps(&self) -> Vec<&FlowStep> {
        self.all_steps()
            .into_iter()
            .filter(|step| step.code_settings().is_some())
            .collect()
    }

    /// Pieces referenced by the trigger and piece actions, without duplicates
    pub fn referenced_pieces(&self) -> Vec<PieceRef> {
        let mut pieces: Vec<PieceRef> = Vec::new();
        for piece in self.all_steps().into_iter().filter_map(FlowStep::piece) {
            if !pieces.contains(&piece) {
                pieces.push(piece);
            }
        }
        pieces
    }
}
