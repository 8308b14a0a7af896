// ABOUTME: Cache keys deciding whether a sandbox's previous build output can be reused
// ABOUTME: Locked versions map to their id, drafts and standalone builds get fresh random keys

use flowbox_core::{generate_id, FlowVersion};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Immutable flow version; the key is the version id
    Locked(String),
    /// Draft flow version; unique per attempt
    Draft(String),
    /// Standalone build with no flow version behind it
    Ephemeral(String),
}

impl CacheKey {
    pub fn for_flow_version(version: &FlowVersion) -> Self {
        if version.is_draft() {
            Self::draft(&version.id)
        } else {
            Self::locked(&version.id)
        }
    }

    pub fn locked(flow_version_id: &str) -> Self {
        Self::Locked(flow_version_id.to_string())
    }

    pub fn draft(flow_version_id: &str) -> Self {
        Self::Draft(format!("{}-draft{}", flow_version_id, generate_id()))
    }

    pub fn ephemeral() -> Self {
        Self::Ephemeral(generate_id())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Locked(key) | Self::Draft(key) | Self::Ephemeral(key) => key,
        }
    }

    /// Only locked keys may keep a sandbox marked as cached
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Locked(_))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbox_core::{FlowStep, FlowVersionState, StepSettings, TriggerSettings, TriggerSource};

    fn version(state: FlowVersionState) -> FlowVersion {
        FlowVersion {
            id: "fv-42".to_string(),
            flow_id: "flow-1".to_string(),
            display_name: "Test".to_string(),
            state,
            trigger: FlowStep {
                name: "trigger".to_string(),
                display_name: "Trigger".to_string(),
                settings: StepSettings::Trigger(TriggerSettings {
                    source: TriggerSource::Empty,
                }),
                next_action: None,
            },
        }
    }

    #[test]
    fn test_locked_key_is_version_id() {
        let key = CacheKey::for_flow_version(&version(FlowVersionState::Locked));
        assert_eq!(key, CacheKey::Locked("fv-42".to_string()));
        assert_eq!(key.to_string(), "fv-42");
        assert!(key.is_cacheable());
    }

    #[test]
    fn test_draft_keys_are_unique() {
        let draft = version(FlowVersionState::Draft);
        let first = CacheKey::for_flow_version(&draft);
        let second = CacheKey::for_flow_version(&draft);

        assert_ne!(first, second);
        assert!(first.as_str().starts_with("fv-42-draft"));
        assert!(!first.is_cacheable());
    }

    #[test]
    fn test_ephemeral_key() {
        let key = CacheKey::ephemeral();
        assert_eq!(key.as_str().len(), flowbox_core::ID_LENGTH);
        assert!(!key.is_cacheable());
    }
}
