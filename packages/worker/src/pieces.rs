// ABOUTME: Default piece installer backed by the package manager
// ABOUTME: Installs referenced pieces into the sandbox as name@version dependencies

use async_trait::async_trait;
use flowbox_builder::{Dependencies, DependencyInstaller};
use flowbox_core::PieceRef;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::collaborators::{CollaboratorError, PieceInstaller};

pub struct PackageManagerPieceInstaller {
    installer: Arc<dyn DependencyInstaller>,
}

impl PackageManagerPieceInstaller {
    pub fn new(installer: Arc<dyn DependencyInstaller>) -> Self {
        Self { installer }
    }
}

pub fn piece_dependencies(pieces: &[PieceRef]) -> Dependencies {
    pieces
        .iter()
        .map(|piece| (piece.piece_name.clone(), piece.piece_version.clone()))
        .collect()
}

#[async_trait]
impl PieceInstaller for PackageManagerPieceInstaller {
    async fn install(&self, path: &Path, pieces: &[PieceRef]) -> Result<(), CollaboratorError> {
        if pieces.is_empty() {
            return Ok(());
        }

        info!("Installing {} pieces in {}", pieces.len(), path.display());
        self.installer
            .add_dependencies(path, &piece_dependencies(pieces))
            .await
            .map_err(|e| CollaboratorError::Failed(format!("Piece install failed: {}", e)))?;
        Ok(())
    }
}
