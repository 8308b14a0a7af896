// ABOUTME: Compiles zipped TypeScript sources into an artifact with index.js and package.json
// ABOUTME: Used for flow code steps, standalone isolated builds and unpacking pre-built artifacts

use flowbox_core::{FileId, CODES_DIR};
use flowbox_sandbox::{CacheKey, PoolError, SandboxPool};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

use crate::archive::{self, ArchiveError, ArchiveFile};
use crate::package_manager::{Dependencies, DependencyInstaller, InstallError, LocalTool};

pub const TSCONFIG_FILE: &str = "tsconfig.json";
pub const ENTRY_POINT_FILE: &str = "index.js";
pub const MANIFEST_FILE: &str = "package.json";

pub const TSCONFIG: &str = r#"{
    "extends": "@tsconfig/node18/tsconfig.json",
    "compilerOptions": {
        "strict": false
    }
}"#;

pub const BUILD_DEPENDENCIES: [(&str, &str); 2] =
    [("@tsconfig/node18", "1.0.0"), ("typescript", "4.8.4")];

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Dependency install failed: {0}")]
    Install(#[from] InstallError),

    #[error("Build did not produce {file} in {dir}")]
    MissingOutput { file: String, dir: PathBuf },

    #[error("Build I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] PoolError),

    #[error("Identifier '{0}' is not a plain relative path")]
    UnsafePath(String),
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// A code step's zipped source, resolved from its artifact source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeStep {
    pub source_id: FileId,
    pub zip_file: Vec<u8>,
}

/// Zip holding the compiled entry point and the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    archive: Vec<u8>,
}

impl BuildArtifact {
    pub fn from_bytes(archive: Vec<u8>) -> Self {
        Self { archive }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.archive
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.archive
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }
}

#[derive(Clone)]
pub struct CodeBuilder {
    installer: Arc<dyn DependencyInstaller>,
}

impl CodeBuilder {
    pub fn new(installer: Arc<dyn DependencyInstaller>) -> Self {
        Self { installer }
    }

    pub fn installer(&self) -> &Arc<dyn DependencyInstaller> {
        &self.installer
    }

    /// Build `source_archive` in `dir`. Compiled files stay on disk.
    pub async fn build(&self, dir: &Path, source_archive: &[u8]) -> Result<BuildArtifact> {
        let start = Instant::now();
        info!("Code build started in {}", dir.display());

        match self.run_build(dir, source_archive).await {
            Ok(artifact) => {
                info!(
                    "Code build finished in {} ({} ms, {} bytes)",
                    dir.display(),
                    start.elapsed().as_millis(),
                    artifact.len()
                );
                Ok(artifact)
            }
            Err(e) => {
                error!("Code build failed in {}: {}", dir.display(), e);
                Err(e)
            }
        }
    }

    async fn run_build(&self, dir: &Path, source_archive: &[u8]) -> Result<BuildArtifact> {
        archive::decompress_async(source_archive.to_vec(), dir.to_path_buf()).await?;
        tokio::fs::write(dir.join(TSCONFIG_FILE), TSCONFIG).await?;

        let dependencies: Dependencies = BUILD_DEPENDENCIES
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect();
        self.installer.add_dependencies(dir, &dependencies).await?;
        self.installer.run_local_tool(dir, LocalTool::Tsc).await?;

        let mut files = Vec::with_capacity(2);
        for name in [ENTRY_POINT_FILE, MANIFEST_FILE] {
            let content = match tokio::fs::read(dir.join(name)).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(BuildError::MissingOutput {
                        file: name.to_string(),
                        dir: dir.to_path_buf(),
                    })
                }
                Err(e) => return Err(e.into()),
            };
            files.push(ArchiveFile::new(name, content));
        }

        let bytes = archive::compress_async(files).await?;
        Ok(BuildArtifact::from_bytes(bytes))
    }

    /// Build a flow's code step under `<build_root>/codes/<source_id>`
    pub async fn build_code_step(&self, build_root: &Path, step: &CodeStep) -> Result<BuildArtifact> {
        let dir = build_root.join(CODES_DIR).join(relative_dir(&step.source_id)?);
        tokio::fs::create_dir_all(&dir).await?;
        self.build(&dir, &step.zip_file).await
    }

    /// Build in a fresh ephemeral sandbox that goes back to the pool on every path
    pub async fn build_isolated(&self, pool: &SandboxPool, source_archive: &[u8]) -> Result<BuildArtifact> {
        let lease = pool.acquire(CacheKey::ephemeral()).await?;
        lease.recreate().await?;
        self.build(lease.folder_path(), source_archive).await
    }
}

/// Extract a pre-built artifact into `<sandbox_dir>/<artifact_id>`
pub async fn unpack_artifact(sandbox_dir: &Path, artifact_id: &str, artifact: &[u8]) -> Result<PathBuf> {
    let output = sandbox_dir.join(relative_dir(artifact_id)?);
    archive::decompress_async(artifact.to_vec(), output.clone()).await?;
    Ok(output)
}

/// Ids become directory names; anything but normal components would leave the parent
fn relative_dir(id: &str) -> Result<&Path> {
    let path = Path::new(id);
    let plain = !id.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if !plain {
        return Err(BuildError::UnsafePath(id.to_string()));
    }
    Ok(path)
}
