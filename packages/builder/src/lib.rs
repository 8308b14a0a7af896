// ABOUTME: Build pipeline turning zipped untrusted sources into runnable artifacts
// ABOUTME: Ships the zip archive codec and the pnpm-backed dependency installer

pub mod archive;
pub mod code_builder;
pub mod package_manager;

pub use archive::{ArchiveError, ArchiveFile};
pub use code_builder::{unpack_artifact, BuildArtifact, BuildError, CodeBuilder, CodeStep};
pub use package_manager::{
    CommandOutput, Dependencies, DependencyInstaller, InstallError, LocalTool, PnpmInstaller,
};
