// ABOUTME: Zip archive codec for source bundles and build artifacts
// ABOUTME: Rejects entries escaping the output directory; async wrappers use the blocking pool

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive entry escapes the output directory: {0}")]
    UnsafeEntry(String),

    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl ArchiveFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

pub fn compress(files: &[ArchiveFile]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        writer.start_file(file.name.as_str(), options)?;
        writer.write_all(&file.content)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Extract every entry of `bytes` below `output_path`, creating it if needed
pub fn decompress(bytes: &[u8], output_path: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    fs::create_dir_all(output_path)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
        let target = output_path.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        // Header sizes are untrusted; stream instead of preallocating
        let mut file = fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut file)?;
    }

    Ok(())
}

/// Names of the entries in an archive, in archive order
pub fn entry_names(bytes: &[u8]) -> Result<Vec<String>> {
    let archive = ZipArchive::new(Cursor::new(bytes))?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Read a single entry into memory
pub fn read_entry(bytes: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entry = archive.by_name(name)?;
    let mut content = Vec::new();
    entry.read_to_end(&mut content)?;
    Ok(content)
}

pub async fn compress_async(files: Vec<ArchiveFile>) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || compress(&files))
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))?
}

pub async fn decompress_async(bytes: Vec<u8>, output_path: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || decompress(&bytes, &output_path))
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))?
}
