//! Destinations for exported documents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Receives finished documents.
pub trait DocumentSink {
    /// Persist a document under `filename`.
    fn save_file(&self, filename: &str, bytes: &[u8]) -> io::Result<()>;

    /// Show a document to the user without saving it as a download.
    fn open_in_viewer(&self, title: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Writes downloads to one directory and previews to another.
///
/// Directories are created on first use. Path separators in names are
/// replaced so every file lands directly inside its directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    downloads: PathBuf,
    previews: PathBuf,
}

impl DirectorySink {
    pub fn new(downloads: impl Into<PathBuf>, previews: impl Into<PathBuf>) -> Self {
        Self {
            downloads: downloads.into(),
            previews: previews.into(),
        }
    }

    pub fn downloads(&self) -> &Path {
        &self.downloads
    }

    pub fn previews(&self) -> &Path {
        &self.previews
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(dir)?;
        let path = dir.join(safe_file_name(name));
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "document written");
        Ok(())
    }
}

impl DocumentSink for DirectorySink {
    fn save_file(&self, filename: &str, bytes: &[u8]) -> io::Result<()> {
        Self::write(&self.downloads, filename, bytes)
    }

    fn open_in_viewer(&self, title: &str, bytes: &[u8]) -> io::Result<()> {
        Self::write(&self.previews, title, bytes)
    }
}

/// Make `name` usable as a single path component.
pub fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_to_separate_directories() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path().join("downloads"), dir.path().join("preview"));

        sink.save_file("a.pdf", b"one").unwrap();
        sink.open_in_viewer("b.pdf", b"two").unwrap();

        assert_eq!(fs::read(dir.path().join("downloads/a.pdf")).unwrap(), b"one");
        assert_eq!(fs::read(dir.path().join("preview/b.pdf")).unwrap(), b"two");
        assert!(!dir.path().join("downloads/b.pdf").exists());
    }

    #[test]
    fn test_source_with_separator_stays_inside() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path(), dir.path());
        sink.save_file("OPD_Indent_IPD/OPD_2025-01-02.pdf", b"x").unwrap();
        assert!(dir.path().join("OPD_Indent_IPD_OPD_2025-01-02.pdf").exists());
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("Kaunter 1: Farmasi"), "Kaunter 1_ Farmasi");
        assert_eq!(safe_file_name(".."), "_");
        assert_eq!(safe_file_name("  "), "_");
    }
}
