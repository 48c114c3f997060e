use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Content root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// A markdown file found under a content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    pub absolute_path: PathBuf,
    /// Path relative to the content root
    pub relative_path: PathBuf,
    /// Containing directory relative to the content root (empty at the root)
    pub directory: PathBuf,
}

impl ContentFile {
    /// File name without extension
    pub fn stem(&self) -> String {
        self.relative_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.relative_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Directory relative to the root with `/` separators.
    pub fn section(&self) -> String {
        self.directory
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

pub struct ContentScanner {
    root: PathBuf,
    extension: String,
    recursive: bool,
}

impl ContentScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extension: "md".to_string(),
            recursive: true,
        }
    }

    /// Extension to look for, with or without the leading dot.
    pub fn extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Only look at files directly inside the root.
    pub fn flat(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Walk the whole tree and return every matching file, in file name
    /// order within each directory.
    pub fn scan(&self) -> Result<Vec<ContentFile>, ScanError> {
        if !self.root.is_dir() {
            return Err(ScanError::MissingRoot(self.root.clone()));
        }
        tracing::debug!(root = %self.root.display(), "Scanning content");

        let mut walker = WalkDir::new(&self.root).min_depth(1).sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let absolute_path = entry.path().to_path_buf();
            let relative_path = absolute_path
                .strip_prefix(&self.root)
                .map_err(|_| ScanError::InvalidPath(absolute_path.clone()))?
                .to_path_buf();
            let directory = relative_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();

            files.push(ContentFile {
                absolute_path,
                relative_path,
                directory,
            });
        }

        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy() == self.extension.as_str())
            .unwrap_or(false)
    }
}
