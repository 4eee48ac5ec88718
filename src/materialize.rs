use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use crate::error::{Result, StencilError};

/// The single-shot write of a rendered artifact.
pub trait Materializer {
    /// Create `folder` if needed, then create `folder/name`. Never overwrites.
    fn write_artifact(&mut self, folder: &str, name: &str, content: &str) -> Result<PathBuf>;
}

/// Writes Markdown files under a vault root.
#[derive(Debug, Clone)]
pub struct VaultMaterializer {
    root: PathBuf,
}

impl VaultMaterializer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Materializer for VaultMaterializer {
    fn write_artifact(&mut self, folder: &str, name: &str, content: &str) -> Result<PathBuf> {
        let dir = self.root.join(folder);
        let target = dir.join(format!("{name}.md"));

        let failed = |reason: String| StencilError::Materialization {
            path: target.clone(),
            reason,
        };

        fs::create_dir_all(&dir).map_err(|err| failed(err.to_string()))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => failed("file already exists".to_string()),
                _ => failed(err.to_string()),
            })?;

        file.write_all(content.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|err| failed(err.to_string()))?;

        tracing::info!("created {}", target.display());
        Ok(target)
    }
}

/// Make a title safe to use as a file name: drop characters most file
/// systems or vault links reject, collapse whitespace, trim.
pub fn sanitize_file_name(title: &str) -> String {
    const FORBIDDEN: [char; 13] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|', '#', '^', '[', ']'];

    title
        .chars()
        .filter(|ch| !FORBIDDEN.contains(ch))
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
