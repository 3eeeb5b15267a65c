//! Tool implementations
//!
//! Built-in tools:
//! - Read: Read files (read-only)
//! - List: List a directory (read-only)
//! - Write: Create/overwrite files
//! - Edit: Exact string replacement in one file
//! - MultiEdit: Several exact replacements in one file, all or nothing
//! - Delete: Remove a file
//! - Bash: Execute shell commands

pub mod bash;
pub mod delete;
pub mod edit;
pub mod list;
pub mod multiedit;
pub mod read;
pub mod write;

use std::path::PathBuf;

use tokio::fs;

pub use bash::BashTool;
pub use delete::DeleteTool;
pub use edit::EditTool;
pub use list::ListTool;
pub use multiedit::MultiEditTool;
pub use read::ReadTool;
pub use write::WriteTool;

use super::diff::generate_compact_diff;
use super::registry::Preview;

/// A computed, not yet written, file change
///
/// Shared plan type of the file-writing tools.
pub struct FileChange {
    pub path: PathBuf,
    /// Content seen while preparing; None for a new file
    pub original: Option<String>,
    pub updated: String,
    pub diff: String,
}

impl FileChange {
    pub fn new(path: PathBuf, original: Option<String>, updated: String) -> Self {
        let diff = generate_compact_diff(original.as_deref().unwrap_or(""), &updated, &path);
        Self {
            path,
            original,
            updated,
            diff,
        }
    }

    pub fn preview(&self, verb: &str) -> Preview {
        Preview::summary(format!("{} {}", verb, self.path.display())).with_diff(self.diff.clone())
    }

    /// Write the change, refusing if the file moved on since `prepare`
    pub async fn commit(&self) -> Result<(), String> {
        let current = match fs::read_to_string(&self.path).await {
            Ok(c) => Some(c),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(format!("Failed to read file: {}", e)),
        };
        if current != self.original {
            return Err(format!(
                "File {} changed since the edit was prepared; read it again",
                self.path.display()
            ));
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.exists()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create directory: {}", e))?;
        }
        fs::write(&self.path, &self.updated)
            .await
            .map_err(|e| format!("Failed to write file: {}", e))
    }
}

/// Read a file that must exist, for edit-style tools
pub(crate) async fn read_existing(path: &std::path::Path, shown: &str) -> Result<String, super::ToolResult> {
    if !path.exists() {
        return Err(super::ToolResult::error(format!("File not found: {}", shown)));
    }
    if !path.is_file() {
        return Err(super::ToolResult::error(format!("Path is not a file: {}", path.display())));
    }
    fs::read_to_string(path)
        .await
        .map_err(|e| super::ToolResult::error(format!("Failed to read file: {}", e)))
}

/// Shorten a search string for error messages
pub(crate) fn snippet(text: &str) -> String {
    if text.chars().count() > 60 {
        let prefix: String = text.chars().take(57).collect();
        format!("{}...", prefix)
    } else {
        text.to_string()
    }
}
