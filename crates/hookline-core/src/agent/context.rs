//! Project memory loaded at session start.

use std::path::Path;

use tracing::{debug, info};

use crate::blocks::BlockStore;

/// Instruction files to search for in the working directory (priority order).
const PROJECT_FILES: &[&str] = &["HOOKLINE.md", "hookline.md", "AGENTS.md", "CLAUDE.md"];

/// First non-empty project instruction file as `(file name, content)`
pub async fn load_project_memory(working_dir: &Path) -> Option<(String, String)> {
    for name in PROJECT_FILES {
        let path = working_dir.join(name);
        let Ok(content) = tokio::fs::read_to_string(&path).await else {
            continue;
        };
        let content = content.trim();
        if content.is_empty() {
            debug!("Ignoring empty project file {:?}", path);
            continue;
        }
        info!("Loaded project memory from {:?}", path);
        return Some(((*name).to_string(), content.to_string()));
    }
    None
}

/// Add project memory as a leading user message; returns whether any was found
pub async fn seed_project_memory(store: &mut BlockStore, working_dir: &Path) -> bool {
    match load_project_memory(working_dir).await {
        Some((source, content)) => {
            store.push_memory(source, content);
            true
        }
        None => false,
    }
}
