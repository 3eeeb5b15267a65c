//! Write tool - Create or overwrite files

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;
use tracing::info;

use super::FileChange;
use crate::tools::registry::{Preview, Tool, ToolKind};
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct WriteTool;

#[derive(Deserialize)]
struct Params {
    file_path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteTool {
    type Plan = FileChange;

    fn kind(&self) -> ToolKind {
        ToolKind::Write
    }

    fn description(&self) -> &'static str {
        "Create or overwrite a file. Creates parent directories if needed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file, absolute or relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["file_path", "content"],
            "additionalProperties": false
        })
    }

    async fn prepare(&self, params: Value, ctx: &ToolContext) -> Result<FileChange, ToolResult> {
        let params = parse_params::<Params>(params)?;
        let path = ctx.resolve_path(&params.file_path);

        if path.is_dir() {
            return Err(ToolResult::error(format!("Path is a directory: {}", path.display())));
        }

        let original = if path.exists() {
            match fs::read_to_string(&path).await {
                Ok(c) => Some(c),
                Err(e) => return Err(ToolResult::error(format!("Failed to read file: {}", e))),
            }
        } else {
            None
        };

        Ok(FileChange::new(path, original, params.content))
    }

    fn preview(&self, plan: &FileChange) -> Preview {
        let verb = if plan.original.is_some() { "Overwrite" } else { "Create" };
        plan.preview(verb)
    }

    async fn apply(&self, plan: FileChange, _ctx: &ToolContext) -> ToolResult {
        info!(path = %plan.path.display(), "Write tool: writing file");
        if let Err(e) = plan.commit().await {
            return ToolResult::error(e);
        }

        let lines = plan.updated.lines().count();
        ToolResult::success_data_with(
            json!({
                "message": format!("Successfully wrote {} lines", lines),
                "bytes_written": plan.updated.len(),
                "file_path": plan.path.display().to_string()
            }),
            Vec::new(),
            Some(plan.diff),
            None,
        )
        .with_short_result(format!("wrote {} lines", lines))
    }
}
