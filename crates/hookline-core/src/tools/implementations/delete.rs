//! Delete tool - Remove a single file

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{Preview, Tool, ToolKind};
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct DeleteTool;

#[derive(Deserialize)]
struct Params {
    file_path: String,
}

pub struct DeletePlan {
    path: PathBuf,
    bytes: u64,
}

#[async_trait]
impl Tool for DeleteTool {
    type Plan = DeletePlan;

    fn kind(&self) -> ToolKind {
        ToolKind::Delete
    }

    fn description(&self) -> &'static str {
        "Delete a file. Directories are not supported."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to delete"
                }
            },
            "required": ["file_path"],
            "additionalProperties": false
        })
    }

    async fn prepare(&self, params: Value, ctx: &ToolContext) -> Result<DeletePlan, ToolResult> {
        let params = parse_params::<Params>(params)?;
        let path = ctx.resolve_path(&params.file_path);

        let metadata = match fs::symlink_metadata(&path).await {
            Ok(m) => m,
            Err(_) => return Err(ToolResult::error(format!("File not found: {}", params.file_path))),
        };
        if metadata.is_dir() {
            return Err(ToolResult::invalid_parameters(format!(
                "{} is a directory; only files can be deleted",
                path.display()
            )));
        }

        Ok(DeletePlan {
            path,
            bytes: metadata.len(),
        })
    }

    fn preview(&self, plan: &DeletePlan) -> Preview {
        Preview::summary(format!("Delete {} ({} bytes)", plan.path.display(), plan.bytes))
    }

    async fn apply(&self, plan: DeletePlan, _ctx: &ToolContext) -> ToolResult {
        match fs::remove_file(&plan.path).await {
            Ok(()) => ToolResult::success_data(json!({
                "message": format!("Deleted {}", plan.path.display()),
                "file_path": plan.path.display().to_string()
            }))
            .with_short_result("deleted"),
            Err(e) => ToolResult::error(format!("Failed to delete file: {}", e)),
        }
    }
}
