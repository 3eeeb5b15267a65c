//! List directory tool

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{Preview, Tool, ToolKind};
use crate::tools::{parse_params, ToolContext, ToolResult};

const DEFAULT_LIMIT: usize = 500;

pub struct ListTool;

#[derive(Deserialize)]
struct Params {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

pub struct ListPlan {
    path: PathBuf,
    limit: usize,
}

#[async_trait]
impl Tool for ListTool {
    type Plan = ListPlan;

    fn kind(&self) -> ToolKind {
        ToolKind::List
    }

    fn description(&self) -> &'static str {
        "List the entries of one directory, sorted by name. Directories end with '/'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory to list (default: working directory)"
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of entries to return (default: 500)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn prepare(&self, params: Value, ctx: &ToolContext) -> Result<ListPlan, ToolResult> {
        // Models sometimes send no arguments at all for "list cwd"
        let params = if params.is_null() { json!({}) } else { params };
        let params = parse_params::<Params>(params)?;
        let path = ctx.resolve_path(params.path.as_deref().unwrap_or("."));

        if !path.exists() {
            return Err(ToolResult::error(format!("Directory not found: {}", path.display())));
        }
        if !path.is_dir() {
            return Err(ToolResult::error(format!("Path is not a directory: {}", path.display())));
        }

        Ok(ListPlan {
            path,
            limit: params.limit.unwrap_or(DEFAULT_LIMIT).max(1),
        })
    }

    fn preview(&self, plan: &ListPlan) -> Preview {
        Preview::summary(format!("List {}", plan.path.display()))
    }

    async fn apply(&self, plan: ListPlan, _ctx: &ToolContext) -> ToolResult {
        let mut dir = match fs::read_dir(&plan.path).await {
            Ok(rd) => rd,
            Err(e) => return ToolResult::error(format!("Failed to read directory: {}", e)),
        };

        let mut entries: Vec<String> = Vec::new();
        loop {
            match dir.next_entry().await {
                Ok(Some(entry)) => {
                    let mut name = entry.file_name().to_string_lossy().into_owned();
                    let is_dir = entry
                        .file_type()
                        .await
                        .map(|ft| ft.is_dir())
                        .unwrap_or(false);
                    if is_dir {
                        name.push('/');
                    }
                    entries.push(name);
                }
                Ok(None) => break,
                Err(e) => return ToolResult::error(format!("Failed to read directory: {}", e)),
            }
        }
        entries.sort();

        let total = entries.len();
        let truncated = total > plan.limit;
        entries.truncate(plan.limit);

        ToolResult::success_data(json!({
            "path": plan.path.display().to_string(),
            "entries": entries,
            "total": total,
            "truncated": truncated
        }))
        .with_short_result(format!("{} entries", total))
    }
}
