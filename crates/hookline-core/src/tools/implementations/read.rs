//! Read tool - Read file contents

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{Preview, Tool, ToolKind};
use crate::tools::{parse_params, ToolContext, ToolResult};

const DEFAULT_LIMIT: usize = 2000;

pub struct ReadTool;

#[derive(Deserialize)]
struct Params {
    file_path: String,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

pub struct ReadPlan {
    path: PathBuf,
    start: usize,
    limit: usize,
}

#[async_trait]
impl Tool for ReadTool {
    type Plan = ReadPlan;

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn description(&self) -> &'static str {
        "Read file contents with line numbers. Supports line offset/limit for large files. Detects binary files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file, absolute or relative to the working directory"
                },
                "offset": {
                    "type": "number",
                    "description": "The line number to start reading from (1-indexed)"
                },
                "limit": {
                    "type": "number",
                    "description": "The number of lines to read (default 2000)"
                }
            },
            "required": ["file_path"],
            "additionalProperties": false
        })
    }

    async fn prepare(&self, params: Value, ctx: &ToolContext) -> Result<ReadPlan, ToolResult> {
        let params = parse_params::<Params>(params)?;
        let path = ctx.resolve_path(&params.file_path);

        if !path.exists() {
            return Err(ToolResult::error(format!("File not found: {}", params.file_path)));
        }
        if !path.is_file() {
            return Err(ToolResult::error(format!("Path is not a file: {}", path.display())));
        }
        if params.limit == Some(0) {
            return Err(ToolResult::invalid_parameters("limit must be at least 1"));
        }

        Ok(ReadPlan {
            path,
            start: params.offset.unwrap_or(1).saturating_sub(1),
            limit: params.limit.unwrap_or(DEFAULT_LIMIT),
        })
    }

    fn preview(&self, plan: &ReadPlan) -> Preview {
        Preview::summary(format!("Read {}", plan.path.display()))
    }

    async fn apply(&self, plan: ReadPlan, _ctx: &ToolContext) -> ToolResult {
        let content = match fs::read(&plan.path).await {
            Ok(bytes) => bytes,
            Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
        };

        // Check for binary
        let check_len = content.len().min(8192);
        if content[..check_len].contains(&0) {
            return ToolResult::success_data(json!({
                "content": format!("Binary file: {} ({} bytes)", plan.path.display(), content.len()),
                "total_lines": 0,
                "lines_returned": 0
            }))
            .with_short_result("binary file");
        }

        let content = match String::from_utf8(content) {
            Ok(s) => s,
            Err(e) => return ToolResult::error(format!("File is not valid UTF-8: {}", e)),
        };

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        if total_lines == 0 {
            return ToolResult::success_data(json!({
                "content": "",
                "total_lines": 0,
                "lines_returned": 0
            }))
            .with_short_result("empty file");
        }

        if plan.start >= total_lines {
            return ToolResult::error(format!(
                "Start line {} is beyond file length ({})",
                plan.start + 1,
                total_lines
            ));
        }

        let end = (plan.start + plan.limit).min(total_lines);
        let numbered = lines[plan.start..end]
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>6}\t{}", plan.start + i + 1, line))
            .collect::<Vec<_>>()
            .join("\n");

        ToolResult::success_data(json!({
            "content": numbered,
            "total_lines": total_lines,
            "lines_returned": end - plan.start,
            "start_line": plan.start + 1
        }))
        .with_short_result(format!("{} lines", end - plan.start))
    }
}
