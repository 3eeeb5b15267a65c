//! MultiEdit tool - Apply several edits to one file, all or nothing

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{read_existing, snippet, FileChange};
use crate::tools::registry::{Preview, Tool, ToolKind};
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct MultiEditTool;

#[derive(Deserialize)]
struct Params {
    file_path: String,
    edits: Vec<EditOp>,
}

#[derive(Deserialize)]
struct EditOp {
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

pub struct MultiEditPlan {
    change: FileChange,
    edits: usize,
}

#[async_trait]
impl Tool for MultiEditTool {
    type Plan = MultiEditPlan;

    fn kind(&self) -> ToolKind {
        ToolKind::MultiEdit
    }

    fn description(&self) -> &'static str {
        "Apply multiple exact replacements to one file in order. Each edit sees the result of the previous one. If any edit fails, nothing is written."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to modify"
                },
                "edits": {
                    "type": "array",
                    "description": "Array of edit operations to apply sequentially",
                    "items": {
                        "type": "object",
                        "properties": {
                            "old_string": {
                                "type": "string",
                                "description": "The text to replace"
                            },
                            "new_string": {
                                "type": "string",
                                "description": "The replacement text"
                            },
                            "replace_all": {
                                "type": "boolean",
                                "default": false
                            }
                        },
                        "required": ["old_string", "new_string"]
                    },
                    "minItems": 1
                }
            },
            "required": ["file_path", "edits"],
            "additionalProperties": false
        })
    }

    async fn prepare(&self, params: Value, ctx: &ToolContext) -> Result<MultiEditPlan, ToolResult> {
        let params = parse_params::<Params>(params)?;
        if params.edits.is_empty() {
            return Err(ToolResult::invalid_parameters("At least one edit is required"));
        }

        let path = ctx.resolve_path(&params.file_path);
        let original = read_existing(&path, &params.file_path).await?;

        let mut content = original.clone();
        for (i, edit) in params.edits.iter().enumerate() {
            if edit.old_string.is_empty() {
                return Err(ToolResult::invalid_parameters(format!(
                    "Edit {}: old_string must not be empty",
                    i + 1
                )));
            }
            let count = content.matches(&edit.old_string).count();
            match count {
                0 => {
                    return Err(ToolResult::error(format!(
                        "Edit {}: string not found: {:?}",
                        i + 1,
                        snippet(&edit.old_string)
                    )))
                }
                1 => content = content.replacen(&edit.old_string, &edit.new_string, 1),
                n if edit.replace_all => {
                    tracing::debug!(edit_index = i, count = n, "MultiEdit: replacing all matches");
                    content = content.replace(&edit.old_string, &edit.new_string);
                }
                n => {
                    return Err(ToolResult::error(format!(
                        "Edit {}: string found {} times; add context or set replace_all",
                        i + 1,
                        n
                    )))
                }
            }
        }

        Ok(MultiEditPlan {
            edits: params.edits.len(),
            change: FileChange::new(path, Some(original), content),
        })
    }

    fn preview(&self, plan: &MultiEditPlan) -> Preview {
        plan.change.preview(&format!("Apply {} edits to", plan.edits))
    }

    async fn apply(&self, plan: MultiEditPlan, _ctx: &ToolContext) -> ToolResult {
        if let Err(e) = plan.change.commit().await {
            return ToolResult::error(e);
        }
        ToolResult::success_data_with(
            json!({
                "message": format!("Applied {} edits", plan.edits),
                "edits_applied": plan.edits,
                "file_path": plan.change.path.display().to_string()
            }),
            Vec::new(),
            Some(plan.change.diff),
            None,
        )
        .with_short_result(format!("{} edits", plan.edits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn edits_apply_in_sequence() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha beta").unwrap();
        let ctx = ToolContext::new(dir.path());
        let plan = MultiEditTool
            .prepare(
                json!({"file_path": "a.txt", "edits": [
                    {"old_string": "alpha", "new_string": "gamma"},
                    {"old_string": "gamma beta", "new_string": "done"}
                ]}),
                &ctx,
            )
            .await
            .unwrap();
        let result = MultiEditTool.apply(plan, &ctx).await;
        assert!(!result.is_error);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "done");
    }

    #[tokio::test]
    async fn one_failing_edit_writes_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha beta").unwrap();
        let ctx = ToolContext::new(dir.path());
        let err = MultiEditTool
            .prepare(
                json!({"file_path": "a.txt", "edits": [
                    {"old_string": "alpha", "new_string": "gamma"},
                    {"old_string": "missing", "new_string": "x"}
                ]}),
                &ctx,
            )
            .await
            .err()
            .unwrap();
        assert!(err.output.contains("Edit 2"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "alpha beta");
    }
}
