//! Edit tool - Exact string replacement in one file

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{read_existing, snippet, FileChange};
use crate::tools::registry::{Preview, Tool, ToolKind};
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct EditTool;

#[derive(Deserialize)]
struct Params {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

pub struct EditPlan {
    change: FileChange,
    replacements: usize,
}

#[async_trait]
impl Tool for EditTool {
    type Plan = EditPlan;

    fn kind(&self) -> ToolKind {
        ToolKind::Edit
    }

    fn description(&self) -> &'static str {
        "Exact string replacement in a file. old_string must match exactly once unless replace_all is true."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to modify"
                },
                "old_string": {
                    "type": "string",
                    "description": "The text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The text to replace it with"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false)",
                    "default": false
                }
            },
            "required": ["file_path", "old_string", "new_string"],
            "additionalProperties": false
        })
    }

    async fn prepare(&self, params: Value, ctx: &ToolContext) -> Result<EditPlan, ToolResult> {
        let params = parse_params::<Params>(params)?;
        if params.old_string.is_empty() {
            return Err(ToolResult::invalid_parameters("old_string must not be empty"));
        }
        if params.old_string == params.new_string {
            return Err(ToolResult::invalid_parameters(
                "old_string and new_string are identical",
            ));
        }

        let path = ctx.resolve_path(&params.file_path);
        let content = read_existing(&path, &params.file_path).await?;

        let count = content.matches(&params.old_string).count();
        if count == 0 {
            return Err(ToolResult::error(format!(
                "String not found in file: {:?}",
                snippet(&params.old_string)
            )));
        }
        if count > 1 && !params.replace_all {
            return Err(ToolResult::error(format!(
                "String found {} times. Use replace_all=true to replace all occurrences, or provide more context to make it unique.",
                count
            )));
        }

        let updated = if params.replace_all {
            content.replace(&params.old_string, &params.new_string)
        } else {
            content.replacen(&params.old_string, &params.new_string, 1)
        };

        Ok(EditPlan {
            change: FileChange::new(path, Some(content), updated),
            replacements: count,
        })
    }

    fn preview(&self, plan: &EditPlan) -> Preview {
        plan.change.preview("Edit")
    }

    async fn apply(&self, plan: EditPlan, _ctx: &ToolContext) -> ToolResult {
        if let Err(e) = plan.change.commit().await {
            return ToolResult::error(e);
        }
        ToolResult::success_data_with(
            json!({
                "message": format!("Replaced {} occurrence(s)", plan.replacements),
                "replacements": plan.replacements,
                "file_path": plan.change.path.display().to_string()
            }),
            Vec::new(),
            Some(plan.change.diff),
            None,
        )
        .with_short_result(format!("{} replacement(s)", plan.replacements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn edit(dir: &TempDir, params: Value) -> ToolResult {
        let ctx = ToolContext::new(dir.path());
        match EditTool.prepare(params, &ctx).await {
            Ok(plan) => EditTool.apply(plan, &ctx).await,
            Err(e) => e,
        }
    }

    #[tokio::test]
    async fn replaces_unique_match() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "let x = 1;\nlet y = 2;\n").unwrap();
        let result = edit(
            &dir,
            json!({"file_path": "a.rs", "old_string": "x = 1", "new_string": "x = 10"}),
        )
        .await;
        assert!(!result.is_error, "{}", result.output);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.rs")).unwrap(),
            "let x = 10;\nlet y = 2;\n"
        );
    }

    #[tokio::test]
    async fn ambiguous_match_is_rejected_without_writing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo foo").unwrap();
        let result = edit(
            &dir,
            json!({"file_path": "a.txt", "old_string": "foo", "new_string": "bar"}),
        )
        .await;
        assert!(result.is_error);
        assert!(result.output.contains("found 2 times"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "foo foo");
    }

    #[tokio::test]
    async fn replace_all_rewrites_every_match() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo foo").unwrap();
        let result = edit(
            &dir,
            json!({"file_path": "a.txt", "old_string": "foo", "new_string": "bar", "replace_all": true}),
        )
        .await;
        assert!(!result.is_error);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "bar bar");
    }

    #[tokio::test]
    async fn missing_string_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "abc").unwrap();
        let result = edit(
            &dir,
            json!({"file_path": "a.txt", "old_string": "zzz", "new_string": "y"}),
        )
        .await;
        assert!(result.output.contains("String not found"));
    }
}
