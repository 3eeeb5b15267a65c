//! Settings files and session configuration
//!
//! Hooks and extra hook environment come from `~/.hookline/settings.json`
//! and `<cwd>/.hookline/settings.json`:
//!
//! ```json
//! {
//!   "hooks": {
//!     "PreToolUse": [
//!       { "matcher": "Write|Edit", "hooks": [{ "type": "command", "command": "./guard.sh", "timeout": 5 }] }
//!     ]
//!   },
//!   "env": { "LINT_LEVEL": "strict" }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::hooks::{HookCommand, HookConfig, HookEvent, DEFAULT_HOOK_TIMEOUT};
use crate::permissions::{PermissionMode, DEFAULT_CALLBACK_TIMEOUT};
use crate::tools::DEFAULT_TOOL_TIMEOUT;

/// Raw contents of one settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub hooks: HashMap<String, Vec<RawHookGroup>>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHookGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    #[serde(default)]
    pub hooks: Vec<RawHook>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHook {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Settings {
    /// Load one settings file; a missing file is empty settings
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings found at {:?}", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;

        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        info!(
            "Loaded settings with {} hook events from {:?}",
            settings.hooks.len(),
            path
        );
        Ok(settings)
    }

    /// Append this file's hook groups to `config`
    fn add_hooks_to(&self, config: &mut HookConfig) {
        // HashMap order is arbitrary; event order does not matter, group order does
        for (event_name, groups) in &self.hooks {
            let Some(event) = HookEvent::parse(event_name) else {
                warn!(event = %event_name, "Unknown hook event in settings, skipped");
                continue;
            };
            for group in groups {
                let commands: Vec<HookCommand> = group
                    .hooks
                    .iter()
                    .filter_map(|hook| hook.to_command(event))
                    .collect();
                config.add_group(event, group.matcher.as_deref(), commands);
            }
        }
    }
}

impl RawHook {
    fn to_command(&self, event: HookEvent) -> Option<HookCommand> {
        if self.kind != "command" {
            warn!(event = %event, kind = %self.kind, "Unsupported hook type, skipped");
            return None;
        }
        let Some(command) = self.command.as_deref().filter(|c| !c.trim().is_empty()) else {
            warn!(event = %event, "Command hook without a command, skipped");
            return None;
        };
        let mut hook = HookCommand::new(command);
        if let Some(secs) = self.timeout {
            hook = hook.with_timeout(Duration::from_secs(secs));
        }
        Some(hook)
    }
}

/// User and project settings combined
#[derive(Debug, Clone, Default)]
pub struct MergedSettings {
    pub hooks: HookConfig,
    /// Project values override user values
    pub env: HashMap<String, String>,
}

impl MergedSettings {
    /// User groups run before project groups for the same event
    pub fn merge(user: &Settings, project: &Settings) -> Self {
        let mut hooks = HookConfig::new();
        user.add_hooks_to(&mut hooks);
        project.add_hooks_to(&mut hooks);

        let mut env = user.env.clone();
        env.extend(project.env.clone());

        Self { hooks, env }
    }

    /// Load both files for `working_dir`
    pub async fn load(user_path: &Path, project_path: &Path) -> Result<Self> {
        let user = Settings::load(user_path).await?;
        let project = Settings::load(project_path).await?;
        Ok(Self::merge(&user, &project))
    }
}

/// Per-session options
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_id: String,
    pub working_dir: PathBuf,
    pub transcript_path: PathBuf,
    pub permission_mode: PermissionMode,
    pub hook_timeout: Duration,
    pub tool_timeout: Duration,
    pub callback_timeout: Duration,
    /// None means unbounded
    pub max_iterations: Option<usize>,
    /// None disables compression
    pub compress_threshold_tokens: Option<usize>,
    pub system_prompt: String,
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a coding agent working in the user's project directory. \
Use the available tools to inspect and change files and to run commands. \
Keep answers short and report what you changed.";

impl Default for SessionConfig {
    fn default() -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        Self {
            transcript_path: crate::paths::transcript_path(&session_id),
            session_id,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            permission_mode: PermissionMode::Default,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            max_iterations: None,
            compress_threshold_tokens: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn for_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self.transcript_path = crate::paths::transcript_path(&self.session_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json")).await.unwrap();
        assert!(settings.hooks.is_empty());
        assert!(settings.env.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "settings.json", "{ not json");
        let err = Settings::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[tokio::test]
    async fn user_groups_precede_project_groups_and_env_merges() {
        let dir = TempDir::new().unwrap();
        let user = write(
            &dir,
            "user.json",
            r#"{
                "hooks": {"PreToolUse": [{"matcher": "Write", "hooks": [{"type": "command", "command": "user-guard"}]}]},
                "env": {"A": "user", "B": "user"}
            }"#,
        );
        let project = write(
            &dir,
            "project.json",
            r#"{
                "hooks": {"PreToolUse": [{"matcher": "*", "hooks": [{"type": "command", "command": "project-guard", "timeout": 3}]}]},
                "env": {"B": "project"}
            }"#,
        );

        let merged = MergedSettings::load(&user, &project).await.unwrap();
        let commands = merged
            .hooks
            .matching_commands(HookEvent::PreToolUse, Some("Write"));
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].command, "user-guard");
        assert_eq!(commands[1].command, "project-guard");
        assert_eq!(commands[1].timeout, Some(Duration::from_secs(3)));
        assert_eq!(merged.env["A"], "user");
        assert_eq!(merged.env["B"], "project");
    }

    #[test]
    fn unsupported_hooks_and_events_are_skipped() {
        let settings: Settings = serde_json::from_str(
            r#"{"hooks": {
                "Stop": [{"hooks": [{"type": "prompt", "command": "x"}, {"type": "command", "command": "ok"}]}],
                "Notification": [{"hooks": [{"type": "command", "command": "y"}]}]
            }}"#,
        )
        .unwrap();
        let merged = MergedSettings::merge(&settings, &Settings::default());
        assert_eq!(merged.hooks.command_count(HookEvent::Stop), 1);
        assert_eq!(merged.hooks.matching_commands(HookEvent::Stop, None)[0].command, "ok");
    }
}
