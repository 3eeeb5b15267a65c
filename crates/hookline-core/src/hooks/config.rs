//! Compiled hook configuration
//!
//! Groups are kept per event in insertion order. Settings loading adds
//! user-level groups first and project-level groups second, so that is the
//! order they run in.

use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

use super::types::HookEvent;

/// One shell command attached to an event
#[derive(Debug, Clone, PartialEq)]
pub struct HookCommand {
    pub command: String,
    /// Overrides the runner's default timeout
    pub timeout: Option<Duration>,
}

impl HookCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Pattern(Regex),
    /// Invalid pattern; never matches
    Never,
}

impl Matcher {
    fn compile(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern == "*" {
            return Matcher::Any;
        }
        match Regex::new(&format!("^(?:{})$", pattern)) {
            Ok(re) => Matcher::Pattern(re),
            Err(e) => {
                warn!(matcher = pattern, "Invalid hook matcher, it will never match: {}", e);
                Matcher::Never
            }
        }
    }

    fn matches(&self, tool_name: &str) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Pattern(re) => re.is_match(tool_name),
            Matcher::Never => false,
        }
    }
}

#[derive(Debug, Clone)]
struct HookGroup {
    matcher: Matcher,
    commands: Vec<HookCommand>,
}

#[derive(Debug, Clone, Default)]
pub struct HookConfig {
    groups: HashMap<HookEvent, Vec<HookGroup>>,
}

impl HookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group for `event`
    ///
    /// Tool events require a matcher; a group without one is skipped. The
    /// matcher is ignored for UserPromptSubmit and Stop.
    pub fn add_group(&mut self, event: HookEvent, matcher: Option<&str>, commands: Vec<HookCommand>) {
        let matcher = if event.uses_matcher() {
            match matcher {
                Some(pattern) => Matcher::compile(pattern),
                None => {
                    warn!(event = %event, "Hook group without matcher skipped");
                    return;
                }
            }
        } else {
            Matcher::Any
        };
        if commands.is_empty() {
            return;
        }
        self.groups
            .entry(event)
            .or_default()
            .push(HookGroup { matcher, commands });
    }

    /// Builder form of `add_group`, handy in tests and embedding hosts
    pub fn with_group(mut self, event: HookEvent, matcher: Option<&str>, commands: Vec<HookCommand>) -> Self {
        self.add_group(event, matcher, commands);
        self
    }

    /// Commands for `event` in configuration order
    ///
    /// `tool_name` is only consulted for tool events.
    pub fn matching_commands(&self, event: HookEvent, tool_name: Option<&str>) -> Vec<&HookCommand> {
        let Some(groups) = self.groups.get(&event) else {
            return Vec::new();
        };
        groups
            .iter()
            .filter(|g| !event.uses_matcher() || g.matcher.matches(tool_name.unwrap_or_default()))
            .flat_map(|g| g.commands.iter())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Number of configured commands per event
    pub fn command_count(&self, event: HookEvent) -> usize {
        self.groups
            .get(&event)
            .map(|groups| groups.iter().map(|g| g.commands.len()).sum())
            .unwrap_or(0)
    }
}
