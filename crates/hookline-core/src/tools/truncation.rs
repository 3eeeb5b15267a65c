//! Output truncation utilities for tool results

use serde_json::Value;

/// Hard cap on what a tool result may send to the model
pub const MAX_TOOL_OUTPUT_CHARS: usize = 30_000;

/// Cut output over the cap at the last line break before it
pub fn truncate_output(output: &str) -> String {
    truncate_text(output, MAX_TOOL_OUTPUT_CHARS)
}

fn truncate_text(output: &str, max_chars: usize) -> String {
    if output.len() <= max_chars {
        return output.to_string();
    }

    let truncated_len = floor_char_boundary(output, max_chars);
    let truncated = &output[..truncated_len];
    let break_point = truncated.rfind('\n').unwrap_or(truncated_len);
    let clean = &output[..break_point];
    format!(
        "{}\n\n[... OUTPUT TRUNCATED: {} chars -> {} chars ...]",
        clean,
        output.len(),
        clean.len()
    )
}

/// Room for the truncation notice and JSON escaping slack
const NOTICE_RESERVE: usize = 128;

/// Cap a serialized result envelope while keeping it valid JSON
///
/// The longest string values are shortened until the envelope fits. Output
/// that is not JSON falls back to plain truncation.
pub fn truncate_envelope(output: &str) -> String {
    if output.len() <= MAX_TOOL_OUTPUT_CHARS {
        return output.to_string();
    }
    let Ok(mut value) = serde_json::from_str::<Value>(output) else {
        return truncate_output(output);
    };

    let mut serialized = output.to_string();
    while serialized.len() > MAX_TOOL_OUTPUT_CHARS {
        let overflow = serialized.len() - MAX_TOOL_OUTPUT_CHARS;
        let Some(longest) = longest_string_mut(&mut value) else {
            break;
        };
        if longest.len() <= NOTICE_RESERVE {
            break;
        }
        let target = longest.len().saturating_sub(overflow + NOTICE_RESERVE);
        *longest = truncate_text(longest, target);
        serialized = match serde_json::to_string(&value) {
            Ok(s) => s,
            Err(_) => return truncate_output(output),
        };
    }
    serialized
}

fn longest_string_mut(value: &mut Value) -> Option<&mut String> {
    match value {
        Value::String(s) => Some(s),
        Value::Array(items) => items
            .iter_mut()
            .filter_map(longest_string_mut)
            .max_by_key(|s| s.len()),
        Value::Object(map) => map
            .values_mut()
            .filter_map(longest_string_mut)
            .max_by_key(|s| s.len()),
        _ => None,
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

/// Result of a tail truncation
pub struct TruncationResult {
    pub text: String,
    pub was_truncated: bool,
    pub lines_shown: usize,
    pub lines_total: usize,
}

impl TruncationResult {
    /// Format a truncation notice for appending to output
    pub fn notice(&self) -> Option<String> {
        if !self.was_truncated {
            return None;
        }
        Some(format!(
            "\n[Output truncated: showed last {} of {} lines]",
            self.lines_shown, self.lines_total,
        ))
    }
}

/// Keep the last lines within both limits; best for command output
pub fn truncate_tail(text: &str, max_lines: usize, max_bytes: usize) -> TruncationResult {
    let lines: Vec<&str> = text.lines().collect();
    let lines_total = lines.len();

    if lines_total <= max_lines && text.len() <= max_bytes {
        return TruncationResult {
            text: text.to_string(),
            was_truncated: false,
            lines_shown: lines_total,
            lines_total,
        };
    }

    let line_limited = &lines[lines_total.saturating_sub(max_lines)..];
    let joined = line_limited.join("\n");
    let text = if joined.len() > max_bytes {
        let mut skip = joined.len() - max_bytes;
        while skip < joined.len() && !joined.is_char_boundary(skip) {
            skip += 1;
        }
        // Start on a whole line
        let start = joined[skip..]
            .find('\n')
            .map(|pos| skip + pos + 1)
            .unwrap_or(skip);
        joined[start..].to_string()
    } else {
        joined
    };

    TruncationResult {
        lines_shown: text.lines().count(),
        text,
        was_truncated: true,
        lines_total,
    }
}
