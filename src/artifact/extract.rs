//! Locate the diagram path in the agent's reply.

use std::sync::OnceLock;

use regex::Regex;

/// Phrase the agent is told to print right before the diagram path.
pub const SAVE_SENTINEL: &str = "The diagram is saved at:";

/// Extensions the fallback search recognises, case-insensitively.
pub const DIAGRAM_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "svg", "pdf"];

static DIAGRAM_TOKEN: OnceLock<Regex> = OnceLock::new();

fn diagram_token() -> &'static Regex {
    DIAGRAM_TOKEN.get_or_init(|| {
        let pattern = format!(
            r#"(?i)[^\s`'"()\[\]<>][^\s`"()\[\]<>]*\.(?:{})\b"#,
            DIAGRAM_EXTENSIONS.join("|")
        );
        Regex::new(&pattern).expect("diagram token pattern is valid")
    })
}

/// Find the diagram path in `response`.
///
/// The first line carrying [`SAVE_SENTINEL`] is authoritative: its trimmed
/// remainder is the path, and an empty remainder means no diagram. Without a
/// sentinel line, the first path-like token with a diagram extension anywhere
/// in the text is used.
pub fn extract_artifact_path(response: &str) -> Option<String> {
    match sentinel_payload(response) {
        Some(path) if path.is_empty() => None,
        Some(path) => Some(path.to_string()),
        None => find_by_extension(response),
    }
}

fn sentinel_payload(response: &str) -> Option<&str> {
    response
        .lines()
        .find_map(|line| line.split_once(SAVE_SENTINEL).map(|(_, rest)| rest.trim()))
}

/// First whitespace-free token ending in a diagram extension, in document order.
///
/// Double quotes, backticks, brackets and parentheses delimit tokens so
/// Markdown wrapping is not captured with the path. A single quote only
/// delimits at the start of a token; inside a name it is kept.
pub fn find_by_extension(text: &str) -> Option<String> {
    diagram_token().find(text).map(|m| m.as_str().to_string())
}
