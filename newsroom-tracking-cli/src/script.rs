//! Replay scripts
//!
//! One JSON object per line, tagged by `op`:
//!
//! ```text
//! {"op": "track", "event": "Story Viewed", "properties": {"slug": "launch"}}
//! {"op": "identify", "user_id": "u1", "traits": {"plan": "pro"}}
//! {"op": "consent", "granted": true}
//! {"op": "ready"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use newsroom_tracking_core::{Properties, Traits};
use serde::Deserialize;
use std::path::Path;

/// One step of a replay script
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Identify {
        user_id: String,
        #[serde(default)]
        traits: Traits,
    },
    Alias {
        user_id: String,
        previous_id: String,
    },
    Page {
        category: Option<String>,
        name: Option<String>,
        #[serde(default)]
        properties: Properties,
    },
    Track {
        event: String,
        #[serde(default)]
        properties: Properties,
    },
    /// Change the visitor's consent
    Consent { granted: bool },
    /// The analytics client finished loading
    Ready,
    /// One extra drain notification
    Tick,
}

/// Parse script text into steps
pub fn parse(content: &str) -> Result<Vec<Step>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid step on line {}", index + 1))
        })
        .collect()
}

/// Read and parse a script file
pub fn load(path: &Path) -> Result<Vec<Step>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    parse(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let script = r#"
# visitor arrives before the client loads
{"op": "page", "name": "Home"}
{"op": "track", "event": "Story Viewed", "properties": {"slug": "launch"}}

{"op": "identify", "user_id": "u1"}
{"op": "consent", "granted": true}
{"op": "ready"}
"#;
        let steps = parse(script).unwrap();
        assert_eq!(steps.len(), 5);
        assert_eq!(
            steps[0],
            Step::Page {
                category: None,
                name: Some("Home".to_string()),
                properties: Properties::new(),
            }
        );
        assert!(matches!(&steps[1], Step::Track { event, properties }
            if event == "Story Viewed" && properties["slug"] == "launch"));
        assert_eq!(steps[3], Step::Consent { granted: true });
        assert_eq!(steps[4], Step::Ready);
    }

    #[test]
    fn test_parse_reports_line() {
        let err = parse("{\"op\": \"ready\"}\n{\"op\": \"launch\"}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
