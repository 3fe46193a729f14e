//! Reasoning output parser
//!
//! Pure function from raw model text to one of three outcomes. Grammar:
//!
//! ```text
//! Thought: <free text>
//! Action: <tool_name>
//! Action Input: {"param": "value"}
//! ```
//!
//! or
//!
//! ```text
//! Thought: <free text>
//! Final Answer: <answer>
//! ```
//!
//! Markers are matched at line start, case-insensitively, tolerating extra
//! whitespace and markdown emphasis (`**Action:**`). When both markers are
//! present the earlier one wins. The action payload is the first JSON object
//! after `Action Input:`; anything after it is ignored.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::tool::{Arguments, ToolInvocation};

/// Parsed form of one model completion
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedOutput {
    /// `Final Answer:` marker; `answer` is the text after it
    FinalAnswer {
        thought: Option<String>,
        answer: String,
    },

    /// `Action:` marker with a tool name.
    ///
    /// `input_error` is set when an `Action Input:` block was present but
    /// was not a JSON object; the arguments are then empty.
    Action {
        thought: Option<String>,
        invocation: ToolInvocation,
        input_error: Option<String>,
    },

    /// No recognizable marker; the whole (trimmed) text
    Unparsed(String),
}

struct Markers {
    final_answer: Regex,
    action: Regex,
    action_input: Regex,
    thought: Regex,
}

fn markers() -> &'static Markers {
    static MARKERS: OnceLock<Markers> = OnceLock::new();
    MARKERS.get_or_init(|| Markers {
        final_answer: Regex::new(r"(?im)^[ \t>#*_]*final[ \t]*answer[ \t*_]*:[ \t*_]*")
            .expect("final answer pattern is valid"),
        action: Regex::new(r"(?im)^[ \t>#*_]*action[ \t*_]*:[ \t*_]*`?([A-Za-z0-9_.\-]+)`?")
            .expect("action pattern is valid"),
        action_input: Regex::new(r"(?i)action[ \t*_]*input[ \t*_]*:[ \t*_]*")
            .expect("action input pattern is valid"),
        thought: Regex::new(r"(?im)^[ \t>#*_]*thought[ \t*_]*:[ \t*_]*")
            .expect("thought pattern is valid"),
    })
}

/// Parse one model completion
pub fn parse_reasoning_output(text: &str) -> ParsedOutput {
    let markers = markers();
    let final_match = markers.final_answer.find(text);
    let mut action_match = markers.action.captures(text);

    // `Action: None` and the like mean "no tool"; the thought ends there.
    let mut thought_end = None;
    if let Some(caps) = action_match.as_ref().filter(|caps| is_placeholder_action(text, caps)) {
        thought_end = caps.get(0).map(|m| m.start());
        action_match = None;
    }

    let action_first = match (&final_match, &action_match) {
        (Some(f), Some(a)) => a.get(0).is_some_and(|m| m.start() < f.start()),
        (None, Some(_)) => true,
        _ => false,
    };

    if action_first {
        if let Some(caps) = action_match {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                return ParsedOutput::Unparsed(text.trim().to_string());
            };
            let thought = extract_thought(&text[..whole.start()]);
            let (arguments, input_error) = match parse_action_input(&text[whole.end()..]) {
                Ok(arguments) => (arguments, None),
                Err(reason) => (Arguments::new(), Some(reason)),
            };

            return ParsedOutput::Action {
                thought,
                invocation: ToolInvocation::new(name.as_str(), arguments),
                input_error,
            };
        }
    }

    if let Some(found) = final_match {
        let answer = text[found.end()..].trim();
        if !answer.is_empty() {
            let prefix_end = thought_end.unwrap_or(found.start()).min(found.start());
            return ParsedOutput::FinalAnswer {
                thought: extract_thought(&text[..prefix_end]),
                answer: answer.to_string(),
            };
        }
    }

    ParsedOutput::Unparsed(text.trim().to_string())
}

/// Whether an `Action:` line names no tool at all (`None`, `N/A`, ...)
fn is_placeholder_action(text: &str, caps: &regex::Captures<'_>) -> bool {
    let Some(name) = caps.get(1) else {
        return false;
    };
    let value = text[name.start()..]
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| matches!(c, '`' | '*' | '_' | '.'))
        .to_ascii_lowercase();

    matches!(value.as_str(), "none" | "n/a" | "na" | "null" | "nothing" | "no action")
}

/// Text of the last `Thought:` before a marker, or the bare preamble
fn extract_thought(prefix: &str) -> Option<String> {
    let thought = markers()
        .thought
        .find_iter(prefix)
        .last()
        .map_or(prefix, |m| &prefix[m.end()..])
        .trim();

    (!thought.is_empty()).then(|| thought.to_string())
}

/// Arguments following an action marker.
///
/// No `Action Input:` marker means "no arguments"; a marker followed by
/// anything but a JSON object is an error.
fn parse_action_input(after_action: &str) -> Result<Arguments, String> {
    let Some(marker) = markers().action_input.find(after_action) else {
        return Ok(Arguments::new());
    };

    let mut payload = after_action[marker.end()..].trim_start();

    // Optional ``` / ```json fence
    if let Some(fenced) = payload.strip_prefix("```") {
        payload = fenced
            .find('\n')
            .map_or("", |newline| &fenced[newline + 1..])
            .trim_start();
    }

    if !payload.starts_with('{') {
        return Err(
            "Action Input must be a JSON object, for example {\"query\": \"...\"}".into(),
        );
    }

    let mut values = serde_json::Deserializer::from_str(payload).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Object(arguments))) => Ok(arguments),
        Some(Ok(_)) | None => Err("Action Input must be a JSON object".into()),
        Some(Err(e)) => Err(format!("Action Input is not valid JSON: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_final_answer() {
        let parsed = parse_reasoning_output("Thought: easy one\nFinal Answer: 42");
        assert_eq!(
            parsed,
            ParsedOutput::FinalAnswer {
                thought: Some("easy one".into()),
                answer: "42".into(),
            }
        );
    }

    #[test]
    fn test_placeholder_action_before_final_answer() {
        let parsed = parse_reasoning_output("Thought: simple arithmetic\nAction: None\nFinal Answer: 4");
        assert_eq!(
            parsed,
            ParsedOutput::FinalAnswer {
                thought: Some("simple arithmetic".into()),
                answer: "4".into(),
            }
        );

        let parsed = parse_reasoning_output("Thought: no tool\n**Action:** `N/A`\nFinal Answer: done");
        assert!(matches!(parsed, ParsedOutput::FinalAnswer { answer, .. } if answer == "done"));

        let parsed = parse_reasoning_output("Thought: hmm\nAction: none");
        assert!(matches!(parsed, ParsedOutput::Unparsed(_)));
    }

    #[test]
    fn test_tool_named_like_placeholder_prefix_is_still_an_action() {
        let parsed = parse_reasoning_output("Action: none_search\nAction Input: {}");
        assert!(matches!(
            parsed,
            ParsedOutput::Action { invocation, .. } if invocation.name == "none_search"
        ));
    }

    #[test]
    fn test_marker_case_and_whitespace_variance() {
        let parsed = parse_reasoning_output("  FINAL   ANSWER :  Paris\nis the capital");
        assert!(matches!(
            parsed,
            ParsedOutput::FinalAnswer { answer, .. } if answer == "Paris\nis the capital"
        ));

        let parsed = parse_reasoning_output("**Final Answer:** bold works");
        assert!(matches!(parsed, ParsedOutput::FinalAnswer { answer, .. } if answer == "bold works"));
    }

    #[test]
    fn test_action_with_json_input() {
        let text = "Thought: I should search\nAction: web_search\nAction Input: {\"query\": \"X\"}";
        let ParsedOutput::Action { thought, invocation, input_error } = parse_reasoning_output(text) else {
            panic!("expected action");
        };

        assert_eq!(thought.as_deref(), Some("I should search"));
        assert_eq!(invocation.name, "web_search");
        assert_eq!(serde_json::Value::Object(invocation.arguments), json!({"query": "X"}));
        assert!(input_error.is_none());
    }

    #[test]
    fn test_action_ignores_hallucinated_observation() {
        let text = "thought: look it up\naction:   `web_search`\naction input:\n```json\n{\"query\": \"rust\"}\n```\nObservation: made up\nFinal Answer: nope";
        let ParsedOutput::Action { invocation, input_error, .. } = parse_reasoning_output(text) else {
            panic!("expected action");
        };

        assert_eq!(invocation.str_arg("query"), Some("rust"));
        assert!(input_error.is_none());
    }

    #[test]
    fn test_earliest_marker_wins() {
        let text = "Final Answer: done\nAction: web_search\nAction Input: {}";
        assert!(matches!(parse_reasoning_output(text), ParsedOutput::FinalAnswer { .. }));
    }

    #[test]
    fn test_action_without_input_has_empty_arguments() {
        let ParsedOutput::Action { invocation, input_error, .. } =
            parse_reasoning_output("Action: list_notes")
        else {
            panic!("expected action");
        };
        assert!(invocation.arguments.is_empty());
        assert!(input_error.is_none());
    }

    #[test]
    fn test_malformed_action_input_is_reported() {
        let ParsedOutput::Action { invocation, input_error, .. } =
            parse_reasoning_output("Action: web_search\nAction Input: query=X")
        else {
            panic!("expected action");
        };
        assert_eq!(invocation.name, "web_search");
        assert!(input_error.unwrap().contains("JSON object"));

        let ParsedOutput::Action { input_error, .. } =
            parse_reasoning_output("Action: web_search\nAction Input: {\"query\": ")
        else {
            panic!("expected action");
        };
        assert!(input_error.unwrap().contains("not valid JSON"));
    }

    #[test]
    fn test_action_input_is_not_mistaken_for_action() {
        let parsed = parse_reasoning_output("Action Input: {\"query\": \"X\"}");
        assert!(matches!(parsed, ParsedOutput::Unparsed(_)));
    }

    #[test]
    fn test_markerless_text_is_unparsed() {
        assert_eq!(
            parse_reasoning_output("  Just a plain reply.  "),
            ParsedOutput::Unparsed("Just a plain reply.".into())
        );
    }

    #[test]
    fn test_empty_final_answer_is_unparsed() {
        assert!(matches!(
            parse_reasoning_output("Thought: hmm\nFinal Answer:   "),
            ParsedOutput::Unparsed(_)
        ));
    }
}
