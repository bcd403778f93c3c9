use bridge_registry::ErrorPatternRule;
use regex::Regex;
use serde_json::Value;

use crate::event::{Channel, ParsedEvent, ParsedResult};
use crate::parser::{match_error_pattern, OutputParser};

/// Extracts a timestamp/severity/message structure from each stdout line
/// against the command's configured log pattern (e.g. `server.logs`),
/// classifying each stderr line against the command's error patterns.
pub struct LogParser {
    error_patterns: Vec<ErrorPatternRule>,
    log_pattern: Option<Regex>,
    warnings: Vec<String>,
    saw_error: bool,
}

impl LogParser {
    pub fn new(error_patterns: Vec<ErrorPatternRule>, log_pattern: Option<Regex>) -> Self {
        Self {
            error_patterns,
            log_pattern,
            warnings: Vec::new(),
            saw_error: false,
        }
    }

    fn parsed_structure(&self, line: &str) -> Value {
        let matched = self
            .log_pattern
            .as_ref()
            .and_then(|pattern| pattern.captures(line))
            .and_then(|captures| {
                let timestamp = captures.name("timestamp")?.as_str();
                let level = captures.name("level")?.as_str();
                let message = captures.name("message")?.as_str();
                Some(serde_json::json!({
                    "timestamp": timestamp,
                    "level": level,
                    "message": message,
                }))
            });
        matched.unwrap_or_else(|| serde_json::json!({ "level": "INFO", "message": line }))
    }
}

impl OutputParser for LogParser {
    fn reset(&mut self) {
        self.warnings.clear();
        self.saw_error = false;
    }

    fn parse_line(&mut self, channel: Channel, line: &str) -> Vec<ParsedEvent> {
        let output = ParsedEvent::Output {
            raw_line: line.to_string(),
            parsed_structure: Some(self.parsed_structure(line)),
        };
        if channel == Channel::Stdout || line.trim().is_empty() {
            return vec![output];
        }

        if let Some(error) = match_error_pattern(&self.error_patterns, line) {
            self.saw_error = true;
            return vec![output, error];
        }
        self.warnings.push(line.to_string());
        vec![
            output,
            ParsedEvent::Warning {
                message: line.to_string(),
            },
        ]
    }

    fn finalize(&mut self) -> ParsedResult {
        ParsedResult {
            success: !self.saw_error,
            data: None,
            error: None,
            warnings: std::mem::take(&mut self.warnings),
            metadata: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> Regex {
        Regex::new(r"^(?P<timestamp>\S+)\s+(?P<level>[A-Z]+)\s+(?P<message>.*)$").unwrap()
    }

    #[test]
    fn matched_line_extracts_timestamp_level_and_message() {
        let mut parser = LogParser::new(vec![], Some(pattern()));
        let events = parser.parse_line(
            Channel::Stdout,
            "2026-07-28T10:00:00Z INFO container started",
        );
        assert_eq!(
            events,
            vec![ParsedEvent::Output {
                raw_line: "2026-07-28T10:00:00Z INFO container started".to_string(),
                parsed_structure: Some(serde_json::json!({
                    "timestamp": "2026-07-28T10:00:00Z",
                    "level": "INFO",
                    "message": "container started",
                })),
            }]
        );
    }

    #[test]
    fn unmatched_line_falls_back_to_info_with_raw_message() {
        let mut parser = LogParser::new(vec![], Some(pattern()));
        let events = parser.parse_line(Channel::Stdout, "just some plain text");
        assert_eq!(
            events,
            vec![ParsedEvent::Output {
                raw_line: "just some plain text".to_string(),
                parsed_structure: Some(serde_json::json!({
                    "level": "INFO",
                    "message": "just some plain text",
                })),
            }]
        );
    }

    #[test]
    fn no_configured_pattern_always_falls_back_to_info() {
        let mut parser = LogParser::new(vec![], None);
        let events = parser.parse_line(Channel::Stdout, "2026-07-28T10:00:00Z INFO hello");
        assert_eq!(
            events,
            vec![ParsedEvent::Output {
                raw_line: "2026-07-28T10:00:00Z INFO hello".to_string(),
                parsed_structure: Some(serde_json::json!({
                    "level": "INFO",
                    "message": "2026-07-28T10:00:00Z INFO hello",
                })),
            }]
        );
    }

    #[test]
    fn stderr_line_matching_an_error_pattern_is_flagged_and_not_a_warning() {
        let rule = ErrorPatternRule {
            pattern: Regex::new("fatal").unwrap(),
            category: "fatal".to_string(),
            user_message: "a fatal error occurred".to_string(),
            suggestion: None,
        };
        let mut parser = LogParser::new(vec![rule], None);
        let events = parser.parse_line(Channel::Stderr, "fatal: disk full");
        assert!(matches!(events[1], ParsedEvent::Error { .. }));
        let result = parser.finalize();
        assert!(!result.success);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn stderr_line_without_an_error_pattern_match_is_a_warning() {
        let mut parser = LogParser::new(vec![], None);
        parser.parse_line(Channel::Stderr, "heads up");
        let result = parser.finalize();
        assert!(result.success);
        assert_eq!(result.warnings, vec!["heads up".to_string()]);
    }
}
