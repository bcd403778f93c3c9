use bridge_registry::ErrorPatternRule;
use serde_json::Value;

use crate::event::{Channel, ParsedEvent, ParsedResult};
use crate::parser::{match_error_pattern, OutputParser};

/// Parses each stdout line as an independent JSON value (JSONL) and, at
/// finalize, re-parses the concatenated stdout as a single aggregate value
/// for callers that expect one JSON document rather than a line stream.
pub struct JsonParser {
    error_patterns: Vec<ErrorPatternRule>,
    stdout_lines: Vec<String>,
    stderr_lines: Vec<String>,
}

impl JsonParser {
    pub fn new(error_patterns: Vec<ErrorPatternRule>) -> Self {
        Self {
            error_patterns,
            stdout_lines: Vec::new(),
            stderr_lines: Vec::new(),
        }
    }
}

impl OutputParser for JsonParser {
    fn reset(&mut self) {
        self.stdout_lines.clear();
        self.stderr_lines.clear();
    }

    fn parse_line(&mut self, channel: Channel, line: &str) -> Vec<ParsedEvent> {
        match channel {
            Channel::Stdout => {
                self.stdout_lines.push(line.to_string());
                let parsed_structure = serde_json::from_str::<Value>(line).ok();
                vec![ParsedEvent::Output {
                    raw_line: line.to_string(),
                    parsed_structure,
                }]
            }
            Channel::Stderr => {
                self.stderr_lines.push(line.to_string());
                vec![ParsedEvent::Warning {
                    message: line.to_string(),
                }]
            }
        }
    }

    fn finalize(&mut self) -> ParsedResult {
        let joined_stdout = self.stdout_lines.join("\n");
        let joined_stderr = self.stderr_lines.join("\n");

        let data = serde_json::from_str::<Value>(&joined_stdout).ok().or_else(|| {
            self.stdout_lines
                .last()
                .and_then(|line| serde_json::from_str(line).ok())
        });

        // A configured error pattern on stderr takes priority over a bare
        // parse failure — it carries a category/suggestion an operator
        // actually configured, whereas "parsing" is only the fallback for
        // when stdout came back malformed with nothing else to go on.
        let error = match_error_pattern(&self.error_patterns, &joined_stderr).or_else(|| {
            (data.is_none() && !self.stdout_lines.is_empty()).then(|| ParsedEvent::Error {
                category: "parsing".to_string(),
                message: "stdout did not parse as a JSON document".to_string(),
                suggestion: None,
            })
        });

        ParsedResult {
            success: error.is_none(),
            data,
            error,
            warnings: self.stderr_lines.clone(),
            metadata: Default::default(),
        }
    }
}
