use bridge_registry::ErrorPatternRule;

use crate::event::{Channel, ParsedEvent, ParsedResult};

/// Contract every concrete parser (JSON/table/log/progress/raw) implements.
/// A parser is fed complete lines as they become available — from either a
/// batch read or a live stream, the parser itself doesn't know which — and
/// produces zero or more events per line. [`Self::finalize`] runs once both
/// pipes have closed and aggregates the run (§4.5).
pub trait OutputParser: Send {
    fn reset(&mut self);
    fn parse_line(&mut self, channel: Channel, line: &str) -> Vec<ParsedEvent>;
    fn finalize(&mut self) -> ParsedResult;
}

/// Matches `text` (typically the complete stderr) against a command's
/// configured error patterns, returning the first match as an `Error` event.
pub fn match_error_pattern(patterns: &[ErrorPatternRule], text: &str) -> Option<ParsedEvent> {
    patterns.iter().find_map(|rule| {
        rule.pattern.is_match(text).then(|| ParsedEvent::Error {
            category: rule.category.clone(),
            message: rule.user_message.clone(),
            suggestion: rule.suggestion.clone(),
        })
    })
}
