mod json;
mod log;
mod progress;
mod raw;
mod table;

pub use json::JsonParser;
pub use log::LogParser;
pub use progress::ProgressParser;
pub use raw::RawParser;
pub use table::TableParser;

use bridge_registry::{CommandSpec, ParserKind};

use crate::parser::OutputParser;

/// Builds the concrete parser a [`CommandSpec`] declares (§4.5's
/// `ParserKind` dispatch), seeded with that command's error patterns.
pub fn build_parser(spec: &CommandSpec) -> Box<dyn OutputParser> {
    let patterns = spec.error_patterns.clone();
    match spec.parser {
        ParserKind::Json => Box::new(JsonParser::new(patterns)),
        ParserKind::Table => Box::new(TableParser::new(spec.table_separator, patterns)),
        ParserKind::Log => Box::new(LogParser::new(patterns, spec.log_pattern.clone())),
        ParserKind::Progress => Box::new(ProgressParser::new(
            patterns,
            spec.progress_pattern.clone(),
            spec.state_pattern.clone(),
        )),
        ParserKind::Raw => Box::new(RawParser::new(patterns)),
    }
}
