//! Output Parser Framework: turns an invocation's raw stdout/stderr byte
//! streams into the structured [`ParsedEvent`]s and aggregate [`ParsedResult`]
//! the rest of the bridge core works with (§4.5).

mod bounded;
mod driver;
mod event;
mod parser;
mod parsers;

pub use bounded::{BoundedLine, BoundedLineAccumulator};
pub use driver::{drive, DEFAULT_MAX_LINE_BYTES};
pub use event::{Channel, ParsedEvent, ParsedResult};
pub use parser::{match_error_pattern, OutputParser};
pub use parsers::{build_parser, JsonParser, LogParser, ProgressParser, RawParser, TableParser};
