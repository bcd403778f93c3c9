use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::{ArgumentSchemaEntry, ErrorPatternRule, RateLimitDescriptor};

/// Which [`crate::ParserKind`] an invocation's output is run through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParserKind {
    Json,
    Table,
    Log,
    Progress,
    Raw,
}

/// Failure categories a command's spec allows the resilience layer to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryableCategory {
    TransientIo,
    GeneralError,
}

/// Table-parser specific column separator. Defaults to whitespace-splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableSeparator {
    Whitespace,
    Tab,
    Comma,
}

/// Declarative, immutable-after-load record describing one allowed command.
///
/// Created at startup by [`crate::CommandRegistry::load`] and never mutated
/// afterward; `lookup` performs no I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Unique identifier, e.g. `"server.enable"`.
    pub name: String,
    /// Positional argv template segments preceding the bound arguments, e.g.
    /// `["server", "enable"]` for `cli server enable ...`.
    pub positional_template: Vec<String>,
    /// Named arguments in the template, keyed by schema entry name, mapped to
    /// the flag token emitted ahead of the bound value (e.g. `"serverId"` has
    /// no flag — it's positional — while `"autoStart"` emits `--auto-start`).
    pub named_args: Vec<NamedArgBinding>,
    pub schema: Vec<ArgumentSchemaEntry>,
    #[serde(with = "crate::schema::duration_secs")]
    pub max_runtime: Duration,
    pub parser: ParserKind,
    pub table_separator: TableSeparator,
    pub is_async: bool,
    pub is_streaming: bool,
    /// Client disconnect with no other subscribers may cancel the invocation.
    pub abortable: bool,
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitDescriptor>,
    pub cacheable: bool,
    #[serde(default, with = "crate::schema::duration_secs_opt")]
    pub cache_ttl: Option<Duration>,
    #[serde(default)]
    pub retryable_categories: Vec<RetryableCategory>,
    #[serde(default)]
    pub error_patterns: Vec<ErrorPatternRule>,
    /// Environment variable names passed through to the subprocess unchanged.
    #[serde(default)]
    pub allowed_env: Vec<String>,
    /// Set when the command is allowed to receive piped stdin (spec §4.4.4).
    #[serde(default)]
    pub accepts_stdin: bool,
    /// Free-text progress marker pattern for the progress parser, e.g.
    /// `progress:\s*(?P<pct>\d+)%` or `(?P<current>\d+)/(?P<total>\d+)`.
    /// Unused outside [`ParserKind::Progress`].
    #[serde(default, with = "crate::schema::regex_opt_serde")]
    pub progress_pattern: Option<Regex>,
    /// Free-text state-transition sentence pattern for the progress parser,
    /// e.g. `state:\s*(?P<old>\w+)(?:→|->)(?P<new>\w+)`. Unused outside
    /// [`ParserKind::Progress`].
    #[serde(default, with = "crate::schema::regex_opt_serde")]
    pub state_pattern: Option<Regex>,
    /// Timestamp/severity-token prefix pattern for the log parser, e.g.
    /// `^(?P<timestamp>\S+)\s+(?P<level>[A-Z]+)\s+(?P<message>.*)$`. Unused
    /// outside [`ParserKind::Log`].
    #[serde(default, with = "crate::schema::regex_opt_serde")]
    pub log_pattern: Option<Regex>,
}

/// Binds a named argument's schema entry to the flag token emitted before its
/// value (or no flag at all, for booleans rendered as a bare switch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedArgBinding {
    pub schema_name: String,
    #[serde(default)]
    pub flag: Option<String>,
    /// Boolean args that are rendered as a bare switch (`--auto-start`) rather
    /// than `--flag value` when true, and omitted entirely when false.
    #[serde(default)]
    pub bare_switch: bool,
}

impl CommandSpec {
    pub fn schema_for(&self, name: &str) -> Option<&ArgumentSchemaEntry> {
        self.schema.iter().find(|entry| entry.name == name)
    }
}
