use std::time::Duration;

use regex::Regex;

use crate::schema::{ArgKind, ArgSource, ArgumentSchemaEntry, RateLimitDescriptor};
use crate::spec::{CommandSpec, NamedArgBinding, ParserKind, RetryableCategory, TableSeparator};

fn principal_user_arg() -> ArgumentSchemaEntry {
    ArgumentSchemaEntry::string("userId", ArgSource::PrincipalClaim).required()
}

fn server_id_arg() -> ArgumentSchemaEntry {
    ArgumentSchemaEntry::string("serverId", ArgSource::Path)
        .required()
        .pattern(r"[A-Za-z0-9_-]{1,64}")
}

/// Matches `progress: 33%` or `12/40`-shaped markers in a streaming command's
/// plain-text stdout.
fn progress_marker_pattern() -> Regex {
    Regex::new(r"(?:progress:\s*)?(?:(?P<pct>\d{1,3})%|(?P<current>\d+)\s*/\s*(?P<total>\d+))")
        .expect("built-in progress pattern is valid")
}

/// Matches `state: pending -> running` / `state: pending→running` sentences.
fn state_transition_pattern() -> Regex {
    Regex::new(r"state:\s*(?P<old>[A-Za-z_]+)\s*(?:->|→)\s*(?P<new>[A-Za-z_]+)")
        .expect("built-in state transition pattern is valid")
}

/// Matches a leading RFC3339-ish timestamp followed by an uppercase severity
/// token, e.g. `2026-07-28T10:00:00Z INFO container started`.
fn log_line_pattern() -> Regex {
    Regex::new(r"^(?P<timestamp>\S+)\s+(?P<level>[A-Z]+)\s+(?P<message>.*)$")
        .expect("built-in log line pattern is valid")
}

/// Builds the built-in command catalog described by spec §6's HTTP/command
/// mapping table. This is the "code" half of "loaded from an internal source
/// (code or config)" — [`crate::CommandRegistry::load_with_overlay`] can merge
/// a TOML overlay on top of it.
pub fn default_catalog() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "server.list".into(),
            positional_template: vec!["server".into(), "list".into()],
            named_args: vec![],
            schema: vec![principal_user_arg()],
            max_runtime: Duration::from_secs(15),
            parser: ParserKind::Json,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec!["servers.read".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 60,
                window: Duration::from_secs(60),
            }),
            cacheable: true,
            cache_ttl: Some(Duration::from_secs(5)),
            retryable_categories: vec![RetryableCategory::TransientIo],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
        CommandSpec {
            name: "server.inspect".into(),
            positional_template: vec!["server".into(), "inspect".into()],
            named_args: vec![NamedArgBinding {
                schema_name: "serverId".into(),
                flag: None,
                bare_switch: false,
            }],
            schema: vec![server_id_arg(), principal_user_arg()],
            max_runtime: Duration::from_secs(15),
            parser: ParserKind::Json,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec!["servers.read".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 60,
                window: Duration::from_secs(60),
            }),
            cacheable: true,
            cache_ttl: Some(Duration::from_secs(5)),
            retryable_categories: vec![RetryableCategory::TransientIo],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
        CommandSpec {
            name: "server.enable".into(),
            positional_template: vec!["server".into(), "enable".into()],
            named_args: vec![
                NamedArgBinding {
                    schema_name: "serverId".into(),
                    flag: None,
                    bare_switch: false,
                },
                NamedArgBinding {
                    schema_name: "autoStart".into(),
                    flag: Some("--auto-start".into()),
                    bare_switch: true,
                },
            ],
            schema: vec![
                server_id_arg(),
                ArgumentSchemaEntry::string("autoStart", ArgSource::Body).kind(ArgKind::Boolean),
                principal_user_arg(),
            ],
            max_runtime: Duration::from_secs(60),
            parser: ParserKind::Progress,
            table_separator: TableSeparator::Whitespace,
            is_async: true,
            is_streaming: true,
            abortable: true,
            required_capabilities: vec!["servers.write".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 20,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: Some(progress_marker_pattern()),
            state_pattern: Some(state_transition_pattern()),
            log_pattern: None,
        },
        CommandSpec {
            name: "server.disable".into(),
            positional_template: vec!["server".into(), "disable".into()],
            named_args: vec![NamedArgBinding {
                schema_name: "serverId".into(),
                flag: None,
                bare_switch: false,
            }],
            schema: vec![server_id_arg(), principal_user_arg()],
            max_runtime: Duration::from_secs(60),
            parser: ParserKind::Progress,
            table_separator: TableSeparator::Whitespace,
            is_async: true,
            is_streaming: true,
            abortable: true,
            required_capabilities: vec!["servers.write".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 20,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: Some(progress_marker_pattern()),
            state_pattern: Some(state_transition_pattern()),
            log_pattern: None,
        },
        CommandSpec {
            name: "server.restart".into(),
            positional_template: vec!["server".into(), "restart".into()],
            named_args: vec![NamedArgBinding {
                schema_name: "serverId".into(),
                flag: None,
                bare_switch: false,
            }],
            schema: vec![server_id_arg(), principal_user_arg()],
            max_runtime: Duration::from_secs(90),
            parser: ParserKind::Progress,
            table_separator: TableSeparator::Whitespace,
            is_async: true,
            is_streaming: true,
            abortable: true,
            required_capabilities: vec!["servers.write".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 20,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![RetryableCategory::TransientIo],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: Some(progress_marker_pattern()),
            state_pattern: Some(state_transition_pattern()),
            log_pattern: None,
        },
        CommandSpec {
            name: "server.logs".into(),
            positional_template: vec!["server".into(), "logs".into()],
            named_args: vec![
                NamedArgBinding {
                    schema_name: "serverId".into(),
                    flag: None,
                    bare_switch: false,
                },
                NamedArgBinding {
                    schema_name: "follow".into(),
                    flag: Some("--follow".into()),
                    bare_switch: true,
                },
            ],
            schema: vec![
                server_id_arg(),
                ArgumentSchemaEntry::string("follow", ArgSource::Query).kind(ArgKind::Boolean),
                principal_user_arg(),
            ],
            max_runtime: Duration::from_secs(3600),
            parser: ParserKind::Log,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: true,
            abortable: true,
            required_capabilities: vec!["servers.read".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 30,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: Some(log_line_pattern()),
        },
        CommandSpec {
            name: "server.bulk".into(),
            positional_template: vec!["server".into(), "bulk".into()],
            named_args: vec![
                NamedArgBinding {
                    schema_name: "serverIds".into(),
                    flag: Some("--ids".into()),
                    bare_switch: false,
                },
                NamedArgBinding {
                    schema_name: "action".into(),
                    flag: Some("--action".into()),
                    bare_switch: false,
                },
            ],
            schema: vec![
                ArgumentSchemaEntry::string("serverIds", ArgSource::Body)
                    .kind(ArgKind::ArrayOfString)
                    .required(),
                ArgumentSchemaEntry::string("action", ArgSource::Body)
                    .enum_values(&["enable", "disable", "restart"])
                    .required(),
                principal_user_arg(),
            ],
            max_runtime: Duration::from_secs(300),
            parser: ParserKind::Progress,
            table_separator: TableSeparator::Whitespace,
            is_async: true,
            is_streaming: true,
            abortable: true,
            required_capabilities: vec!["servers.write".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 5,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: Some(progress_marker_pattern()),
            state_pattern: Some(state_transition_pattern()),
            log_pattern: None,
        },
        CommandSpec {
            name: "config.get".into(),
            positional_template: vec!["config".into(), "get".into()],
            named_args: vec![],
            schema: vec![principal_user_arg()],
            max_runtime: Duration::from_secs(10),
            parser: ParserKind::Json,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec!["config.read".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 60,
                window: Duration::from_secs(60),
            }),
            cacheable: true,
            cache_ttl: Some(Duration::from_secs(2)),
            retryable_categories: vec![RetryableCategory::TransientIo],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
        CommandSpec {
            name: "config.set".into(),
            positional_template: vec!["config".into(), "set".into()],
            named_args: vec![NamedArgBinding {
                schema_name: "configFile".into(),
                flag: Some("--config-file".into()),
                bare_switch: false,
            }],
            schema: vec![
                ArgumentSchemaEntry::string("configFile", ArgSource::Body)
                    .kind(ArgKind::FileOfJson)
                    .required(),
                principal_user_arg(),
            ],
            max_runtime: Duration::from_secs(15),
            parser: ParserKind::Json,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec!["config.write".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 20,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
        CommandSpec {
            name: "config.export".into(),
            positional_template: vec!["config".into(), "export".into()],
            named_args: vec![],
            schema: vec![principal_user_arg()],
            max_runtime: Duration::from_secs(15),
            parser: ParserKind::Json,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec!["config.read".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 20,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![RetryableCategory::TransientIo],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
        CommandSpec {
            name: "config.import".into(),
            positional_template: vec!["config".into(), "import".into()],
            named_args: vec![NamedArgBinding {
                schema_name: "configFile".into(),
                flag: Some("--config-file".into()),
                bare_switch: false,
            }],
            schema: vec![
                ArgumentSchemaEntry::string("configFile", ArgSource::Body)
                    .kind(ArgKind::FileOfJson)
                    .required(),
                principal_user_arg(),
            ],
            max_runtime: Duration::from_secs(30),
            parser: ParserKind::Json,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec!["config.write".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 10,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
        CommandSpec {
            name: "catalog.add".into(),
            positional_template: vec!["catalog".into(), "add".into()],
            named_args: vec![NamedArgBinding {
                schema_name: "entryFile".into(),
                flag: Some("--entry-file".into()),
                bare_switch: false,
            }],
            schema: vec![
                ArgumentSchemaEntry::string("entryFile", ArgSource::Body)
                    .kind(ArgKind::FileOfJson)
                    .required(),
                principal_user_arg(),
            ],
            max_runtime: Duration::from_secs(15),
            parser: ParserKind::Json,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec!["catalog.write".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 20,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
        CommandSpec {
            name: "catalog.update".into(),
            positional_template: vec!["catalog".into(), "update".into()],
            named_args: vec![
                NamedArgBinding {
                    schema_name: "customId".into(),
                    flag: None,
                    bare_switch: false,
                },
                NamedArgBinding {
                    schema_name: "entryFile".into(),
                    flag: Some("--entry-file".into()),
                    bare_switch: false,
                },
            ],
            schema: vec![
                ArgumentSchemaEntry::string("customId", ArgSource::Path)
                    .required()
                    .pattern(r"[A-Za-z0-9_-]{1,64}"),
                ArgumentSchemaEntry::string("entryFile", ArgSource::Body)
                    .kind(ArgKind::FileOfJson)
                    .required(),
                principal_user_arg(),
            ],
            max_runtime: Duration::from_secs(15),
            parser: ParserKind::Json,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec!["catalog.write".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 20,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
        CommandSpec {
            name: "catalog.remove".into(),
            positional_template: vec!["catalog".into(), "remove".into()],
            named_args: vec![NamedArgBinding {
                schema_name: "customId".into(),
                flag: None,
                bare_switch: false,
            }],
            schema: vec![
                ArgumentSchemaEntry::string("customId", ArgSource::Path)
                    .required()
                    .pattern(r"[A-Za-z0-9_-]{1,64}"),
                principal_user_arg(),
            ],
            max_runtime: Duration::from_secs(15),
            parser: ParserKind::Json,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec!["catalog.write".into()],
            rate_limit: Some(RateLimitDescriptor {
                max_requests: 20,
                window: Duration::from_secs(60),
            }),
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
        CommandSpec {
            name: "version".into(),
            positional_template: vec!["version".into()],
            named_args: vec![],
            schema: vec![],
            max_runtime: Duration::from_secs(5),
            parser: ParserKind::Raw,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec![],
            rate_limit: None,
            cacheable: true,
            cache_ttl: Some(Duration::from_secs(30)),
            retryable_categories: vec![RetryableCategory::TransientIo],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        },
    ]
}
