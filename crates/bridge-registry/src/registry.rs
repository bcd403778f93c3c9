use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::catalog::default_catalog;
use crate::error::RegistryError;
use crate::spec::{CommandSpec, NamedArgBinding};

/// Read-only after construction: §4.1 "No I/O after initialization."
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandSpec>,
}

#[derive(Debug, Deserialize)]
struct CatalogOverlay {
    #[serde(default)]
    commands: Vec<CommandSpec>,
}

impl CommandRegistry {
    /// Loads the built-in catalog (§6's table) with no overlay.
    pub fn load() -> Result<Self, RegistryError> {
        Self::from_specs(default_catalog())
    }

    /// Loads the built-in catalog merged with a TOML overlay file — the
    /// "config" half of §4.1's "loaded ... from an internal source (code or
    /// config)". Overlay entries with a name matching a built-in command
    /// replace it; others are appended.
    pub fn load_with_overlay(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::OverlayRead {
            path: path.display().to_string(),
            source,
        })?;
        let overlay: CatalogOverlay =
            toml::from_str(&raw).map_err(|source| RegistryError::OverlayParse {
                path: path.display().to_string(),
                source,
            })?;

        let mut by_name: HashMap<String, CommandSpec> = default_catalog()
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        for spec in overlay.commands {
            by_name.insert(spec.name.clone(), spec);
        }
        Self::from_specs(by_name.into_values().collect())
    }

    pub fn from_specs(specs: Vec<CommandSpec>) -> Result<Self, RegistryError> {
        let mut commands = HashMap::with_capacity(specs.len());
        for spec in specs {
            validate_spec(&spec)?;
            if commands.contains_key(&spec.name) {
                return Err(RegistryError::DuplicateCommand(spec.name));
            }
            commands.insert(spec.name.clone(), spec);
        }
        Ok(Self { commands })
    }

    /// `lookup(command-name) → CommandSpec | NotFound`, per §4.1.
    pub fn lookup(&self, command_name: &str) -> Result<&CommandSpec, RegistryError> {
        self.commands
            .get(command_name)
            .ok_or_else(|| RegistryError::NotFound(command_name.to_string()))
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn validate_spec(spec: &CommandSpec) -> Result<(), RegistryError> {
    for NamedArgBinding { schema_name, .. } in &spec.named_args {
        if spec.schema_for(schema_name).is_none() {
            return Err(RegistryError::MissingSchemaEntry {
                command: spec.name.clone(),
                arg: schema_name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_catalog_loads_and_every_template_arg_has_a_schema_entry() {
        let registry = CommandRegistry::load().expect("built-in catalog must be valid");
        assert!(registry.lookup("server.list").is_ok());
        assert!(registry.lookup("server.enable").is_ok());
    }

    #[test]
    fn unknown_command_is_not_found() {
        let registry = CommandRegistry::load().unwrap();
        let err = registry.lookup("server.teleport").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(name) if name == "server.teleport"));
    }

    #[test]
    fn overlay_merges_and_overrides_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let overlay_path = dir.path().join("catalog.toml");
        std::fs::write(
            &overlay_path,
            r#"
            [[commands]]
            name = "server.list"
            positional_template = ["server", "list", "--verbose"]
            named_args = []
            schema = []
            max_runtime = 20
            parser = "json"
            table_separator = "whitespace"
            is_async = false
            is_streaming = false
            abortable = false
            required_capabilities = []
            cacheable = false
            retryable_categories = []
            error_patterns = []
            allowed_env = []
            accepts_stdin = false
            "#,
        )
        .unwrap();

        let registry = CommandRegistry::load_with_overlay(&overlay_path).unwrap();
        let spec = registry.lookup("server.list").unwrap();
        assert_eq!(
            spec.positional_template,
            vec!["server".to_string(), "list".to_string(), "--verbose".to_string()]
        );
        // Built-ins not named in the overlay survive untouched.
        assert!(registry.lookup("server.enable").is_ok());
    }

    #[test]
    fn missing_schema_entry_for_template_arg_is_rejected() {
        use crate::schema::{ArgSource, ArgumentSchemaEntry};
        use crate::spec::{ParserKind, TableSeparator};
        use std::time::Duration;

        let bad_spec = CommandSpec {
            name: "broken".into(),
            positional_template: vec!["broken".into()],
            named_args: vec![NamedArgBinding {
                schema_name: "missing".into(),
                flag: Some("--missing".into()),
                bare_switch: false,
            }],
            schema: vec![ArgumentSchemaEntry::string("present", ArgSource::Body)],
            max_runtime: Duration::from_secs(1),
            parser: ParserKind::Raw,
            table_separator: TableSeparator::Whitespace,
            is_async: false,
            is_streaming: false,
            abortable: false,
            required_capabilities: vec![],
            rate_limit: None,
            cacheable: false,
            cache_ttl: None,
            retryable_categories: vec![],
            error_patterns: vec![],
            allowed_env: vec![],
            accepts_stdin: false,
            progress_pattern: None,
            state_pattern: None,
            log_pattern: None,
        };

        let err = CommandRegistry::from_specs(vec![bad_spec]).unwrap_err();
        assert!(matches!(err, RegistryError::MissingSchemaEntry { .. }));
    }
}
