use std::collections::{HashMap, HashSet};

use bridge_registry::{ArgKind, ArgSource, ArgumentSchemaEntry, CommandRegistry, CommandSpec};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::invocation::{BoundValue, Invocation};
use crate::request::{Principal, RawRequest};
use crate::sanitizer::sanitize_argv_string;

/// One of the two shapes a raw value arrives in before coercion: a decoded
/// JSON value straight from the body, or a plain string from path/query/
/// header/claim sources, which never carry JSON typing of their own.
enum RawScalar<'a> {
    Json(&'a Value),
    Text(&'a str),
}

/// Validates and binds `raw` against `command_name`'s schema, producing an
/// [`Invocation`] ready for admission to the executor pool. No subprocess is
/// spawned, and no I/O beyond the registry lookup happens here (§4.2,
/// universal invariant 1: invalid input never reaches the executor).
pub fn validate(
    registry: &CommandRegistry,
    command_name: &str,
    raw: &RawRequest,
    principal: &Principal,
) -> Result<Invocation, ValidationError> {
    let spec = registry
        .lookup(command_name)
        .map_err(|_| ValidationError::UnknownCommand(command_name.to_string()))?;

    let mut bound = HashMap::with_capacity(spec.schema.len());
    for entry in &spec.schema {
        if let Some(value) = bind_entry(entry, raw, principal)? {
            bound.insert(entry.name.clone(), value);
        } else if entry.required {
            return Err(ValidationError::invalid(&entry.name, "required"));
        }
    }

    reject_unknown_body_fields(spec, raw)?;

    Ok(Invocation::new(
        spec.name.clone(),
        bound,
        principal.id.clone(),
        spec.max_runtime,
    ))
}

fn reject_unknown_body_fields(spec: &CommandSpec, raw: &RawRequest) -> Result<(), ValidationError> {
    let Value::Object(map) = &raw.body else {
        return Ok(());
    };
    let known: HashSet<&str> = spec
        .schema
        .iter()
        .filter(|entry| entry.source == ArgSource::Body)
        .map(|entry| entry.name.as_str())
        .collect();
    for key in map.keys() {
        if !known.contains(key.as_str()) {
            return Err(ValidationError::invalid(key, "not allowed"));
        }
    }
    Ok(())
}

fn raw_scalar_for<'a>(
    entry: &ArgumentSchemaEntry,
    raw: &'a RawRequest,
    principal: &'a Principal,
) -> Option<RawScalar<'a>> {
    match entry.source {
        ArgSource::Body => raw.body_field(&entry.name).map(RawScalar::Json),
        ArgSource::Path => raw.path.get(&entry.name).map(|s| RawScalar::Text(s)),
        ArgSource::Query => raw.query.get(&entry.name).map(|s| RawScalar::Text(s)),
        ArgSource::Header => raw.header.get(&entry.name).map(|s| RawScalar::Text(s)),
        ArgSource::PrincipalClaim => principal.claims.get(&entry.name).map(|s| RawScalar::Text(s)),
    }
}

fn bind_entry(
    entry: &ArgumentSchemaEntry,
    raw: &RawRequest,
    principal: &Principal,
) -> Result<Option<BoundValue>, ValidationError> {
    let Some(scalar) = raw_scalar_for(entry, raw, principal) else {
        return Ok(None);
    };
    let value = coerce(entry, scalar)?;
    check_constraints(entry, &value)?;
    Ok(Some(value))
}

fn coerce(entry: &ArgumentSchemaEntry, scalar: RawScalar<'_>) -> Result<BoundValue, ValidationError> {
    match scalar {
        RawScalar::Json(value) => coerce_json(entry, value),
        RawScalar::Text(text) => coerce_text(entry, text),
    }
}

fn coerce_json(entry: &ArgumentSchemaEntry, value: &Value) -> Result<BoundValue, ValidationError> {
    let type_error = || ValidationError::invalid(&entry.name, "does not match the expected type");
    match entry.kind {
        ArgKind::String => value
            .as_str()
            .map(|s| BoundValue::String(s.to_string()))
            .ok_or_else(type_error),
        ArgKind::Integer => value.as_i64().map(BoundValue::Integer).ok_or_else(type_error),
        ArgKind::Float => value.as_f64().map(BoundValue::Float).ok_or_else(type_error),
        ArgKind::Boolean => value.as_bool().map(BoundValue::Boolean).ok_or_else(type_error),
        ArgKind::Uuid => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(BoundValue::Uuid)
            .ok_or_else(type_error),
        ArgKind::Enum => value
            .as_str()
            .map(|s| BoundValue::Enum(s.to_string()))
            .ok_or_else(type_error),
        ArgKind::DatetimeRfc3339 => value
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| BoundValue::DatetimeRfc3339(dt.with_timezone(&chrono::Utc)))
            .ok_or_else(type_error),
        ArgKind::JsonObject => {
            if value.is_object() {
                Ok(BoundValue::JsonObject(value.clone()))
            } else {
                Err(type_error())
            }
        }
        ArgKind::FileOfJson | ArgKind::FileOfYaml => {
            if value.is_object() || value.is_array() {
                Ok(BoundValue::FileContent(value.clone()))
            } else {
                Err(type_error())
            }
        }
        ArgKind::ArrayOfString => value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map(|s| s.to_string()))
                    .collect::<Option<Vec<_>>>()
            })
            .and_then(|items| items)
            .map(BoundValue::ArrayOfString)
            .ok_or_else(type_error),
    }
}

fn coerce_text(entry: &ArgumentSchemaEntry, text: &str) -> Result<BoundValue, ValidationError> {
    let type_error = || ValidationError::invalid(&entry.name, "does not match the expected type");
    match entry.kind {
        ArgKind::String => Ok(BoundValue::String(text.to_string())),
        ArgKind::Integer => text.parse::<i64>().map(BoundValue::Integer).map_err(|_| type_error()),
        ArgKind::Float => text.parse::<f64>().map(BoundValue::Float).map_err(|_| type_error()),
        ArgKind::Boolean => match text {
            "true" => Ok(BoundValue::Boolean(true)),
            "false" => Ok(BoundValue::Boolean(false)),
            _ => Err(type_error()),
        },
        ArgKind::Uuid => Uuid::parse_str(text).map(BoundValue::Uuid).map_err(|_| type_error()),
        ArgKind::Enum => Ok(BoundValue::Enum(text.to_string())),
        ArgKind::DatetimeRfc3339 => chrono::DateTime::parse_from_rfc3339(text)
            .map(|dt| BoundValue::DatetimeRfc3339(dt.with_timezone(&chrono::Utc)))
            .map_err(|_| type_error()),
        ArgKind::JsonObject => serde_json::from_str::<Value>(text)
            .ok()
            .filter(Value::is_object)
            .map(BoundValue::JsonObject)
            .ok_or_else(type_error),
        ArgKind::FileOfJson | ArgKind::FileOfYaml => serde_json::from_str::<Value>(text)
            .ok()
            .map(BoundValue::FileContent)
            .ok_or_else(type_error),
        ArgKind::ArrayOfString => Ok(BoundValue::ArrayOfString(
            text.split(',').map(|s| s.to_string()).collect(),
        )),
    }
}

fn check_constraints(entry: &ArgumentSchemaEntry, value: &BoundValue) -> Result<(), ValidationError> {
    match value {
        BoundValue::String(s) | BoundValue::Enum(s) => {
            check_length(entry, s.len())?;
            check_pattern(entry, s)?;
            check_enum(entry, s)?;
            sanitize_argv_string(&entry.name, s)?;
        }
        BoundValue::Integer(n) => check_numeric_bounds(entry, *n as f64)?,
        BoundValue::Float(f) => check_numeric_bounds(entry, *f)?,
        BoundValue::ArrayOfString(items) => {
            if let Some(max) = entry.max_array_items {
                if items.len() > max {
                    return Err(ValidationError::invalid(&entry.name, "has too many items"));
                }
            }
            for item in items {
                sanitize_argv_string(&entry.name, item)?;
            }
        }
        BoundValue::Uuid(u) => sanitize_argv_string(&entry.name, &u.to_string())?,
        BoundValue::Boolean(_) | BoundValue::DatetimeRfc3339(_) => {}
        BoundValue::JsonObject(_) | BoundValue::FileContent(_) => {}
    }
    Ok(())
}

fn check_length(entry: &ArgumentSchemaEntry, len: usize) -> Result<(), ValidationError> {
    if let Some(min) = entry.min_length {
        if len < min {
            return Err(ValidationError::invalid(&entry.name, "is shorter than the minimum length"));
        }
    }
    if let Some(max) = entry.max_length {
        if len > max {
            return Err(ValidationError::invalid(&entry.name, "is longer than the maximum length"));
        }
    }
    Ok(())
}

fn check_pattern(entry: &ArgumentSchemaEntry, value: &str) -> Result<(), ValidationError> {
    if let Some(pattern) = &entry.pattern {
        if !pattern.is_match(value) {
            return Err(ValidationError::invalid(&entry.name, "does not match the required pattern"));
        }
    }
    Ok(())
}

fn check_enum(entry: &ArgumentSchemaEntry, value: &str) -> Result<(), ValidationError> {
    if entry.kind == ArgKind::Enum && !entry.enum_values.iter().any(|v| v == value) {
        return Err(ValidationError::invalid(&entry.name, "is not one of the allowed values"));
    }
    Ok(())
}

fn check_numeric_bounds(entry: &ArgumentSchemaEntry, value: f64) -> Result<(), ValidationError> {
    if let Some(min) = entry.min_value {
        if value < min {
            return Err(ValidationError::invalid(&entry.name, "is below the minimum value"));
        }
    }
    if let Some(max) = entry.max_value {
        if value > max {
            return Err(ValidationError::invalid(&entry.name, "is above the maximum value"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_registry::CommandRegistry;
    use serde_json::json;

    fn registry() -> CommandRegistry {
        CommandRegistry::load()
    }

    fn principal() -> Principal {
        Principal::new("user-1").with_claim("userId", "user-1")
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let reg = registry();
        let raw = RawRequest::new();
        let err = validate(&reg, "server.inspect", &raw, &principal()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidArgument { reason, .. } if reason == "required"));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let reg = registry();
        let raw = RawRequest::new();
        let err = validate(&reg, "does.not.exist", &raw, &principal()).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownCommand(_)));
    }

    #[test]
    fn valid_server_inspect_binds_server_id() {
        let reg = registry();
        let raw = RawRequest::new().with_path("serverId", "github-server_01");
        let invocation = validate(&reg, "server.inspect", &raw, &principal()).unwrap();
        assert_eq!(invocation.command_name, "server.inspect");
        assert!(matches!(
            invocation.arguments.get("serverId"),
            Some(BoundValue::String(s)) if s == "github-server_01"
        ));
    }

    #[test]
    fn unknown_body_field_is_rejected() {
        let reg = registry();
        let raw = RawRequest::new()
            .with_path("serverId", "github-server_01")
            .with_body(json!({ "unexpectedField": true }));
        let err = validate(&reg, "server.inspect", &raw, &principal()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidArgument { name, .. } if name == "unexpectedField"));
    }
}
