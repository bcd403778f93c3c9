use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The wire/value kind an argument is validated and coerced against.
///
/// `FileOfJson`/`FileOfYaml` arguments never reach the subprocess as a literal
/// CLI token: the validator holds them as structured data and the executor
/// asks the temp artifact manager to materialize them to a file, substituting
/// the resulting path into the argv template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgKind {
    String,
    Integer,
    Float,
    Boolean,
    Uuid,
    Enum,
    DatetimeRfc3339,
    JsonObject,
    FileOfJson,
    FileOfYaml,
    ArrayOfString,
}

impl ArgKind {
    /// `file-of-*` kinds are staged through the temp artifact manager rather
    /// than interpolated as a literal argv token.
    pub fn is_file_backed(self) -> bool {
        matches!(self, ArgKind::FileOfJson | ArgKind::FileOfYaml)
    }
}

/// Where an argument's raw value is sourced from on the inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgSource {
    Body,
    Path,
    Query,
    Header,
    PrincipalClaim,
}

/// One entry in a [`crate::CommandSpec`]'s argument schema.
///
/// Every argument referenced by a command's argv template must have exactly
/// one corresponding entry (checked by [`crate::CommandRegistry::validate_catalog`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentSchemaEntry {
    pub name: String,
    pub kind: ArgKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, with = "pattern_serde")]
    pub pattern: Option<PatternMatcher>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub enum_values: Vec<String>,
    #[serde(default)]
    pub max_array_items: Option<usize>,
    #[serde(default)]
    pub sanitizer_tag: Option<String>,
    pub source: ArgSource,
}

impl ArgumentSchemaEntry {
    pub fn string(name: impl Into<String>, source: ArgSource) -> Self {
        Self {
            name: name.into(),
            kind: ArgKind::String,
            required: false,
            pattern: None,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            enum_values: Vec::new(),
            max_array_items: None,
            sanitizer_tag: None,
            source,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn kind(mut self, kind: ArgKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(PatternMatcher::new(pattern));
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn enum_values(mut self, values: &[&str]) -> Self {
        self.kind = ArgKind::Enum;
        self.enum_values = values.iter().map(|v| v.to_string()).collect();
        self
    }
}

/// An anchored regex, matched against the *entire* input per spec §4.2.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    source: String,
    anchored: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Self {
        let anchored_source = format!("^(?:{pattern})$");
        let anchored = Regex::new(&anchored_source)
            .unwrap_or_else(|err| panic!("invalid argument pattern `{pattern}`: {err}"));
        Self {
            source: pattern.to_string(),
            anchored,
        }
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.anchored.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for PatternMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

mod pattern_serde {
    use super::PatternMatcher;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<PatternMatcher>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(p) => serializer.serialize_some(p.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<PatternMatcher>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.map(|p| PatternMatcher::new(&p)))
    }
}

/// A regex → category mapping applied to a failed command's complete stderr.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPatternRule {
    #[serde(with = "regex_serde")]
    pub pattern: Regex,
    pub category: String,
    pub user_message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
}

mod regex_serde {
    use regex::Regex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Regex, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Regex, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Regex::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde support for an unanchored, capture-group-bearing regex applied to
/// free text rather than validated against a whole argument value (progress
/// markers, state-transition sentences, log timestamp/severity prefixes).
/// Separate from [`pattern_serde`] because those patterns are anchored
/// (`^(?:...)$`) for whole-value matching; these are searched within a line.
pub(crate) mod regex_opt_serde {
    use regex::Regex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Regex>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(r) => serializer.serialize_some(r.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|pattern| Regex::new(&pattern).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Refill policy for a command's per-principal rate limit bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitDescriptor {
    pub max_requests: u32,
    #[serde(with = "duration_secs")]
    pub window: Duration,
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

pub(crate) mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
