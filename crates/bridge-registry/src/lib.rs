//! Declarative catalog of allowed commands for the CLI bridge core.
//!
//! Loaded once at startup ([`CommandRegistry::load`] /
//! [`CommandRegistry::load_with_overlay`]) and immutable thereafter; the hot
//! path ([`CommandRegistry::lookup`]) performs no I/O and takes no locks.

mod catalog;
mod error;
mod registry;
mod schema;
mod spec;

pub use catalog::default_catalog;
pub use error::RegistryError;
pub use registry::CommandRegistry;
pub use schema::{
    ArgKind, ArgSource, ArgumentSchemaEntry, ErrorPatternRule, PatternMatcher, RateLimitDescriptor,
};
pub use spec::{CommandSpec, NamedArgBinding, ParserKind, RetryableCategory, TableSeparator};
