use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("command `{0}` is not in the registry")]
    NotFound(String),

    #[error("duplicate command name `{0}` in catalog")]
    DuplicateCommand(String),

    #[error("command `{command}` references argument `{arg}` in its template with no schema entry")]
    MissingSchemaEntry { command: String, arg: String },

    #[error("failed to read catalog overlay `{path}`: {source}")]
    OverlayRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog overlay `{path}`: {source}")]
    OverlayParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
