use thiserror::Error;

/// Errors raised for programmer misuse.
///
/// Remote failures never surface here; they are encoded into a node's `exists` flag.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpRestError {
    #[error("malformed method template '{template}': {reason}")]
    MalformedTemplate { template: String, reason: String },

    #[error("template '{template}' references unknown argument '{name}'")]
    UnknownArgument { template: String, name: String },

    #[error("entity type '{entity}' has no method '{method}'")]
    MethodNotFound { entity: String, method: String },

    #[error("entity type '{entity}' has no property '{property}'")]
    PropertyNotFound { entity: String, property: String },

    #[error("invalid property declaration '{0}'")]
    InvalidPropertyDeclaration(String),

    #[error("invalid method table: {0}")]
    InvalidMethodTable(String),

    #[error("request to {url} did not return an entity (status {status:?})")]
    NotFound { url: String, status: Option<u16> },
}

impl From<serde_json::Error> for SpRestError {
    fn from(err: serde_json::Error) -> Self {
        SpRestError::InvalidMethodTable(err.to_string())
    }
}
