use std::collections::HashMap;

use serde_json::Value;

/// An authenticated caller, already resolved by the (out of scope)
/// `AuthProvider` collaborator before validation ever sees the request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub claims: HashMap<String, String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            claims: HashMap::new(),
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }
}

/// The pre-binding inbound argument bag, assembled by the (out of scope) HTTP
/// front from whatever surface received the call. Validation reads from the
/// bucket named by each schema entry's [`crate::ArgSource`]; body values are
/// looked up by key inside `body`, everything else from its own flat map.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub body: Value,
    pub path: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub header: HashMap<String, String>,
}

impl RawRequest {
    pub fn new() -> Self {
        Self {
            body: Value::Object(serde_json::Map::new()),
            path: HashMap::new(),
            query: HashMap::new(),
            header: HashMap::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_path(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub(crate) fn body_field(&self, name: &str) -> Option<&Value> {
        self.body.as_object().and_then(|map| map.get(name))
    }
}
