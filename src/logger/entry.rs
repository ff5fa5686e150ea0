use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use slog::{Key, Record, SerdeValue, Serializer, KV};

/// A single structured log line emitted by an engine or the gRPC session.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Entry {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub deployment_id: String,
    pub level: String,
    pub kind: ErrKind,
    pub time: String,
    /// Backend engine emitting the entry (`redis`, `etcd`, `jetstream`, `cassandra`).
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub backend: String,
    /// Lock key the entry concerns, if any.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub key: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub owner: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<Trace>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Trace {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, String>,
}

impl slog::Value for Entry {
    fn serialize(&self, _record: &Record, key: Key, serializer: &mut dyn Serializer) -> slog::Result {
        serializer.emit_serde(key, self)
    }
}

impl SerdeValue for Entry {
    fn as_serde(&self) -> &dyn erased_serde::Serialize {
        self
    }

    fn to_sendable(&self) -> Box<dyn SerdeValue + Send + 'static> {
        Box::new(self.clone())
    }
}

impl KV for Entry {
    fn serialize(&self, _record: &Record, serializer: &mut dyn Serializer) -> slog::Result {
        serializer.emit_serde("entry".into(), self)
    }
}

#[derive(Serialize, Deserialize, Clone, strum::ToString, Debug)]
pub enum ErrKind {
    System,
    Application,
}
