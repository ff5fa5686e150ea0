use std::path::Path;

use serde::Deserialize;

use crate::errors::ConfigError;

/// Where a PEM blob comes from. The two forms are mutually exclusive per
/// field — decoding a [`PemFieldRaw`] with both or neither set is an error.
#[derive(Clone, Debug)]
pub enum PemSource {
    Path(String),
    Inline(Vec<u8>),
}

#[derive(Deserialize, Clone, Debug, Default)]
struct PemFieldRaw {
    path: Option<String>,
    #[serde(default)]
    inline: Option<String>,
}

fn pem_source(field: &'static str, raw: Option<PemFieldRaw>) -> Result<Option<PemSource>, ConfigError> {
    let Some(raw) = raw else { return Ok(None) };
    match (raw.path, raw.inline) {
        (Some(_), Some(_)) => Err(ConfigError::AmbiguousPem { field }),
        (None, None) => Err(ConfigError::MissingPem { field }),
        (Some(path), None) => Ok(Some(PemSource::Path(path))),
        (None, Some(inline)) => Ok(Some(PemSource::Inline(inline.into_bytes()))),
    }
}

/// mTLS material for a backend client or the gRPC server listener. Server
/// certs are required; `client_ca` is only present when client-cert auth is
/// enabled.
#[derive(Clone, Debug)]
pub struct MtlsSpec {
    pub cert: PemSource,
    pub key: PemSource,
    pub client_ca: Option<PemSource>,
}

#[derive(Deserialize, Clone, Debug, Default)]
struct MtlsSpecRaw {
    cert: Option<PemFieldRaw>,
    key: Option<PemFieldRaw>,
    #[serde(rename = "clientCA")]
    client_ca: Option<PemFieldRaw>,
}

impl MtlsSpecRaw {
    fn into_spec(self) -> Result<MtlsSpec, ConfigError> {
        let cert = pem_source("cert", self.cert)?.ok_or(ConfigError::MissingPem { field: "cert" })?;
        let key = pem_source("key", self.key)?.ok_or(ConfigError::MissingPem { field: "key" })?;
        let client_ca = pem_source("clientCA", self.client_ca)?;
        Ok(MtlsSpec { cert, key, client_ca })
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct EtcdClientSpec {
    pub endpoints: Vec<String>,
    #[serde(default)]
    certs: Option<MtlsSpecRaw>,
}

impl EtcdClientSpec {
    pub fn certs(&self) -> Result<Option<MtlsSpec>, ConfigError> {
        self.certs.clone().map(MtlsSpecRaw::into_spec).transpose()
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct JetStreamClientSpec {
    pub endpoint: String,
    #[serde(default, rename = "nkeySeedPath")]
    pub nkey_seed_path: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RedisClientSpec {
    /// One address per independent node; the quorum engine treats each as a
    /// separate pool, so a single-node deployment is just `addrs.len() == 1`.
    pub addrs: Vec<String>,
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_network() -> String {
    "tcp".to_owned()
}

#[derive(Deserialize, Clone, Debug)]
pub struct CassandraClientSpec {
    pub nodes: Vec<String>,
    #[serde(default)]
    pub keyspace: Option<String>,
}

/// Decoded server configuration: at most one backend variant may be set.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct BrokerSpec {
    #[serde(default)]
    pub etcd: Option<EtcdClientSpec>,
    #[serde(default)]
    pub jetstream: Option<JetStreamClientSpec>,
    #[serde(default)]
    pub redis: Option<RedisClientSpec>,
    #[serde(default)]
    pub cassandra: Option<CassandraClientSpec>,
}

impl BrokerSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let set = [
            self.etcd.is_some(),
            self.jetstream.is_some(),
            self.redis.is_some(),
            self.cassandra.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count();
        if set != 1 {
            return Err(ConfigError::AmbiguousBackend(set));
        }
        Ok(())
    }
}

/// Decodes a [`BrokerSpec`] from raw bytes: try JSON first, then fall back
/// to TOML, matching the original server's auto-detect decode order.
pub fn decode(data: &[u8]) -> Result<BrokerSpec, ConfigError> {
    if let Ok(spec) = serde_json::from_slice::<BrokerSpec>(data) {
        spec.validate()?;
        return Ok(spec);
    }
    let text = std::str::from_utf8(data).map_err(|e| ConfigError::Decode(e.to_string()))?;
    let spec: BrokerSpec = toml::from_str(text).map_err(|e| ConfigError::Decode(e.to_string()))?;
    spec.validate()?;
    Ok(spec)
}

pub fn load(path: impl AsRef<Path>) -> Result<BrokerSpec, ConfigError> {
    let data = std::fs::read(path.as_ref())
        .map_err(|e| ConfigError::Decode(format!("reading {}: {e}", path.as_ref().display())))?;
    decode(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_json_redis_spec() {
        let json = br#"{"redis": {"addrs": ["127.0.0.1:6379"]}}"#;
        let spec = decode(json).unwrap();
        assert!(spec.redis.is_some());
        assert!(spec.etcd.is_none());
    }

    #[test]
    fn decodes_toml_etcd_spec() {
        let toml = b"[etcd]\nendpoints = [\"http://127.0.0.1:2379\"]\n";
        let spec = decode(toml).unwrap();
        assert!(spec.etcd.is_some());
    }

    #[test]
    fn rejects_ambiguous_backend() {
        let json = br#"{"redis": {"addrs": ["a"]}, "etcd": {"endpoints": ["b"]}}"#;
        assert!(matches!(decode(json), Err(ConfigError::AmbiguousBackend(2))));
    }

    #[test]
    fn rejects_ambiguous_pem_field() {
        let raw = MtlsSpecRaw {
            cert: Some(PemFieldRaw { path: Some("a".into()), inline: Some("b".into()) }),
            key: Some(PemFieldRaw { path: Some("a".into()), inline: None }),
            client_ca: None,
        };
        assert!(matches!(raw.into_spec(), Err(ConfigError::AmbiguousPem { field: "cert" })));
    }
}
