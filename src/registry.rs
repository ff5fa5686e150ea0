use std::collections::HashMap;
use std::sync::Arc;

use deadpool_redis::{Config as RedisPoolConfig, Runtime};

use crate::config::BrokerSpec;
use crate::engines::cas::CasEngine;
use crate::engines::exclusive::ExclusiveEngine;
use crate::engines::lease::LeaseEngine;
use crate::engines::quorum::QuorumEngine;
use crate::engines::Engine;
use crate::errors::BrokerError;
use crate::globals::DEFAULT_LOCK_EXPIRY;
use crate::manager::LockManager;

type Factory = Box<
    dyn Fn(
            &BrokerSpec,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<LockManager, BrokerError>> + Send + '_>,
        > + Send
        + Sync,
>;

/// Process-wide name → factory mapping (Component F). Selection inspects
/// which single field of a decoded [`BrokerSpec`] is set; exactly one must
/// be, enforced by [`BrokerSpec::validate`] before a factory ever runs.
pub struct Registry {
    factories: HashMap<&'static str, Factory>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut factories: HashMap<&'static str, Factory> = HashMap::new();
        factories.insert("etcd", Box::new(|spec| Box::pin(build_etcd(spec))));
        factories.insert("jetstream", Box::new(|spec| Box::pin(build_jetstream(spec))));
        factories.insert("redis", Box::new(|spec| Box::pin(build_redis(spec))));
        factories.insert("cassandra", Box::new(|spec| Box::pin(build_cassandra(spec))));
        Registry { factories }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn select_name(spec: &BrokerSpec) -> Result<&'static str, BrokerError> {
        spec.validate()?;
        if spec.etcd.is_some() {
            return Ok("etcd");
        }
        if spec.jetstream.is_some() {
            return Ok("jetstream");
        }
        if spec.redis.is_some() {
            return Ok("redis");
        }
        if spec.cassandra.is_some() {
            return Ok("cassandra");
        }
        unreachable!("validate() guarantees exactly one backend is set")
    }

    /// Builds the [`LockManager`] for whichever single backend is set in
    /// `spec`. This is the only place backend names appear as strings; the
    /// rest of the core never branches on backend identity.
    pub async fn build(&self, spec: &BrokerSpec) -> Result<LockManager, BrokerError> {
        let name = Self::select_name(spec)?;
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BrokerError::UnknownBackend(name.to_owned()))?;
        factory(spec).await
    }
}

async fn build_etcd(spec: &BrokerSpec) -> Result<LockManager, BrokerError> {
    let etcd = spec.etcd.as_ref().expect("selected by build()");
    let client = etcd_client::Client::connect(&etcd.endpoints, None)
        .await
        .map_err(|e| BrokerError::Connect { backend: "etcd", source: e.into() })?;
    let engine = LeaseEngine::new(client, DEFAULT_LOCK_EXPIRY);
    Ok(LockManager::new(Arc::new(engine), "lock"))
}

async fn build_jetstream(spec: &BrokerSpec) -> Result<LockManager, BrokerError> {
    let js_spec = spec.jetstream.as_ref().expect("selected by build()");
    let client = async_nats::connect(&js_spec.endpoint)
        .await
        .map_err(|e| BrokerError::Connect { backend: "jetstream", source: e.into() })?;
    let js = async_nats::jetstream::new(client);
    let engine = ExclusiveEngine::new(js);
    Ok(LockManager::new(Arc::new(engine), "lock"))
}

async fn build_redis(spec: &BrokerSpec) -> Result<LockManager, BrokerError> {
    let redis_spec = spec.redis.as_ref().expect("selected by build()");
    let mut pools = Vec::with_capacity(redis_spec.addrs.len());
    for addr in &redis_spec.addrs {
        let url = format!("redis://{addr}");
        let cfg = RedisPoolConfig::from_url(url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BrokerError::Connect { backend: "redis", source: e.into() })?;
        pools.push(pool);
    }
    let engine = QuorumEngine::new(pools, DEFAULT_LOCK_EXPIRY);
    Ok(LockManager::new(Arc::new(engine), "lock"))
}

async fn build_cassandra(spec: &BrokerSpec) -> Result<LockManager, BrokerError> {
    let cass_spec = spec.cassandra.as_ref().expect("selected by build()");
    let mut builder = scylla::SessionBuilder::new().known_nodes(&cass_spec.nodes);
    if let Some(keyspace) = &cass_spec.keyspace {
        builder = builder.use_keyspace(keyspace, false);
    }
    let session = builder
        .build()
        .await
        .map_err(|e| BrokerError::Connect { backend: "cassandra", source: e.into() })?;
    let engine = CasEngine::new(Arc::new(session));
    Ok(LockManager::new(Arc::new(engine), "lock"))
}
