use serde::{Deserialize, Serialize};

/// Logging configuration decoded as part of a node's [`crate::config::BrokerSpec`].
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct Config {
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub quiet: bool,
}
