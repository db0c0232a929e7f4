//! Endpoint model: a node URL tagged with the chain variant it serves.

use serde::{Deserialize, Serialize};

/// A named chain flavor. Endpoints of different variants are not
/// interchangeable within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainVariant {
    /// The legacy chain.
    Steem,
    /// The alternate fork.
    Hive,
}

impl std::fmt::Display for ChainVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Steem => write!(f, "steem"),
            Self::Hive => write!(f, "hive"),
        }
    }
}

impl std::str::FromStr for ChainVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "steem" => Ok(Self::Steem),
            "hive" => Ok(Self::Hive),
            other => Err(format!("unknown chain variant: {other}")),
        }
    }
}

/// One RPC node address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub variant: ChainVariant,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, variant: ChainVariant) -> Self {
        Self { url: url.into(), variant }
    }

    /// `true` for `wss://` / `ws://` endpoints.
    pub fn is_websocket(&self) -> bool {
        self.url.starts_with("wss://") || self.url.starts_with("ws://")
    }

    /// `true` for `https://` / `http://` endpoints.
    pub fn is_http(&self) -> bool {
        self.url.starts_with("https://") || self.url.starts_with("http://")
    }
}

/// Built-in public nodes, in their unprobed seed order.
pub const SEED_NODES: &[(&str, ChainVariant)] = &[
    ("https://api.steemit.com", ChainVariant::Steem),
    ("https://api.justyy.com", ChainVariant::Steem),
    ("https://steemapi.boylikegirl.club", ChainVariant::Steem),
    ("https://api.steememory.com", ChainVariant::Steem),
    ("https://api.hive.blog", ChainVariant::Hive),
    ("https://api.openhive.network", ChainVariant::Hive),
    ("https://anyx.io", ChainVariant::Hive),
    ("https://rpc.ecency.com", ChainVariant::Hive),
    ("https://api.deathwing.me", ChainVariant::Hive),
    ("https://hived.emre.sh", ChainVariant::Hive),
    ("wss://rpc.ecency.com", ChainVariant::Hive),
];

pub fn seed_endpoints() -> Vec<Endpoint> {
    SEED_NODES
        .iter()
        .map(|(url, variant)| Endpoint::new(*url, *variant))
        .collect()
}
