//! Thin chain-object wrappers.
//!
//! Every object takes an optional explicit connection; without one it binds
//! to the registry's shared instance. The binding is resolved once, in the
//! constructor, and kept for the object's lifetime.
//!
//! Objects that fetch data on construction (accounts, blocks, comments, …)
//! surface a dead lazy connection as a construction error. [`Wallet`] and
//! [`TransactionBuilder`] do not fetch, so the first call on their connection
//! is where such a failure shows up.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::connection::ConnectionHandle;
use crate::error::TransportError;
use crate::registry::InstanceRegistry;

/// An object bound to one connection.
pub trait Bound {
    fn connection(&self) -> &Arc<ConnectionHandle>;

    /// URL of the endpoint serving this object.
    fn endpoint(&self) -> &str {
        self.connection().url()
    }
}

macro_rules! impl_bound {
    ($($ty:ty),+ $(,)?) => {
        $(impl Bound for $ty {
            fn connection(&self) -> &Arc<ConnectionHandle> {
                &self.conn
            }
        })+
    };
}

impl_bound!(
    Account,
    Amount,
    Block,
    Blockchain,
    Comment,
    Market,
    Price,
    Vote,
    Wallet,
    Witness,
    TransactionBuilder,
);

fn split_authorperm(authorperm: &str) -> Result<(String, String), TransportError> {
    authorperm
        .trim_start_matches('@')
        .split_once('/')
        .filter(|(a, p)| !a.is_empty() && !p.is_empty())
        .map(|(a, p)| (a.to_string(), p.to_string()))
        .ok_or_else(|| TransportError::Other(format!("invalid authorperm: {authorperm}")))
}

// ─── Account ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Account {
    name: String,
    data: Value,
    conn: Arc<ConnectionHandle>,
}

impl Account {
    pub async fn load(
        name: impl Into<String>,
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let name = name.into();
        let conn = registry.resolve(conn).await?;
        let accounts: Vec<Value> = conn
            .call("condenser_api.get_accounts", vec![json!([name])])
            .await?;
        let data = accounts
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::NotFound { kind: "account", id: name.clone() })?;
        Ok(Self { name, data, conn })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Liquid balance, bound to this account's connection.
    pub async fn balance(&self) -> Result<Amount, TransportError> {
        let raw = self
            .data
            .get("balance")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Other(format!("account {} has no balance", self.name)))?;
        Amount::new(raw, Some(Arc::clone(&self.conn)), None).await
    }
}

// ─── Amount / Price ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Amount {
    amount: f64,
    symbol: String,
    conn: Arc<ConnectionHandle>,
}

impl Amount {
    /// Parse `"<amount> <SYMBOL>"`. Connects the bound handle, since asset
    /// resolution needs a live chain.
    ///
    /// `registry` may be `None` only when `conn` is given.
    pub async fn new(
        s: &str,
        conn: Option<Arc<ConnectionHandle>>,
        registry: Option<&InstanceRegistry>,
    ) -> Result<Self, TransportError> {
        let (amount, symbol) = s
            .trim()
            .split_once(char::is_whitespace)
            .and_then(|(a, sym)| Some((a.parse::<f64>().ok()?, sym.trim().to_string())))
            .filter(|(_, sym)| !sym.is_empty())
            .ok_or_else(|| TransportError::Other(format!("invalid amount: {s}")))?;
        let conn = resolve_with(conn, registry).await?;
        conn.connect().await?;
        Ok(Self { amount, symbol, conn })
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

#[derive(Debug, Clone)]
pub struct Price {
    price: f64,
    base: String,
    quote: String,
    conn: Arc<ConnectionHandle>,
}

impl Price {
    /// `pair` is `"BASE/QUOTE"`, e.g. `"STEEM/SBD"`.
    pub async fn new(
        price: f64,
        pair: &str,
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let (base, quote) = pair
            .split_once('/')
            .filter(|(b, q)| !b.is_empty() && !q.is_empty())
            .ok_or_else(|| TransportError::Other(format!("invalid market pair: {pair}")))?;
        let conn = registry.resolve(conn).await?;
        conn.connect().await?;
        Ok(Self {
            price,
            base: base.to_string(),
            quote: quote.to_string(),
            conn,
        })
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn pair(&self) -> (&str, &str) {
        (&self.base, &self.quote)
    }
}

async fn resolve_with(
    conn: Option<Arc<ConnectionHandle>>,
    registry: Option<&InstanceRegistry>,
) -> Result<Arc<ConnectionHandle>, TransportError> {
    match (conn, registry) {
        (Some(conn), _) => Ok(conn),
        (None, Some(registry)) => Ok(registry.shared_instance().await?),
        (None, None) => Err(TransportError::Other(
            "no connection and no registry to resolve one from".into(),
        )),
    }
}

// ─── Blocks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Block {
    number: u64,
    data: Value,
    conn: Arc<ConnectionHandle>,
}

impl Block {
    pub async fn load(
        number: u64,
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let conn = registry.resolve(conn).await?;
        let data = conn.call_raw("condenser_api.get_block", vec![json!(number)]).await?;
        if data.is_null() {
            return Err(TransportError::NotFound { kind: "block", id: number.to_string() });
        }
        Ok(Self { number, data, conn })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

#[derive(Debug, Clone)]
pub struct Blockchain {
    properties: Value,
    conn: Arc<ConnectionHandle>,
}

impl Blockchain {
    pub async fn new(
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let conn = registry.resolve(conn).await?;
        let properties = conn
            .call_raw("condenser_api.get_dynamic_global_properties", Vec::new())
            .await?;
        Ok(Self { properties, conn })
    }

    pub fn head_block_number(&self) -> Option<u64> {
        self.properties.get("head_block_number").and_then(Value::as_u64)
    }
}

// ─── Comments & votes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Comment {
    author: String,
    permlink: String,
    data: Value,
    conn: Arc<ConnectionHandle>,
}

impl Comment {
    /// `authorperm` is `"@author/permlink"`.
    pub async fn load(
        authorperm: &str,
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let (author, permlink) = split_authorperm(authorperm)?;
        let conn = registry.resolve(conn).await?;
        let data = conn
            .call_raw("condenser_api.get_content", vec![json!(author), json!(permlink)])
            .await?;
        if data.get("author").and_then(Value::as_str).map_or(true, str::is_empty) {
            return Err(TransportError::NotFound { kind: "comment", id: authorperm.to_string() });
        }
        Ok(Self { author, permlink, data, conn })
    }

    pub fn authorperm(&self) -> String {
        format!("@{}/{}", self.author, self.permlink)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

#[derive(Debug, Clone)]
pub struct Vote {
    voter: String,
    data: Value,
    conn: Arc<ConnectionHandle>,
}

impl Vote {
    /// `authorpermvoter` is `"@author/permlink|voter"`.
    pub async fn load(
        authorpermvoter: &str,
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let (authorperm, voter) = authorpermvoter
            .split_once('|')
            .ok_or_else(|| TransportError::Other(format!("invalid vote id: {authorpermvoter}")))?;
        let (author, permlink) = split_authorperm(authorperm)?;
        let conn = registry.resolve(conn).await?;
        let votes: Vec<Value> = conn
            .call("condenser_api.get_active_votes", vec![json!(author), json!(permlink)])
            .await?;
        let data = votes
            .into_iter()
            .find(|v| v.get("voter").and_then(Value::as_str) == Some(voter))
            .ok_or_else(|| TransportError::NotFound {
                kind: "vote",
                id: authorpermvoter.to_string(),
            })?;
        Ok(Self { voter: voter.to_string(), data, conn })
    }

    pub fn voter(&self) -> &str {
        &self.voter
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

// ─── Witnesses & market ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Witness {
    owner: String,
    data: Value,
    conn: Arc<ConnectionHandle>,
}

impl Witness {
    pub async fn load(
        owner: impl Into<String>,
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let owner = owner.into();
        let conn = registry.resolve(conn).await?;
        let data = conn
            .call_raw("condenser_api.get_witness_by_account", vec![json!(owner)])
            .await?;
        if data.is_null() {
            return Err(TransportError::NotFound { kind: "witness", id: owner });
        }
        Ok(Self { owner, data, conn })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

#[derive(Debug, Clone)]
pub struct Market {
    ticker: Value,
    conn: Arc<ConnectionHandle>,
}

impl Market {
    pub async fn new(
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let conn = registry.resolve(conn).await?;
        let ticker = conn.call_raw("condenser_api.get_ticker", Vec::new()).await?;
        Ok(Self { ticker, conn })
    }

    pub fn ticker(&self) -> &Value {
        &self.ticker
    }
}

// ─── Write path ───────────────────────────────────────────────────────────────

/// Key storage front end. Construction never touches the network.
#[derive(Debug, Clone)]
pub struct Wallet {
    conn: Arc<ConnectionHandle>,
}

impl Wallet {
    pub async fn new(
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let conn = registry.resolve(conn).await?;
        Ok(Self { conn })
    }
}

/// Collects operations for a transaction. Construction never touches the
/// network.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    ops: Vec<Value>,
    conn: Arc<ConnectionHandle>,
}

impl TransactionBuilder {
    pub async fn new(
        conn: Option<Arc<ConnectionHandle>>,
        registry: &InstanceRegistry,
    ) -> Result<Self, TransportError> {
        let conn = registry.resolve(conn).await?;
        Ok(Self { ops: Vec::new(), conn })
    }

    pub fn append_op(&mut self, op: Value) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[Value] {
        &self.ops
    }

    /// Whether the bound connection forbids broadcasting.
    pub fn nobroadcast(&self) -> bool {
        self.conn.nobroadcast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorperm_parsing() {
        assert_eq!(
            split_authorperm("@alice/hello-world").unwrap(),
            ("alice".to_string(), "hello-world".to_string())
        );
        assert!(split_authorperm("@alice").is_err());
        assert!(split_authorperm("/perm").is_err());
    }
}
