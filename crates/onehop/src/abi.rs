//! Contract interface resolution: fetch a contract's JSON ABI from a
//! block-explorer service and memoize it per address.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::codec::{self, FunctionSignature, ParamType};
use crate::error::AbiError;
use crate::token::Address;

/// Default explorer endpoint (BscScan).
pub const DEFAULT_EXPLORER_URL: &str = "https://api.bscscan.com/api";

/// One entry of an explorer-style JSON ABI.
#[derive(Debug, Clone, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub inputs: Vec<AbiParam>,

    #[serde(default)]
    pub outputs: Vec<AbiParam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,
}

/// A resolved contract interface.
#[derive(Debug, Clone)]
pub struct AbiDocument {
    pub address: Address,
    entries: Vec<AbiEntry>,
}

/// A function looked up in a resolved ABI: its call signature plus the
/// output types needed to decode return data.
#[derive(Debug, Clone)]
pub struct AbiFunction {
    pub signature: FunctionSignature,
    pub outputs: Vec<ParamType>,
}

impl AbiDocument {
    pub fn from_json(address: Address, json: &str) -> Result<Self, AbiError> {
        let entries: Vec<AbiEntry> =
            serde_json::from_str(json).map_err(|e| AbiError::Malformed(e.to_string()))?;
        Ok(Self { address, entries })
    }

    /// Look up a function by name and build its canonical signature from
    /// the declared input types.
    pub fn function(&self, name: &str) -> Result<AbiFunction, AbiError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.kind == "function" && e.name.as_deref() == Some(name))
            .ok_or_else(|| AbiError::MissingFunction {
                name: name.to_string(),
                address: self.address.to_string(),
            })?;

        let canonical = format!(
            "{}({})",
            name,
            entry
                .inputs
                .iter()
                .map(|p| p.kind.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );
        let signature = codec::parse_signature(&canonical)
            .map_err(|e| AbiError::Malformed(format!("{name}: {e}")))?;

        let outputs = entry
            .outputs
            .iter()
            .map(|p| codec::parse_param_type(&p.kind))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AbiError::Malformed(format!("{name} outputs: {e}")))?;

        Ok(AbiFunction { signature, outputs })
    }
}

/// Trait for ABI lookup backends (block explorer, embedded, test fixtures).
#[async_trait]
pub trait AbiSource: Send + Sync {
    async fn fetch(&self, address: &Address) -> Result<AbiDocument, AbiError>;
}

/// Explorer envelope: `{"status":"1","message":"OK","result":"<abi json>"}`.
#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    #[serde(default)]
    status: String,

    #[serde(default)]
    message: String,

    #[serde(default)]
    result: String,
}

/// Fetches verified-contract ABIs from an Etherscan-compatible API.
pub struct EtherscanSource {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EtherscanSource {
    pub fn new(api_key: &str) -> Self {
        Self::with_url(DEFAULT_EXPLORER_URL, api_key)
    }

    pub fn with_url(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl AbiSource for EtherscanSource {
    async fn fetch(&self, address: &Address) -> Result<AbiDocument, AbiError> {
        let address_text = address.to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("module", "contract"),
                ("action", "getabi"),
                ("address", address_text.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AbiError::Transport(e.to_string()))?;

        let envelope: ExplorerEnvelope = response
            .json()
            .await
            .map_err(|e| AbiError::Malformed(e.to_string()))?;

        // The explorer reports "not verified" and similar conditions
        // through its own status field, not HTTP status.
        if envelope.status != "1" {
            return Err(AbiError::NotVerified {
                address: address.to_string(),
                message: if envelope.result.is_empty() {
                    envelope.message
                } else {
                    envelope.result
                },
            });
        }

        AbiDocument::from_json(*address, &envelope.result)
    }
}

/// In-memory ABI source for tests. Counts fetches so cache behavior is
/// observable.
#[derive(Default)]
pub struct StaticAbiSource {
    documents: std::sync::Mutex<HashMap<Address, String>>,
    fetches: AtomicUsize,
}

impl StaticAbiSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, address: Address, abi_json: &str) {
        self.documents
            .lock()
            .expect("abi fixture lock")
            .insert(address, abi_json.to_string());
    }

    /// Number of fetches performed against this source.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AbiSource for StaticAbiSource {
    async fn fetch(&self, address: &Address) -> Result<AbiDocument, AbiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let json = self
            .documents
            .lock()
            .expect("abi fixture lock")
            .get(address)
            .cloned()
            .ok_or_else(|| AbiError::NotVerified {
                address: address.to_string(),
                message: "no ABI registered".to_string(),
            })?;
        AbiDocument::from_json(*address, &json)
    }
}

type CacheSlot = Arc<Mutex<Option<Arc<AbiDocument>>>>;

/// Memoizing resolver in front of an [`AbiSource`].
///
/// The cache is write-once per address. Resolution of one address is
/// serialized on a per-address lock, so concurrent callers never issue
/// duplicate outbound lookups and never observe a partial entry. Failed
/// fetches are not cached; a later call retries.
pub struct AbiResolver {
    source: Arc<dyn AbiSource>,
    cache: Mutex<HashMap<Address, CacheSlot>>,
}

impl AbiResolver {
    pub fn new(source: Arc<dyn AbiSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, address: &Address) -> Result<Arc<AbiDocument>, AbiError> {
        let slot = {
            let mut cache = self.cache.lock().await;
            cache.entry(*address).or_default().clone()
        };

        let mut entry = slot.lock().await;
        if let Some(doc) = entry.as_ref() {
            debug!(address = %address, "abi cache hit");
            return Ok(doc.clone());
        }

        debug!(address = %address, "abi cache miss, fetching");
        let doc = Arc::new(self.source.fetch(address).await?);
        *entry = Some(doc.clone());
        Ok(doc)
    }
}
