// Wallet provider capability and the registry of supported providers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Error code wallets return when the user dismisses the connect prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

/// The fixed set of wallet providers the client knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Phantom,
    Solflare,
    Backpack,
    Coinbase,
    Trust,
    Glow,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        ProviderId::Phantom,
        ProviderId::Solflare,
        ProviderId::Backpack,
        ProviderId::Coinbase,
        ProviderId::Trust,
        ProviderId::Glow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Phantom => "phantom",
            ProviderId::Solflare => "solflare",
            ProviderId::Backpack => "backpack",
            ProviderId::Coinbase => "coinbase",
            ProviderId::Trust => "trust",
            ProviderId::Glow => "glow",
        }
    }

    /// Capitalized name for notifications ("Phantom connected successfully!").
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderId::Phantom => "Phantom",
            ProviderId::Solflare => "Solflare",
            ProviderId::Backpack => "Backpack",
            ProviderId::Coinbase => "Coinbase",
            ProviderId::Trust => "Trust",
            ProviderId::Glow => "Glow",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown wallet provider `{0}`")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Raw failure reported by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet error {code}: {message}")]
    Code { code: i64, message: String },

    #[error("wallet error: {0}")]
    Other(String),
}

impl WalletError {
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, WalletError::Code { code, .. } if *code == USER_REJECTED_CODE)
    }
}

/// Connection capability exposed by a single wallet provider.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompt the user and return the connected public address.
    async fn connect(&self) -> Result<String, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;

    /// Liveness flag: whether the provider still considers itself connected.
    async fn is_connected(&self) -> Result<bool, WalletError>;
}

/// Providers that are actually available in this environment. A provider
/// missing from the registry is reported as unavailable.
#[derive(Default, Clone)]
pub struct WalletRegistry {
    providers: HashMap<ProviderId, Arc<dyn WalletProvider>>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ProviderId, provider: Arc<dyn WalletProvider>) {
        self.providers.insert(id, provider);
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn WalletProvider>> {
        self.providers.get(&id).cloned()
    }

    /// Registered providers in the fixed display order.
    pub fn available(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|id| self.providers.contains_key(id))
            .collect()
    }
}
