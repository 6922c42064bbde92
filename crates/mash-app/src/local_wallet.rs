// Development wallet backed by addresses from config/mash.toml.
//
// Stands in for a browser wallet extension: `connect` hands back the
// configured address without a signing prompt.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use mash_core::wallet::{ProviderId, WalletError, WalletProvider, WalletRegistry};

pub struct LocalWallet {
    address: String,
    /// Set by `disconnect`; a later `connect` clears it.
    revoked: AtomicBool,
}

impl LocalWallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            revoked: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn connect(&self) -> Result<String, WalletError> {
        if self.address.trim().is_empty() {
            return Err(WalletError::Other("no address configured".into()));
        }
        self.revoked.store(false, Ordering::SeqCst);
        Ok(self.address.clone())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.revoked.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool, WalletError> {
        Ok(!self.revoked.load(Ordering::SeqCst))
    }
}

/// One `LocalWallet` per configured provider. Providers without an address
/// stay unregistered and report as not found.
pub fn registry_from_config(wallets: &HashMap<ProviderId, String>) -> WalletRegistry {
    let mut registry = WalletRegistry::new();
    for (provider, address) in wallets {
        registry.register(*provider, Arc::new(LocalWallet::new(address.clone())));
    }
    info!(available = ?registry.available(), "wallet providers registered");
    registry
}
