// Wallet connection state, its persistence across restarts, and backend
// session authentication.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{RpcError, SessionReceipt};
use crate::db::KeyValueStore;
use crate::error::ConnectionError;
use crate::format::short_address;
use crate::protocol::ConnectionView;
use crate::wallet::{ProviderId, WalletError, WalletProvider, WalletRegistry};

pub const KEY_PROVIDER: &str = "connection.providerId";
pub const KEY_ADDRESS: &str = "connection.address";
pub const KEY_USER_ID: &str = "session.userId";

/// Current connection. An address exists exactly when connected, which the
/// private representation enforces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    active: Option<ActiveConnection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveConnection {
    provider: ProviderId,
    address: String,
}

impl ConnectionState {
    pub fn disconnected() -> Self {
        Self { active: None }
    }

    pub fn connected(provider: ProviderId, address: String) -> Self {
        Self {
            active: Some(ActiveConnection { provider, address }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    pub fn provider(&self) -> Option<ProviderId> {
        self.active.as_ref().map(|a| a.provider)
    }

    pub fn address(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.address.as_str())
    }

    pub fn view(&self) -> ConnectionView {
        match &self.active {
            Some(active) => ConnectionView::Connected {
                provider: active.provider,
                short_address: short_address(&active.address),
            },
            None => ConnectionView::Disconnected,
        }
    }
}

/// An opened wallet prompt waiting for the user's answer.
pub struct ConnectRequest {
    provider: ProviderId,
    wallet: Arc<dyn WalletProvider>,
    timeout: Duration,
}

impl ConnectRequest {
    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Wait for the provider's answer, giving up after the connect timeout.
    pub async fn run(self) -> Result<String, ConnectionError> {
        let provider = self.provider;
        match tokio::time::timeout(self.timeout, self.wallet.connect()).await {
            Ok(Ok(address)) if !address.trim().is_empty() => Ok(address),
            Ok(Ok(_)) => Err(ConnectionError::Unknown {
                provider,
                message: "provider returned an empty address".into(),
            }),
            Ok(Err(e)) => Err(classify(provider, e)),
            Err(_) => Err(ConnectionError::Unknown {
                provider,
                message: format!("no answer within {:?}", self.timeout),
            }),
        }
    }
}

/// Single long-lived owner of the wallet connection.
pub struct ConnectionSession {
    wallets: WalletRegistry,
    store: Arc<dyn KeyValueStore>,
    liveness_timeout: Duration,
    connect_timeout: Duration,
    state: ConnectionState,
    connecting: Option<ProviderId>,
    user_id: Option<String>,
}

impl ConnectionSession {
    pub fn new(
        wallets: WalletRegistry,
        store: Arc<dyn KeyValueStore>,
        liveness_timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            wallets,
            store,
            liveness_timeout,
            connect_timeout,
            state: ConnectionState::disconnected(),
            connecting: None,
            user_id: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn short_address(&self) -> Option<String> {
        self.state.address().map(short_address)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn wallets(&self) -> &WalletRegistry {
        &self.wallets
    }

    /// Rebuild the connection persisted by a previous run.
    ///
    /// The saved provider must still report itself connected within the
    /// liveness timeout. Any failure along the way (unreadable record,
    /// unknown or missing provider, provider error, timeout) yields a
    /// disconnected state and clears the record.
    pub async fn restore(&mut self) -> ConnectionState {
        let saved = match self.load_saved() {
            Ok(saved) => saved,
            Err(e) => {
                warn!("failed to read saved connection: {e:#}");
                None
            }
        };

        let Some((provider_name, address)) = saved else {
            return self.state.clone();
        };

        if self.check_liveness(&provider_name).await {
            if let Ok(provider) = provider_name.parse::<ProviderId>() {
                self.state = ConnectionState::connected(provider, address);
                self.user_id = self.store.get_string(KEY_USER_ID).unwrap_or_else(|e| {
                    warn!("failed to read saved session id: {e:#}");
                    None
                });
                info!(%provider, "restored wallet connection");
                return self.state.clone();
            }
        }

        info!(provider = %provider_name, "saved wallet connection is stale; clearing");
        self.clear_saved();
        self.state = ConnectionState::disconnected();
        self.state.clone()
    }

    fn load_saved(&self) -> anyhow::Result<Option<(String, String)>> {
        let provider = self.store.get_string(KEY_PROVIDER)?;
        let address = self.store.get_string(KEY_ADDRESS)?;
        Ok(match (provider, address) {
            (Some(p), Some(a)) if !a.is_empty() => Some((p, a)),
            (None, None) => None,
            _ => {
                // Half-written record.
                self.clear_saved();
                None
            }
        })
    }

    async fn check_liveness(&self, provider_name: &str) -> bool {
        let Some(wallet) = provider_name
            .parse::<ProviderId>()
            .ok()
            .and_then(|id| self.wallets.get(id))
        else {
            return false;
        };

        match tokio::time::timeout(self.liveness_timeout, wallet.is_connected()).await {
            Ok(Ok(alive)) => alive,
            Ok(Err(e)) => {
                warn!(provider = provider_name, "liveness check failed: {e}");
                false
            }
            Err(_) => {
                warn!(provider = provider_name, "liveness check timed out");
                false
            }
        }
    }

    /// Provider whose connect prompt is currently open.
    pub fn connecting(&self) -> Option<ProviderId> {
        self.connecting
    }

    /// Open a connect prompt with `provider`. The returned request is run
    /// off the event loop and its answer handed to `finish_connect`. Only
    /// one prompt may be open at a time.
    pub fn begin_connect(&mut self, provider: ProviderId) -> Result<ConnectRequest, ConnectionError> {
        if let Some(open) = self.connecting {
            return Err(ConnectionError::InProgress(open));
        }
        let wallet = self
            .wallets
            .get(provider)
            .ok_or(ConnectionError::ProviderUnavailable(provider))?;

        self.connecting = Some(provider);
        debug!(%provider, "connect prompt opened");
        Ok(ConnectRequest {
            provider,
            wallet,
            timeout: self.connect_timeout,
        })
    }

    /// Settle the open prompt. On success the connection is persisted and
    /// becomes current; the caller then registers the address with the
    /// backend and reports back through `on_authenticated`.
    pub fn finish_connect(
        &mut self,
        provider: ProviderId,
        result: Result<String, ConnectionError>,
    ) -> Result<ConnectionState, ConnectionError> {
        if self.connecting == Some(provider) {
            self.connecting = None;
        }
        let address = result?;

        if let Err(e) = self
            .store
            .set_string(KEY_PROVIDER, provider.as_str())
            .and_then(|_| self.store.set_string(KEY_ADDRESS, &address))
        {
            warn!("failed to persist wallet connection: {e:#}");
        }
        self.state = ConnectionState::connected(provider, address.clone());
        self.user_id = None;
        info!(%provider, address = %short_address(&address), "wallet connected");
        Ok(self.state.clone())
    }

    /// Backend registration for `address` finished. A failure is logged and
    /// leaves the local connection in place; a reply for an address that is
    /// no longer connected is ignored.
    pub fn on_authenticated(&mut self, address: &str, result: Result<SessionReceipt, RpcError>) {
        if self.state.address() != Some(address) {
            debug!("session reply for a stale connection ignored");
            return;
        }
        match result {
            Ok(receipt) => {
                if let Err(e) = self.store.set_string(KEY_USER_ID, &receipt.user_id) {
                    warn!("failed to persist session id: {e:#}");
                }
                self.user_id = Some(receipt.user_id);
            }
            Err(e) => warn!("backend authentication failed: {e}"),
        }
    }

    /// Always ends disconnected, whatever the provider does.
    pub async fn disconnect(&mut self) -> ConnectionState {
        if let Some(provider) = self.state.provider() {
            if let Some(wallet) = self.wallets.get(provider) {
                match tokio::time::timeout(self.liveness_timeout, wallet.disconnect()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(%provider, "provider disconnect failed: {e}"),
                    Err(_) => warn!(%provider, "provider disconnect timed out"),
                }
            }
        }

        self.clear_saved();
        self.state = ConnectionState::disconnected();
        self.user_id = None;
        info!("wallet disconnected");
        self.state.clone()
    }

    fn clear_saved(&self) {
        for key in [KEY_PROVIDER, KEY_ADDRESS, KEY_USER_ID] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, "failed to clear saved connection: {e:#}");
            }
        }
    }
}

fn classify(provider: ProviderId, err: WalletError) -> ConnectionError {
    if err.is_user_rejection() {
        ConnectionError::UserRejected(provider)
    } else {
        ConnectionError::Unknown {
            provider,
            message: err.to_string(),
        }
    }
}
