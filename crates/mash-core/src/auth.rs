// Wallet-connection gate for user actions.

use tracing::debug;

use crate::protocol::{Severity, UiSink, UiUpdate};
use crate::session::ConnectionState;

/// The gated action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Vote,
    Comment,
    Like,
}

impl ActionKind {
    /// Prompt shown when the action is attempted without a wallet.
    pub fn denial_prompt(self) -> &'static str {
        match self {
            ActionKind::Vote => "Connect wallet to vote!",
            ActionKind::Comment => "Connect wallet to comment!",
            ActionKind::Like => "Connect wallet to like!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    NotConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied(DenialReason),
}

impl Authorization {
    pub fn is_allowed(self) -> bool {
        matches!(self, Authorization::Allowed)
    }
}

/// Stateless: the connection state is passed in on every call so the
/// decision always reflects the current session.
#[derive(Debug, Clone)]
pub struct ActionAuthorizer {
    ui: UiSink,
}

impl ActionAuthorizer {
    pub fn new(ui: UiSink) -> Self {
        Self { ui }
    }

    /// Decide whether `kind` may proceed. A denial emits the prompt and
    /// the highlight-connect signal.
    pub fn authorize(&self, kind: ActionKind, state: &ConnectionState) -> Authorization {
        if state.is_connected() {
            return Authorization::Allowed;
        }

        debug!(?kind, "action denied: wallet not connected");
        self.ui.notify(kind.denial_prompt(), Severity::Warning);
        self.ui.send(UiUpdate::HighlightConnect);
        Authorization::Denied(DenialReason::NotConnected)
    }
}
