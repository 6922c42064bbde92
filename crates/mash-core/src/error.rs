// Error taxonomy for user-triggered actions and wallet connection.
//
// Every variant is recoverable. The event loop converts them into
// notifications via `notification()`; none propagate as failures.

use thiserror::Error;

use crate::auth::ActionKind;
use crate::backend::RpcError;
use crate::battle::InsufficientPoolError;
use crate::counters::ConflictError;
use crate::protocol::Severity;
use crate::wallet::ProviderId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("user rejected the {0} connection request")]
    UserRejected(ProviderId),

    #[error("{0} wallet is not available")]
    ProviderUnavailable(ProviderId),

    #[error("a {0} connect prompt is already open")]
    InProgress(ProviderId),

    #[error("failed to connect to {provider}: {message}")]
    Unknown {
        provider: ProviderId,
        message: String,
    },
}

impl ConnectionError {
    pub fn user_message(&self) -> (String, Severity) {
        match self {
            ConnectionError::UserRejected(_) => {
                ("Connection cancelled".to_string(), Severity::Warning)
            }
            ConnectionError::ProviderUnavailable(provider) => {
                (format!("{provider} wallet not found"), Severity::Error)
            }
            ConnectionError::InProgress(_) => (
                "Finish connecting your wallet first".to_string(),
                Severity::Info,
            ),
            ConnectionError::Unknown { provider, .. } => (
                format!("Failed to connect to {provider}. Please try again."),
                Severity::Error,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Gated action attempted without a connected wallet. The prompt has
    /// already been emitted by the authorizer.
    #[error("{0:?} requires a connected wallet")]
    AuthorizationDenied(ActionKind),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("network error: {0}")]
    Network(String),

    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    InsufficientPool(#[from] InsufficientPoolError),

    #[error("no battle is currently loaded")]
    NoActiveBattle,

    #[error("this battle has already been voted on")]
    AlreadyVoted,

    #[error("comment text is empty")]
    EmptyComment,
}

impl From<RpcError> for ActionError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Network(message) => ActionError::Network(message),
            other => ActionError::Server(other.to_string()),
        }
    }
}

impl ActionError {
    /// The notification to show for this error, if any. Conflicts and
    /// repeated votes are silent: the trigger should simply be ignored.
    pub fn notification(&self) -> Option<(String, Severity)> {
        match self {
            ActionError::AuthorizationDenied(_) => None,
            ActionError::Conflict(_) | ActionError::AlreadyVoted => None,
            ActionError::Connection(err) => Some(err.user_message()),
            ActionError::Network(_) | ActionError::Server(_) => Some((
                "Something went wrong. Please try again.".to_string(),
                Severity::Error,
            )),
            ActionError::InsufficientPool(_) => Some((
                "Not enough profiles for a battle right now".to_string(),
                Severity::Info,
            )),
            ActionError::NoActiveBattle => {
                Some(("No battle loaded yet".to_string(), Severity::Info))
            }
            ActionError::EmptyComment => {
                Some(("Comment cannot be empty".to_string(), Severity::Warning))
            }
        }
    }
}
