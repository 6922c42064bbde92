// Application state and the central event loop.
//
// The loop owns every piece of mutable client state. It multiplexes user
// commands from the front-end, completions from spawned backend calls, and
// the aggregate-stats timer, and pushes UI updates through the sink.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backend::BackendRpc;
use crate::battle::BattlePairSelector;
use crate::config::Config;
use crate::coordinator::{ActionCoordinator, CoordinatorSettings};
use crate::db::KeyValueStore;
use crate::error::{ActionError, ConnectionError};
use crate::poller::ReconciliationPoller;
use crate::protocol::{
    Completion, CompletionReceiver, CompletionSender, Severity, UiSink, UiUpdate, UserCommand,
};
use crate::session::ConnectionSession;
use crate::wallet::{ProviderId, WalletRegistry};

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub session: ConnectionSession,
    pub coordinator: ActionCoordinator,
    pub poller: ReconciliationPoller,
    backend: Arc<dyn BackendRpc>,
    ui: UiSink,
    completions: CompletionSender,
}

impl AppState {
    pub fn new(
        config: &Config,
        backend: Arc<dyn BackendRpc>,
        state_store: Arc<dyn KeyValueStore>,
        wallets: WalletRegistry,
        selector: BattlePairSelector,
        ui: UiSink,
        completions: CompletionSender,
    ) -> Self {
        let session = ConnectionSession::new(
            wallets,
            Arc::clone(&state_store),
            config.wallet.liveness_timeout(),
            config.wallet.connect_timeout(),
        );
        let coordinator = ActionCoordinator::new(
            Arc::clone(&backend),
            state_store,
            ui.clone(),
            completions.clone(),
            selector,
            CoordinatorSettings::from_config(config),
        );

        AppState {
            session,
            coordinator,
            poller: ReconciliationPoller::new(config.polling.stats_interval()),
            backend,
            ui,
            completions,
        }
    }

    /// Startup sequence: restore the saved wallet, then kick off the first
    /// battle, stats fetch and leaderboard.
    pub async fn start(&mut self) {
        let restored = self.session.restore().await;
        self.ui.send(UiUpdate::Connection(restored.view()));
        self.ui
            .send(UiUpdate::UserVotes(self.coordinator.user_votes()));

        self.coordinator.load_next_battle();
        self.poller.tick(&self.backend, &self.completions);
        self.coordinator.refresh_leaderboard();
    }

    /// Open the provider's prompt. The answer arrives later as
    /// `Completion::WalletAnswered`; the loop keeps running meanwhile.
    fn connect(&mut self, provider: ProviderId) -> Result<(), ActionError> {
        let request = self.session.begin_connect(provider)?;
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = request.run().await;
            let _ = completions.send(Completion::WalletAnswered { provider, result });
        });
        Ok(())
    }

    fn on_wallet_answer(&mut self, provider: ProviderId, result: Result<String, ConnectionError>) {
        match self.session.finish_connect(provider, result) {
            Ok(state) => {
                self.ui.send(UiUpdate::Connection(state.view()));
                self.ui.notify(
                    format!("{} connected successfully!", provider.display_name()),
                    Severity::Success,
                );
                if let Some(address) = state.address() {
                    self.authenticate(address.to_string());
                }
            }
            Err(e) => {
                warn!(%provider, "wallet connection failed: {e}");
                let _ = self.coordinator.report(ActionError::from(e));
            }
        }
    }

    fn authenticate(&self, address: String) {
        let backend = Arc::clone(&self.backend);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = backend.authenticate_session(&address).await;
            let _ = completions.send(Completion::SessionAuthenticated { address, result });
        });
    }

    async fn disconnect(&mut self) {
        let state = self.session.disconnect().await;
        self.ui.send(UiUpdate::Connection(state.view()));
        self.ui.notify("Wallet disconnected", Severity::Info);
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop until `Quit` or the command channel
/// closes.
///
/// Listens on:
/// 1. User commands from the front-end
/// 2. Completions from spawned backend calls and timers
/// 3. The aggregate-stats interval
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut completion_rx: CompletionReceiver,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");
    state.start().await;

    let mut stats_interval = tokio::time::interval(state.poller.interval());
    stats_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; startup already fetched.
    stats_interval.tick().await;

    loop {
        tokio::select! {
            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => handle_user_command(&mut state, cmd).await,
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Backend completions ---
            Some(completion) = completion_rx.recv() => {
                handle_completion(&mut state, completion);
            }

            // --- Aggregate refresh ---
            _ = stats_interval.tick() => {
                state.poller.tick(&state.backend, &state.completions);
            }
        }
    }

    info!("Application event loop exiting");
    Ok(())
}

async fn handle_user_command(state: &mut AppState, cmd: UserCommand) {
    debug!(?cmd, "user command");
    let result = match cmd {
        UserCommand::Connect(provider) => state.connect(provider),
        UserCommand::Disconnect => {
            state.disconnect().await;
            Ok(())
        }
        UserCommand::VoteBattle(side) => state
            .coordinator
            .vote_battle(side, state.session.state())
            .map(drop),
        UserCommand::VoteProfile { entity_id, side } => state
            .coordinator
            .vote_profile(&entity_id, side, state.session.state())
            .map(drop),
        UserCommand::LikeComment { comment_id } => state
            .coordinator
            .like_comment(&comment_id, state.session.state())
            .map(drop),
        UserCommand::PostComment { target_id, text } => state
            .coordinator
            .post_comment(&target_id, &text, state.session.state())
            .map(drop),
        UserCommand::ShowComments { target_id } => {
            state.coordinator.show_comments(&target_id);
            Ok(())
        }
        UserCommand::NextBattle => {
            state.coordinator.load_next_battle();
            Ok(())
        }
        UserCommand::RefreshLeaderboard => {
            state.coordinator.refresh_leaderboard();
            Ok(())
        }
        // Handled by the loop.
        UserCommand::Quit => Ok(()),
    };

    if let Err(err) = result {
        debug!("command not carried out: {err}");
        let _ = state.coordinator.report(err);
    }
}

fn handle_completion(state: &mut AppState, completion: Completion) {
    match completion {
        Completion::Action { id, reply } => {
            state.coordinator.resolve(id, reply);
        }
        Completion::BattlePool(result) => {
            let _ = state.coordinator.handle_battle_pool(result);
        }
        Completion::Leaderboard(result) => state.coordinator.handle_leaderboard(result),
        Completion::Comments { target_id, result } => {
            state
                .coordinator
                .handle_comments(target_id, result, state.session.user_id());
        }
        Completion::Stats(result) => {
            if state
                .poller
                .on_result(result, state.coordinator.counters_mut())
                .is_some()
            {
                state.coordinator.emit_global_stats();
            }
        }
        Completion::NextRoundDue => state.coordinator.next_round_due(),
        Completion::WalletAnswered { provider, result } => state.on_wallet_answer(provider, result),
        Completion::SessionAuthenticated { address, result } => {
            state.session.on_authenticated(&address, result);
        }
    }
}
