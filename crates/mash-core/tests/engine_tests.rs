// Integration tests for the action engine.
//
// These drive the event loop through its public API with an in-process
// backend and wallet, persisting to a real SQLite file so restarts can be
// exercised.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mash_core::app::{self, AppState};
use mash_core::backend::*;
use mash_core::battle::BattlePairSelector;
use mash_core::config::*;
use mash_core::db::{Database, KeyValueStore};
use mash_core::protocol::*;
use mash_core::session::KEY_PROVIDER;
use mash_core::wallet::{ProviderId, WalletError, WalletProvider, WalletRegistry};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

// ===========================================================================
// Test helpers
// ===========================================================================

const ADDR: &str = "7YttLkHDoNj9wyDur5pM1ejNaAvT9X4eqaYcHQqtj2G5";

fn profile(id: &str, votes: u64, chad: u64, jeet: u64) -> Entity {
    Entity {
        id: id.into(),
        username: format!("user_{}", id.to_lowercase()),
        handle: format!("@{}", id.to_lowercase()),
        votes,
        chad_votes: chad,
        jeet_votes: jeet,
    }
}

/// Backend that keeps real counters, so server replies reflect every vote
/// it has accepted.
struct ScriptedBackend {
    entities: Mutex<HashMap<String, Entity>>,
    stats: Mutex<AggregateStats>,
    reject_votes: AtomicBool,
    stats_fetches: AtomicU64,
}

impl ScriptedBackend {
    fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities: Mutex::new(entities.into_iter().map(|e| (e.id.clone(), e)).collect()),
            stats: Mutex::new(AggregateStats {
                total_votes_a: 100,
                total_votes_b: 300,
                total: 400,
            }),
            reject_votes: AtomicBool::new(false),
            stats_fetches: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl BackendRpc for ScriptedBackend {
    async fn fetch_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>, RpcError> {
        let mut all: Vec<Entity> = self.entities.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.id.cmp(&b.id)));
        let limit = match filter {
            EntityFilter::Random { limit } => *limit,
            EntityFilter::Leaderboard { limit, .. } => *limit,
        };
        all.truncate(limit);
        Ok(all)
    }

    async fn submit_vote(&self, winner: &str, loser: &str) -> Result<BattleVoteReceipt, RpcError> {
        if self.reject_votes.load(Ordering::SeqCst) {
            return Err(RpcError::Status { status: 500 });
        }
        let mut entities = self.entities.lock().unwrap();
        let winner_votes = entities.get_mut(winner).map(|e| {
            e.votes += 1;
            e.votes
        });
        let loser_votes = entities.get(loser).map(|e| e.votes);
        Ok(BattleVoteReceipt {
            winner_votes,
            loser_votes,
        })
    }

    async fn submit_profile_vote(
        &self,
        entity_id: &str,
        side: ProfileSide,
    ) -> Result<ProfileVoteReceipt, RpcError> {
        if self.reject_votes.load(Ordering::SeqCst) {
            return Err(RpcError::Network("connection reset".into()));
        }
        let mut entities = self.entities.lock().unwrap();
        let entity = entities
            .get_mut(entity_id)
            .ok_or(RpcError::Status { status: 404 })?;
        let mut stats = self.stats.lock().unwrap();
        match side {
            ProfileSide::Chad => {
                entity.chad_votes += 1;
                stats.total_votes_a += 1;
            }
            ProfileSide::Jeet => {
                entity.jeet_votes += 1;
                stats.total_votes_b += 1;
            }
        }
        stats.total += 1;
        Ok(ProfileVoteReceipt {
            counter_a: Some(entity.chad_votes),
            counter_b: Some(entity.jeet_votes),
        })
    }

    async fn toggle_like(&self, _: &str) -> Result<LikeReceipt, RpcError> {
        Ok(LikeReceipt {
            liked: true,
            likes: 1,
        })
    }

    async fn fetch_comments(&self, _: &str) -> Result<Vec<Comment>, RpcError> {
        Ok(Vec::new())
    }

    async fn post_comment(&self, target_id: &str, text: &str) -> Result<Comment, RpcError> {
        Ok(Comment {
            id: "c-1".into(),
            target_id: target_id.into(),
            text: text.into(),
            likes: 0,
            liked_by: Vec::new(),
            author: None,
        })
    }

    async fn fetch_aggregate_stats(&self) -> Result<AggregateStats, RpcError> {
        self.stats_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(*self.stats.lock().unwrap())
    }

    async fn authenticate_session(&self, _: &str) -> Result<SessionReceipt, RpcError> {
        Ok(SessionReceipt {
            user_id: "u-42".into(),
        })
    }
}

struct TestWallet {
    alive: AtomicBool,
}

#[async_trait]
impl WalletProvider for TestWallet {
    async fn connect(&self) -> Result<String, WalletError> {
        self.alive.store(true, Ordering::SeqCst);
        Ok(ADDR.to_string())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool, WalletError> {
        Ok(self.alive.load(Ordering::SeqCst))
    }
}

fn test_config() -> Config {
    Config {
        backend: BackendConfig {
            base_url: "http://test.invalid/api".into(),
            request_timeout_ms: 1000,
        },
        wallet: WalletConfig {
            liveness_timeout_ms: 500,
            connect_timeout_ms: 60_000,
        },
        polling: PollingConfig {
            stats_interval_secs: 30,
        },
        battle: BattleConfig {
            pool_size: 20,
            history_len: 2,
            max_redraws: 8,
            next_round_delay_ms: 600,
        },
        leaderboard: LeaderboardConfig {
            period: LeaderboardPeriod::Week,
            limit: 3,
        },
        db_path: String::new(),
        wallets: HashMap::new(),
    }
}

fn temp_db(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("mash_engine_{name}.db"));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
    path
}

struct Running {
    cmd_tx: mpsc::Sender<UserCommand>,
    ui_rx: mpsc::UnboundedReceiver<UiUpdate>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

fn start(
    backend: Arc<ScriptedBackend>,
    store: Arc<dyn KeyValueStore>,
    wallet: Arc<TestWallet>,
    seed: u64,
) -> Running {
    let config = test_config();
    let (ui, ui_rx) = UiSink::channel();
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);

    let mut wallets = WalletRegistry::new();
    wallets.register(ProviderId::Solflare, wallet);

    let state = AppState::new(
        &config,
        backend,
        store,
        wallets,
        BattlePairSelector::with_rng(
            StdRng::seed_from_u64(seed),
            config.battle.history_len,
            config.battle.max_redraws,
        ),
        ui,
        completion_tx,
    );
    let handle = tokio::spawn(app::run(cmd_rx, completion_rx, state));
    Running {
        cmd_tx,
        ui_rx,
        handle,
    }
}

async fn next_matching<F>(rx: &mut mpsc::UnboundedReceiver<UiUpdate>, mut pred: F) -> UiUpdate
where
    F: FnMut(&UiUpdate) -> bool,
{
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let update = rx.recv().await.expect("ui channel closed");
            if pred(&update) {
                return update;
            }
        }
    })
    .await
    .expect("timed out waiting for ui update")
}

fn notice(text: &'static str) -> impl FnMut(&UiUpdate) -> bool {
    move |u| matches!(u, UiUpdate::Notification { message, .. } if message == text)
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn vote_session_survives_restart() {
    let path = temp_db("restart");
    let backend = Arc::new(ScriptedBackend::new(vec![
        profile("A", 40, 0, 0),
        profile("B", 60, 0, 0),
        profile("C", 10, 0, 0),
    ]));
    let wallet = Arc::new(TestWallet {
        alive: AtomicBool::new(false),
    });

    {
        let store: Arc<dyn KeyValueStore> =
            Arc::new(Database::open(path.to_str().unwrap()).unwrap());
        let mut app = start(backend.clone(), store, wallet.clone(), 1);

        next_matching(&mut app.ui_rx, |u| matches!(u, UiUpdate::BattleTally(_))).await;
        app.cmd_tx
            .send(UserCommand::Connect(ProviderId::Solflare))
            .await
            .unwrap();
        next_matching(&mut app.ui_rx, notice("Solflare connected successfully!")).await;

        app.cmd_tx
            .send(UserCommand::VoteBattle(Side::Right))
            .await
            .unwrap();
        next_matching(&mut app.ui_rx, |u| *u == UiUpdate::UserVotes(1)).await;
        next_matching(&mut app.ui_rx, notice("Vote recorded!")).await;

        app.cmd_tx.send(UserCommand::Quit).await.unwrap();
        app.handle.await.unwrap().unwrap();
    }

    let store = Arc::new(Database::open(path.to_str().unwrap()).unwrap());
    assert_eq!(
        store.get_string(KEY_PROVIDER).unwrap().as_deref(),
        Some("solflare")
    );

    let mut app = start(backend, store, wallet, 2);
    match app.ui_rx.recv().await.unwrap() {
        UiUpdate::Connection(ConnectionView::Connected {
            provider,
            short_address,
        }) => {
            assert_eq!(provider, ProviderId::Solflare);
            assert_eq!(short_address, "7Ytt...j2G5");
        }
        other => panic!("expected restored connection, got {other:?}"),
    }
    assert_eq!(app.ui_rx.recv().await.unwrap(), UiUpdate::UserVotes(1));

    // Already connected: a vote goes straight through.
    next_matching(&mut app.ui_rx, |u| matches!(u, UiUpdate::BattleTally(_))).await;
    app.cmd_tx
        .send(UserCommand::VoteBattle(Side::Left))
        .await
        .unwrap();
    next_matching(&mut app.ui_rx, |u| *u == UiUpdate::UserVotes(2)).await;

    drop(app.cmd_tx);
    app.handle.await.unwrap().unwrap();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test(start_paused = true)]
async fn dead_wallet_is_not_restored() {
    let path = temp_db("dead_wallet");
    let store = Arc::new(Database::open(path.to_str().unwrap()).unwrap());
    store.set_string(KEY_PROVIDER, "solflare").unwrap();
    store
        .set_string(mash_core::session::KEY_ADDRESS, ADDR)
        .unwrap();

    let backend = Arc::new(ScriptedBackend::new(vec![
        profile("A", 1, 0, 0),
        profile("B", 2, 0, 0),
    ]));
    let wallet = Arc::new(TestWallet {
        alive: AtomicBool::new(false),
    });
    let mut app = start(backend, store.clone(), wallet, 3);

    assert_eq!(
        app.ui_rx.recv().await.unwrap(),
        UiUpdate::Connection(ConnectionView::Disconnected)
    );
    assert_eq!(store.get_string(KEY_PROVIDER).unwrap(), None);

    app.cmd_tx.send(UserCommand::Quit).await.unwrap();
    app.handle.await.unwrap().unwrap();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test(start_paused = true)]
async fn rejected_vote_restores_displayed_split() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        profile("A", 40, 0, 0),
        profile("B", 60, 0, 0),
    ]));
    backend.reject_votes.store(true, Ordering::SeqCst);
    let wallet = Arc::new(TestWallet {
        alive: AtomicBool::new(false),
    });
    let store: Arc<dyn KeyValueStore> = Arc::new(Database::open(":memory:").unwrap());
    let mut app = start(backend, store, wallet, 4);

    let before = match next_matching(&mut app.ui_rx, |u| matches!(u, UiUpdate::BattleTally(_))).await {
        UiUpdate::BattleTally(t) => t,
        _ => unreachable!(),
    };
    app.cmd_tx
        .send(UserCommand::Connect(ProviderId::Solflare))
        .await
        .unwrap();
    app.cmd_tx
        .send(UserCommand::VoteBattle(Side::Left))
        .await
        .unwrap();

    // Optimistic bump first.
    let bumped = match next_matching(&mut app.ui_rx, |u| matches!(u, UiUpdate::BattleTally(_))).await {
        UiUpdate::BattleTally(t) => t,
        _ => unreachable!(),
    };
    assert_eq!(bumped.left_votes, before.left_votes + 1);
    assert_eq!(bumped.left_percent + bumped.right_percent, 100);

    // Then the exact pre-action tally once the server refuses.
    let restored = match next_matching(&mut app.ui_rx, |u| matches!(u, UiUpdate::BattleTally(_))).await {
        UiUpdate::BattleTally(t) => t,
        _ => unreachable!(),
    };
    assert_eq!(restored, before);
    next_matching(&mut app.ui_rx, notice("Vote failed. Please try again.")).await;
}

#[tokio::test(start_paused = true)]
async fn profile_vote_and_poll_agree_on_aggregate() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        profile("A", 5, 3, 1),
        profile("B", 6, 0, 0),
    ]));
    let wallet = Arc::new(TestWallet {
        alive: AtomicBool::new(false),
    });
    let store: Arc<dyn KeyValueStore> = Arc::new(Database::open(":memory:").unwrap());
    let mut app = start(backend.clone(), store, wallet, 5);

    let (mut stats_seen, mut battle_seen) = (false, false);
    while !(stats_seen && battle_seen) {
        match next_matching(&mut app.ui_rx, |_| true).await {
            UiUpdate::GlobalStats(_) => stats_seen = true,
            UiUpdate::BattlePair { .. } => battle_seen = true,
            _ => {}
        }
    }
    app.cmd_tx
        .send(UserCommand::Connect(ProviderId::Solflare))
        .await
        .unwrap();
    app.cmd_tx
        .send(UserCommand::VoteProfile {
            entity_id: "A".into(),
            side: ProfileSide::Jeet,
        })
        .await
        .unwrap();

    let tally = next_matching(&mut app.ui_rx, |u| {
        matches!(u, UiUpdate::ProfileTally(t) if t.jeet_votes == 2)
    })
    .await;
    if let UiUpdate::ProfileTally(t) = tally {
        assert_eq!((t.chad_percent, t.jeet_percent), (60, 40));
    }
    next_matching(&mut app.ui_rx, notice("Voted JEET for user_a!")).await;

    // The next poll reports the same aggregate the optimistic update showed.
    tokio::time::sleep(Duration::from_secs(31)).await;
    let stats = next_matching(&mut app.ui_rx, |u| matches!(u, UiUpdate::GlobalStats(_))).await;
    assert_eq!(
        stats,
        UiUpdate::GlobalStats(StatsView {
            total_chad: 100,
            total_jeet: 301,
            total: 401,
            jeet_percent: 75,
        })
    );
    assert!(backend.stats_fetches.load(Ordering::SeqCst) >= 2);
}
