// In-process fakes for the backend and wallet collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{
    AggregateStats, BackendRpc, BattleVoteReceipt, Comment, Entity, EntityFilter, LikeReceipt,
    ProfileSide, ProfileVoteReceipt, RpcError, SessionReceipt,
};
use crate::wallet::{WalletError, WalletProvider};

pub fn entity(id: &str, votes: u64) -> Entity {
    Entity {
        id: id.into(),
        username: id.to_lowercase(),
        handle: format!("@{}", id.to_lowercase()),
        votes,
        chad_votes: 0,
        jeet_votes: 0,
    }
}

pub fn comment(id: &str, target_id: &str, likes: u64, liked_by: &[&str]) -> Comment {
    Comment {
        id: id.into(),
        target_id: target_id.into(),
        text: format!("comment {id}"),
        likes,
        liked_by: liked_by.iter().map(|s| s.to_string()).collect(),
        author: None,
    }
}

// ---------------------------------------------------------------------------
// FakeBackend
// ---------------------------------------------------------------------------

/// Canned backend. Methods named in `failing` return a network error.
pub struct FakeBackend {
    pool: Mutex<Vec<Entity>>,
    leaderboard: Vec<Entity>,
    stats: Mutex<AggregateStats>,
    battle_receipt: BattleVoteReceipt,
    profile_receipt: ProfileVoteReceipt,
    like_receipt: LikeReceipt,
    comments: Vec<Comment>,
    failing: Mutex<HashSet<&'static str>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            pool: Mutex::new(vec![entity("A", 40), entity("B", 60)]),
            leaderboard: vec![entity("B", 60), entity("A", 40)],
            stats: Mutex::new(AggregateStats {
                total_votes_a: 10,
                total_votes_b: 30,
                total: 40,
            }),
            battle_receipt: BattleVoteReceipt::default(),
            profile_receipt: ProfileVoteReceipt::default(),
            like_receipt: LikeReceipt {
                liked: true,
                likes: 1,
            },
            comments: Vec::new(),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(self, pool: Vec<Entity>) -> Self {
        *self.pool.lock().unwrap() = pool;
        self
    }

    pub fn with_stats(self, stats: AggregateStats) -> Self {
        *self.stats.lock().unwrap() = stats;
        self
    }

    pub fn with_battle_receipt(mut self, receipt: BattleVoteReceipt) -> Self {
        self.battle_receipt = receipt;
        self
    }

    pub fn with_profile_receipt(mut self, receipt: ProfileVoteReceipt) -> Self {
        self.profile_receipt = receipt;
        self
    }

    pub fn with_like_receipt(mut self, receipt: LikeReceipt) -> Self {
        self.like_receipt = receipt;
        self
    }

    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = comments;
        self
    }

    pub fn failing(self, method: &'static str) -> Self {
        self.set_failing(method, true);
        self
    }

    pub fn set_failing(&self, method: &'static str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(method);
        } else {
            set.remove(method);
        }
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    fn enter(&self, method: &'static str) -> Result<(), RpcError> {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
        if self.failing.lock().unwrap().contains(method) {
            return Err(RpcError::Network("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendRpc for FakeBackend {
    async fn fetch_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>, RpcError> {
        self.enter("fetch_entities")?;
        Ok(match filter {
            EntityFilter::Random { .. } => self.pool.lock().unwrap().clone(),
            EntityFilter::Leaderboard { .. } => self.leaderboard.clone(),
        })
    }

    async fn submit_vote(&self, _: &str, _: &str) -> Result<BattleVoteReceipt, RpcError> {
        self.enter("submit_vote")?;
        Ok(self.battle_receipt)
    }

    async fn submit_profile_vote(
        &self,
        _: &str,
        _: ProfileSide,
    ) -> Result<ProfileVoteReceipt, RpcError> {
        self.enter("submit_profile_vote")?;
        Ok(self.profile_receipt)
    }

    async fn toggle_like(&self, _: &str) -> Result<LikeReceipt, RpcError> {
        self.enter("toggle_like")?;
        Ok(self.like_receipt)
    }

    async fn fetch_comments(&self, _: &str) -> Result<Vec<Comment>, RpcError> {
        self.enter("fetch_comments")?;
        Ok(self.comments.clone())
    }

    async fn post_comment(&self, target_id: &str, text: &str) -> Result<Comment, RpcError> {
        self.enter("post_comment")?;
        Ok(Comment {
            id: "c-new".into(),
            target_id: target_id.into(),
            text: text.into(),
            likes: 0,
            liked_by: Vec::new(),
            author: None,
        })
    }

    async fn fetch_aggregate_stats(&self) -> Result<AggregateStats, RpcError> {
        self.enter("fetch_aggregate_stats")?;
        Ok(*self.stats.lock().unwrap())
    }

    async fn authenticate_session(&self, address: &str) -> Result<SessionReceipt, RpcError> {
        self.enter("authenticate_session")?;
        let head: String = address.chars().take(4).collect();
        Ok(SessionReceipt {
            user_id: format!("user-for-{head}"),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeWallet
// ---------------------------------------------------------------------------

enum Liveness {
    Flag(bool),
    Error,
    Hang,
}

pub struct FakeWallet {
    address: String,
    connect_error: Option<WalletError>,
    liveness: Liveness,
    disconnect_fails: bool,
    connect_hangs: bool,
    connected: AtomicBool,
}

impl FakeWallet {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.into(),
            connect_error: None,
            liveness: Liveness::Flag(true),
            disconnect_fails: false,
            connect_hangs: false,
            connected: AtomicBool::new(false),
        }
    }

    pub fn alive(mut self, alive: bool) -> Self {
        self.liveness = Liveness::Flag(alive);
        self
    }

    pub fn liveness_error(mut self) -> Self {
        self.liveness = Liveness::Error;
        self
    }

    pub fn liveness_hangs(mut self) -> Self {
        self.liveness = Liveness::Hang;
        self
    }

    pub fn connect_error(mut self, err: WalletError) -> Self {
        self.connect_error = Some(err);
        self
    }

    /// The connect prompt is never answered.
    pub fn connect_hangs(mut self) -> Self {
        self.connect_hangs = true;
        self
    }

    pub fn disconnect_fails(mut self) -> Self {
        self.disconnect_fails = true;
        self
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn connect(&self) -> Result<String, WalletError> {
        if self.connect_hangs {
            std::future::pending::<()>().await;
        }
        if let Some(err) = &self.connect_error {
            return Err(err.clone());
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.address.clone())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.connected.store(false, Ordering::SeqCst);
        if self.disconnect_fails {
            return Err(WalletError::Other("extension crashed".into()));
        }
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool, WalletError> {
        match self.liveness {
            Liveness::Flag(alive) => Ok(alive),
            Liveness::Error => Err(WalletError::Other("provider not injected".into())),
            Liveness::Hang => std::future::pending().await,
        }
    }
}
