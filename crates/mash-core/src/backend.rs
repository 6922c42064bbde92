// Backend RPC surface: the entity/stats/vote/comment operations the client
// consumes, independent of transport.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type EntityId = String;
pub type CommentId = String;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A voteable profile as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub username: String,
    #[serde(default)]
    pub handle: String,
    /// Head-to-head battle wins.
    #[serde(default)]
    pub votes: u64,
    #[serde(default)]
    pub chad_votes: u64,
    #[serde(default)]
    pub jeet_votes: u64,
}

/// Global aggregate counters shown in the stats banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    #[serde(rename = "totalChadVotes")]
    pub total_votes_a: u64,
    #[serde(rename = "totalJeetVotes")]
    pub total_votes_b: u64,
    #[serde(rename = "totalVotes")]
    pub total: u64,
}

/// Which side of a profile's chad/jeet split a vote goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSide {
    Chad,
    Jeet,
}

impl ProfileSide {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileSide::Chad => "chad",
            ProfileSide::Jeet => "jeet",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ProfileSide::Chad => ProfileSide::Jeet,
            ProfileSide::Jeet => ProfileSide::Chad,
        }
    }
}

impl fmt::Display for ProfileSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardPeriod {
    All,
    Day,
    Week,
    Month,
}

impl LeaderboardPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            LeaderboardPeriod::All => "all",
            LeaderboardPeriod::Day => "day",
            LeaderboardPeriod::Week => "week",
            LeaderboardPeriod::Month => "month",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(LeaderboardPeriod::All),
            "day" => Some(LeaderboardPeriod::Day),
            "week" => Some(LeaderboardPeriod::Week),
            "month" => Some(LeaderboardPeriod::Month),
            _ => None,
        }
    }
}

/// Selection criteria for `fetch_entities`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityFilter {
    /// A random sample, used to seed the next battle.
    Random { limit: usize },
    /// Top entities for a leaderboard period.
    Leaderboard {
        period: LeaderboardPeriod,
        limit: usize,
    },
}

/// Server reply to a battle vote. Either side may be omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleVoteReceipt {
    #[serde(default)]
    pub winner_votes: Option<u64>,
    #[serde(default)]
    pub loser_votes: Option<u64>,
}

/// Server reply to a chad/jeet profile vote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileVoteReceipt {
    #[serde(default, rename = "chadVotes")]
    pub counter_a: Option<u64>,
    #[serde(default, rename = "jeetVotes")]
    pub counter_b: Option<u64>,
}

impl ProfileVoteReceipt {
    pub fn for_side(&self, side: ProfileSide) -> Option<u64> {
        match side {
            ProfileSide::Chad => self.counter_a,
            ProfileSide::Jeet => self.counter_b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeReceipt {
    pub liked: bool,
    pub likes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReceipt {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: CommentId,
    #[serde(default)]
    pub target_id: EntityId,
    pub text: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub liked_by: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned status {status}")]
    Status { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// BackendRpc
// ---------------------------------------------------------------------------

/// The opaque backend the client talks to. Implementations decide the
/// transport; `mash-http` provides the HTTP one.
#[async_trait]
pub trait BackendRpc: Send + Sync {
    async fn fetch_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>, RpcError>;

    async fn submit_vote(
        &self,
        winner_id: &str,
        loser_id: &str,
    ) -> Result<BattleVoteReceipt, RpcError>;

    async fn submit_profile_vote(
        &self,
        entity_id: &str,
        side: ProfileSide,
    ) -> Result<ProfileVoteReceipt, RpcError>;

    async fn toggle_like(&self, target_id: &str) -> Result<LikeReceipt, RpcError>;

    async fn fetch_comments(&self, target_id: &str) -> Result<Vec<Comment>, RpcError>;

    async fn post_comment(&self, target_id: &str, text: &str) -> Result<Comment, RpcError>;

    async fn fetch_aggregate_stats(&self) -> Result<AggregateStats, RpcError>;

    async fn authenticate_session(&self, address: &str) -> Result<SessionReceipt, RpcError>;
}
