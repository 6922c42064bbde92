// Messages between the event loop and the front-end, plus the completion
// events spawned backend calls report back to the loop.

use tokio::sync::mpsc;

use crate::backend::{
    AggregateStats, BattleVoteReceipt, Comment, CommentId, Entity, EntityId, LikeReceipt,
    ProfileSide, ProfileVoteReceipt, RpcError, SessionReceipt,
};
use crate::coordinator::ActionId;
use crate::error::ConnectionError;
use crate::wallet::ProviderId;

// ---------------------------------------------------------------------------
// Front-end -> loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Commands issued by the user through the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Connect(ProviderId),
    Disconnect,
    /// Vote for one side of the current battle.
    VoteBattle(Side),
    VoteProfile { entity_id: EntityId, side: ProfileSide },
    LikeComment { comment_id: CommentId },
    PostComment { target_id: EntityId, text: String },
    ShowComments { target_id: EntityId },
    NextBattle,
    RefreshLeaderboard,
    Quit,
}

// ---------------------------------------------------------------------------
// Loop -> front-end
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// What the connect control should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionView {
    Connected {
        provider: ProviderId,
        short_address: String,
    },
    Disconnected,
}

/// Displayed tally for the current battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleTally {
    pub left: EntityId,
    pub right: EntityId,
    pub left_votes: u64,
    pub right_votes: u64,
    pub left_percent: u8,
    pub right_percent: u8,
}

/// Displayed chad/jeet split for a single profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTally {
    pub entity_id: EntityId,
    pub chad_votes: u64,
    pub jeet_votes: u64,
    pub chad_percent: u8,
    pub jeet_percent: u8,
}

/// Displayed global aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsView {
    pub total_chad: u64,
    pub total_jeet: u64,
    pub total: u64,
    pub jeet_percent: u8,
}

/// Updates pushed to the renderer. Each variant corresponds to one of the
/// display functions the front-end implements.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    BattlePair {
        round: u32,
        left: Entity,
        right: Entity,
    },
    BattleTally(BattleTally),
    ProfileTally(ProfileTally),
    GlobalStats(StatsView),
    Connection(ConnectionView),
    /// Draw attention to the connect control after a gated action.
    HighlightConnect,
    Notification {
        message: String,
        severity: Severity,
    },
    Streak(u32),
    /// Lifetime count of the user's committed battle votes.
    UserVotes(u64),
    Leaderboard(Vec<Entity>),
    Comments {
        target_id: EntityId,
        comments: Vec<Comment>,
    },
    CommentPosted(Comment),
    LikeState {
        comment_id: CommentId,
        liked: bool,
        likes: u64,
    },
}

/// Non-blocking handle onto the renderer channel.
///
/// Sends never wait and never fail loudly: if the front-end has been torn
/// down the update is dropped.
#[derive(Debug, Clone)]
pub struct UiSink {
    tx: mpsc::UnboundedSender<UiUpdate>,
}

impl UiSink {
    pub fn new(tx: mpsc::UnboundedSender<UiUpdate>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, update: UiUpdate) {
        let _ = self.tx.send(update);
    }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        self.send(UiUpdate::Notification {
            message: message.into(),
            severity,
        });
    }
}

// ---------------------------------------------------------------------------
// Spawned task -> loop
// ---------------------------------------------------------------------------

/// Result of an action's backend call.
#[derive(Debug, Clone)]
pub enum RpcReply {
    BattleVote(Result<BattleVoteReceipt, RpcError>),
    ProfileVote(Result<ProfileVoteReceipt, RpcError>),
    Like(Result<LikeReceipt, RpcError>),
    Comment(Result<Comment, RpcError>),
}

/// Background work finishing. Delivered to the event loop, which applies
/// it to the state it owns.
#[derive(Debug, Clone)]
pub enum Completion {
    Action { id: ActionId, reply: RpcReply },
    BattlePool(Result<Vec<Entity>, RpcError>),
    Leaderboard(Result<Vec<Entity>, RpcError>),
    Comments {
        target_id: EntityId,
        result: Result<Vec<Comment>, RpcError>,
    },
    Stats(Result<AggregateStats, RpcError>),
    /// The post-vote pause elapsed; load the next battle.
    NextRoundDue,
    /// A wallet connect prompt was answered or gave up.
    WalletAnswered {
        provider: ProviderId,
        result: Result<String, ConnectionError>,
    },
    /// Backend registration of a connected address finished.
    SessionAuthenticated {
        address: String,
        result: Result<SessionReceipt, RpcError>,
    },
}

pub type CompletionSender = mpsc::UnboundedSender<Completion>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<Completion>;
