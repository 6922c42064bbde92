// Per-action orchestration: authorize, apply optimistically, call the
// backend, then commit or roll back. Also owns the battle round and the
// caches the actions read from.
//
// Backend calls run as spawned tasks and report back through the
// completion channel; the event loop hands each reply to `resolve`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::{ActionAuthorizer, ActionKind, Authorization};
use crate::backend::{
    BackendRpc, BattleVoteReceipt, Comment, CommentId, Entity, EntityFilter, EntityId,
    LeaderboardPeriod, LikeReceipt, ProfileSide, ProfileVoteReceipt, RpcError,
};
use crate::battle::{BattlePair, BattlePairSelector};
use crate::config::Config;
use crate::counters::{
    split_percent, CounterDelta, CounterKey, CounterRef, OptimisticCounterStore,
};
use crate::db::KeyValueStore;
use crate::error::ActionError;
use crate::protocol::{
    BattleTally, Completion, CompletionSender, ProfileTally, RpcReply, Severity, Side, StatsView,
    UiSink, UiUpdate,
};
use crate::session::ConnectionState;

pub const KEY_USER_VOTES: &str = "stats.userVotes";

const VOTE_FAILED: &str = "Vote failed. Please try again.";

/// Per-side baseline for a pair where neither entity has votes yet.
const FRESH_BATTLE_VOTES: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// Lifecycle of one user action. An action that fails authorization goes
/// straight back to `Idle`; one that reaches the server ends in
/// `Committed` or `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Idle,
    Authorizing,
    Applying,
    AwaitingServer,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub pool_size: usize,
    pub next_round_delay: Duration,
    pub leaderboard_period: LeaderboardPeriod,
    pub leaderboard_limit: usize,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pool_size: config.battle.pool_size,
            next_round_delay: config.battle.next_round_delay(),
            leaderboard_period: config.leaderboard.period,
            leaderboard_limit: config.leaderboard.limit,
        }
    }
}

/// What an in-flight action needs to settle itself.
#[derive(Debug)]
enum Pending {
    BattleVote {
        winner: EntityId,
        loser: EntityId,
        delta: CounterDelta,
    },
    ProfileVote {
        entity_id: EntityId,
        side: ProfileSide,
        delta: CounterDelta,
        /// Best-effort aggregate deltas; absent when already pending.
        globals: Vec<CounterDelta>,
    },
    Like {
        comment_id: CommentId,
        was_liked: bool,
        delta: CounterDelta,
    },
    Comment {
        target_id: EntityId,
    },
}

#[derive(Debug)]
struct InFlight {
    kind: ActionKind,
    pending: Pending,
}

#[derive(Debug, Clone)]
struct Battle {
    left: Entity,
    right: Entity,
    voted: bool,
}

impl Battle {
    fn is_matchup(&self, a: &str, b: &str) -> bool {
        BattlePair::new(self.left.id.as_str(), self.right.id.as_str())
            .same_matchup(&BattlePair::new(a, b))
    }
}

pub struct ActionCoordinator {
    authorizer: ActionAuthorizer,
    backend: Arc<dyn BackendRpc>,
    state_store: Arc<dyn KeyValueStore>,
    ui: UiSink,
    completions: CompletionSender,
    settings: CoordinatorSettings,

    counters: OptimisticCounterStore,
    selector: BattlePairSelector,
    in_flight: HashMap<ActionId, InFlight>,
    next_action_id: u64,

    battle: Option<Battle>,
    rounds: u32,
    streak: u32,
    user_votes: u64,
    loading_pool: bool,
    next_round_scheduled: bool,

    entities: HashMap<EntityId, Entity>,
    liked: HashSet<CommentId>,
}

impl ActionCoordinator {
    pub fn new(
        backend: Arc<dyn BackendRpc>,
        state_store: Arc<dyn KeyValueStore>,
        ui: UiSink,
        completions: CompletionSender,
        selector: BattlePairSelector,
        settings: CoordinatorSettings,
    ) -> Self {
        let user_votes = match state_store.get(KEY_USER_VOTES) {
            Ok(value) => value.and_then(|v| v.as_u64()).unwrap_or(0),
            Err(e) => {
                warn!("failed to read saved vote count: {e:#}");
                0
            }
        };

        Self {
            authorizer: ActionAuthorizer::new(ui.clone()),
            backend,
            state_store,
            ui,
            completions,
            settings,
            counters: OptimisticCounterStore::new(),
            selector,
            in_flight: HashMap::new(),
            next_action_id: 0,
            battle: None,
            rounds: 0,
            streak: 0,
            user_votes,
            loading_pool: false,
            next_round_scheduled: false,
            entities: HashMap::new(),
            liked: HashSet::new(),
        }
    }

    // ------ accessors ------

    pub fn counters(&self) -> &OptimisticCounterStore {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut OptimisticCounterStore {
        &mut self.counters
    }

    pub fn current_battle(&self) -> Option<(&Entity, &Entity)> {
        self.battle.as_ref().map(|b| (&b.left, &b.right))
    }

    pub fn round(&self) -> u32 {
        self.rounds
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn user_votes(&self) -> u64 {
        self.user_votes
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, id: ActionId) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn is_liked(&self, comment_id: &str) -> bool {
        self.liked.contains(comment_id)
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    // ------ actions ------

    /// Vote for one side of the current battle.
    pub fn vote_battle(
        &mut self,
        side: Side,
        connection: &ConnectionState,
    ) -> Result<ActionId, ActionError> {
        self.authorize(ActionKind::Vote, connection)?;

        let battle = self.battle.as_mut().ok_or(ActionError::NoActiveBattle)?;
        if battle.voted {
            return Err(ActionError::AlreadyVoted);
        }
        let (winner, loser) = match side {
            Side::Left => (battle.left.id.clone(), battle.right.id.clone()),
            Side::Right => (battle.right.id.clone(), battle.left.id.clone()),
        };

        let delta = self
            .counters
            .apply_optimistic(CounterRef::new(winner.clone(), CounterKey::Votes), 1)?;
        battle.voted = true;
        self.emit_battle_tally();

        let id = self.next_id();
        let backend = Arc::clone(&self.backend);
        let (w, l) = (winner.clone(), loser.clone());
        self.spawn_action(id, async move {
            RpcReply::BattleVote(backend.submit_vote(&w, &l).await)
        });
        self.track(
            id,
            ActionKind::Vote,
            Pending::BattleVote {
                winner,
                loser,
                delta,
            },
        );
        Ok(id)
    }

    /// Chad/jeet vote on a single profile. The global aggregate moves with
    /// it when its counters are free.
    pub fn vote_profile(
        &mut self,
        entity_id: &str,
        side: ProfileSide,
        connection: &ConnectionState,
    ) -> Result<ActionId, ActionError> {
        self.authorize(ActionKind::Vote, connection)?;

        let key = CounterKey::for_side(side);
        let delta = self
            .counters
            .apply_optimistic(CounterRef::new(entity_id, key), 1)?;

        let mut globals = Vec::with_capacity(2);
        for global in [CounterRef::global(key), CounterRef::global(CounterKey::Total)] {
            match self.counters.apply_optimistic(global, 1) {
                Ok(d) => globals.push(d),
                Err(e) => debug!("skipping aggregate delta: {e}"),
            }
        }
        self.emit_profile_tally(entity_id);
        self.emit_global_stats();

        let id = self.next_id();
        let backend = Arc::clone(&self.backend);
        let target = entity_id.to_string();
        self.spawn_action(id, async move {
            RpcReply::ProfileVote(backend.submit_profile_vote(&target, side).await)
        });
        self.track(
            id,
            ActionKind::Vote,
            Pending::ProfileVote {
                entity_id: entity_id.to_string(),
                side,
                delta,
                globals,
            },
        );
        Ok(id)
    }

    /// Toggle the user's like on a comment: +1 if not yet liked, -1 if
    /// liked.
    pub fn like_comment(
        &mut self,
        comment_id: &str,
        connection: &ConnectionState,
    ) -> Result<ActionId, ActionError> {
        self.authorize(ActionKind::Like, connection)?;

        let was_liked = self.liked.contains(comment_id);
        let amount = if was_liked { -1 } else { 1 };
        let delta = self
            .counters
            .apply_optimistic(CounterRef::new(comment_id, CounterKey::Likes), amount)?;
        self.set_liked(comment_id, !was_liked);
        self.emit_like_state(comment_id);

        let id = self.next_id();
        let backend = Arc::clone(&self.backend);
        let target = comment_id.to_string();
        self.spawn_action(id, async move {
            RpcReply::Like(backend.toggle_like(&target).await)
        });
        self.track(
            id,
            ActionKind::Like,
            Pending::Like {
                comment_id: comment_id.to_string(),
                was_liked,
                delta,
            },
        );
        Ok(id)
    }

    /// Post a comment. Not optimistic: the comment appears once the
    /// server accepts it.
    pub fn post_comment(
        &mut self,
        target_id: &str,
        text: &str,
        connection: &ConnectionState,
    ) -> Result<ActionId, ActionError> {
        self.authorize(ActionKind::Comment, connection)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ActionError::EmptyComment);
        }

        let id = self.next_id();
        let backend = Arc::clone(&self.backend);
        let (target, body) = (target_id.to_string(), text.to_string());
        self.spawn_action(id, async move {
            RpcReply::Comment(backend.post_comment(&target, &body).await)
        });
        self.track(
            id,
            ActionKind::Comment,
            Pending::Comment {
                target_id: target_id.to_string(),
            },
        );
        Ok(id)
    }

    /// Settle an action with its backend reply. Returns the terminal phase,
    /// or `None` if the action is unknown (already settled).
    pub fn resolve(&mut self, id: ActionId, reply: RpcReply) -> Option<ActionPhase> {
        let Some(InFlight { kind, pending }) = self.in_flight.remove(&id) else {
            debug!(%id, "reply for unknown action ignored");
            return None;
        };

        let phase = match (pending, reply) {
            (Pending::BattleVote { winner, loser, delta }, RpcReply::BattleVote(Ok(receipt))) => {
                self.commit_battle_vote(winner, loser, delta, receipt);
                ActionPhase::Committed
            }
            (
                Pending::ProfileVote {
                    entity_id,
                    side,
                    delta,
                    globals,
                },
                RpcReply::ProfileVote(Ok(receipt)),
            ) => {
                self.commit_profile_vote(entity_id, side, delta, globals, receipt);
                ActionPhase::Committed
            }
            (
                Pending::Like {
                    comment_id, delta, ..
                },
                RpcReply::Like(Ok(receipt)),
            ) => {
                self.commit_like(comment_id, delta, receipt);
                ActionPhase::Committed
            }
            (Pending::Comment { .. }, RpcReply::Comment(Ok(comment))) => {
                self.commit_comment(comment);
                ActionPhase::Committed
            }
            (pending, reply) => {
                let err = match reply_error(reply) {
                    Some(e) => ActionError::from(e),
                    None => ActionError::Server("reply does not match action".into()),
                };
                self.roll_back(pending, &err);
                ActionPhase::RolledBack
            }
        };

        debug!(%id, ?kind, ?phase, "action settled");
        Some(phase)
    }

    // ------ commit / rollback ------

    fn commit_battle_vote(
        &mut self,
        winner: EntityId,
        loser: EntityId,
        mut delta: CounterDelta,
        receipt: BattleVoteReceipt,
    ) {
        self.counters.commit(&mut delta, receipt.winner_votes);
        if let Some(votes) = receipt.loser_votes {
            self.counters
                .merge_authoritative(CounterRef::new(loser.clone(), CounterKey::Votes), votes);
        }

        self.streak += 1;
        self.ui.send(UiUpdate::Streak(self.streak));
        self.bump_user_votes();
        self.ui.notify("Vote recorded!", Severity::Success);
        info!(%winner, %loser, streak = self.streak, "battle vote recorded");

        let still_current = self
            .battle
            .as_ref()
            .is_some_and(|b| b.is_matchup(&winner, &loser));
        if still_current {
            self.emit_battle_tally();
            self.schedule_next_round();
        }
        self.refresh_leaderboard();
    }

    fn commit_profile_vote(
        &mut self,
        entity_id: EntityId,
        side: ProfileSide,
        mut delta: CounterDelta,
        globals: Vec<CounterDelta>,
        receipt: ProfileVoteReceipt,
    ) {
        self.counters.commit(&mut delta, receipt.for_side(side));
        let other = side.opposite();
        if let Some(votes) = receipt.for_side(other) {
            self.counters.merge_authoritative(
                CounterRef::new(entity_id.clone(), CounterKey::for_side(other)),
                votes,
            );
        }
        for mut global in globals {
            self.counters.commit(&mut global, None);
        }

        self.emit_profile_tally(&entity_id);
        self.emit_global_stats();
        let name = self
            .entities
            .get(&entity_id)
            .map(|e| e.username.clone())
            .unwrap_or_else(|| entity_id.clone());
        self.ui.notify(
            format!("Voted {} for {name}!", side.as_str().to_uppercase()),
            Severity::Success,
        );
    }

    fn commit_like(&mut self, comment_id: CommentId, mut delta: CounterDelta, receipt: LikeReceipt) {
        self.counters.commit(&mut delta, Some(receipt.likes));
        self.set_liked(&comment_id, receipt.liked);
        self.emit_like_state(&comment_id);
    }

    fn commit_comment(&mut self, comment: Comment) {
        self.counters
            .merge_authoritative(CounterRef::new(comment.id.clone(), CounterKey::Likes), comment.likes);
        self.ui.send(UiUpdate::CommentPosted(comment));
        self.ui.notify("Comment added!", Severity::Success);
    }

    fn roll_back(&mut self, pending: Pending, err: &ActionError) {
        warn!("action failed, rolling back: {err}");
        match pending {
            Pending::BattleVote {
                winner,
                loser,
                mut delta,
            } => {
                self.counters.rollback(&mut delta);
                if let Some(battle) = self.battle.as_mut() {
                    if battle.is_matchup(&winner, &loser) {
                        battle.voted = false;
                    }
                }
                self.emit_battle_tally();
                self.ui.notify(VOTE_FAILED, Severity::Error);
            }
            Pending::ProfileVote {
                entity_id,
                mut delta,
                globals,
                ..
            } => {
                self.counters.rollback(&mut delta);
                for mut global in globals {
                    self.counters.rollback(&mut global);
                }
                self.emit_profile_tally(&entity_id);
                self.emit_global_stats();
                self.ui.notify(VOTE_FAILED, Severity::Error);
            }
            Pending::Like {
                comment_id,
                was_liked,
                mut delta,
            } => {
                self.counters.rollback(&mut delta);
                self.set_liked(&comment_id, was_liked);
                self.emit_like_state(&comment_id);
                self.ui.notify("Failed to update like", Severity::Error);
            }
            Pending::Comment { target_id } => {
                debug!(%target_id, "comment not posted");
                self.ui.notify("Failed to add comment", Severity::Error);
            }
        }
    }

    // ------ battle rounds ------

    /// Request a fresh pool for the next battle. Ignored while a pool fetch
    /// is already outstanding.
    pub fn load_next_battle(&mut self) {
        if self.loading_pool {
            debug!("battle pool already loading");
            return;
        }
        self.loading_pool = true;

        let backend = Arc::clone(&self.backend);
        let completions = self.completions.clone();
        let filter = EntityFilter::Random {
            limit: self.settings.pool_size,
        };
        tokio::spawn(async move {
            let result = backend.fetch_entities(&filter).await;
            let _ = completions.send(Completion::BattlePool(result));
        });
    }

    /// The post-vote pause elapsed.
    pub fn next_round_due(&mut self) {
        self.next_round_scheduled = false;
        self.load_next_battle();
    }

    /// Select and present the next pair from a fetched pool.
    pub fn handle_battle_pool(
        &mut self,
        result: Result<Vec<Entity>, RpcError>,
    ) -> Result<BattlePair, ActionError> {
        self.loading_pool = false;

        let pool = match result {
            Ok(pool) => pool,
            Err(e) => {
                warn!("failed to load battle pool: {e}");
                return Err(self.report(ActionError::from(e)));
            }
        };
        self.cache_entities(&pool);

        let pair = match self.selector.select_next(&pool) {
            Ok(pair) => pair,
            Err(e) => {
                self.battle = None;
                return Err(self.report(ActionError::from(e)));
            }
        };

        let find = |id: &str| pool.iter().find(|e| e.id == id).cloned();
        let (Some(left), Some(right)) = (find(pair.left.as_str()), find(pair.right.as_str())) else {
            return Err(self.report(ActionError::Server(
                "selected entity missing from pool".into(),
            )));
        };

        if left.votes == 0 && right.votes == 0 {
            for id in [&left.id, &right.id] {
                self.counters
                    .seed(CounterRef::new(id.clone(), CounterKey::Votes), FRESH_BATTLE_VOTES);
            }
        }

        self.rounds += 1;
        self.battle = Some(Battle {
            left: left.clone(),
            right: right.clone(),
            voted: false,
        });
        info!(round = self.rounds, left = %left.id, right = %right.id, "new battle");
        self.ui.send(UiUpdate::BattlePair {
            round: self.rounds,
            left,
            right,
        });
        self.emit_battle_tally();
        Ok(pair)
    }

    fn schedule_next_round(&mut self) {
        if self.next_round_scheduled {
            return;
        }
        self.next_round_scheduled = true;

        let delay = self.settings.next_round_delay;
        let completions = self.completions.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = completions.send(Completion::NextRoundDue);
        });
    }

    // ------ reads ------

    pub fn refresh_leaderboard(&mut self) {
        let backend = Arc::clone(&self.backend);
        let completions = self.completions.clone();
        let filter = EntityFilter::Leaderboard {
            period: self.settings.leaderboard_period,
            limit: self.settings.leaderboard_limit,
        };
        tokio::spawn(async move {
            let result = backend.fetch_entities(&filter).await;
            let _ = completions.send(Completion::Leaderboard(result));
        });
    }

    pub fn handle_leaderboard(&mut self, result: Result<Vec<Entity>, RpcError>) {
        match result {
            Ok(entities) => {
                self.cache_entities(&entities);
                self.ui.send(UiUpdate::Leaderboard(entities));
            }
            Err(e) => warn!("leaderboard refresh failed: {e}"),
        }
    }

    pub fn show_comments(&mut self, target_id: &str) {
        let backend = Arc::clone(&self.backend);
        let completions = self.completions.clone();
        let target_id = target_id.to_string();
        tokio::spawn(async move {
            let result = backend.fetch_comments(&target_id).await;
            let _ = completions.send(Completion::Comments { target_id, result });
        });
    }

    /// Show fetched comments. `user_id` decides which ones the user has
    /// already liked.
    pub fn handle_comments(
        &mut self,
        target_id: EntityId,
        result: Result<Vec<Comment>, RpcError>,
        user_id: Option<&str>,
    ) {
        let comments = match result {
            Ok(comments) => comments,
            Err(e) => {
                warn!(%target_id, "failed to load comments: {e}");
                self.ui.notify("Failed to load comments", Severity::Error);
                return;
            }
        };

        for comment in &comments {
            self.counters.merge_authoritative(
                CounterRef::new(comment.id.clone(), CounterKey::Likes),
                comment.likes,
            );
            let liked = user_id.is_some_and(|u| comment.liked_by.iter().any(|l| l == u));
            if !self.counters.is_pending(&CounterRef::new(comment.id.clone(), CounterKey::Likes)) {
                self.set_liked(&comment.id, liked);
            }
        }
        self.ui.send(UiUpdate::Comments {
            target_id,
            comments,
        });
    }

    // ------ views ------

    pub fn battle_tally(&self) -> Option<BattleTally> {
        let battle = self.battle.as_ref()?;
        let left_votes = self
            .counters
            .value(&CounterRef::new(battle.left.id.clone(), CounterKey::Votes));
        let right_votes = self
            .counters
            .value(&CounterRef::new(battle.right.id.clone(), CounterKey::Votes));
        let split = split_percent(left_votes, right_votes);
        Some(BattleTally {
            left: battle.left.id.clone(),
            right: battle.right.id.clone(),
            left_votes,
            right_votes,
            left_percent: split.a,
            right_percent: split.b,
        })
    }

    pub fn profile_tally(&self, entity_id: &str) -> ProfileTally {
        let chad_votes = self
            .counters
            .value(&CounterRef::new(entity_id, CounterKey::SideA));
        let jeet_votes = self
            .counters
            .value(&CounterRef::new(entity_id, CounterKey::SideB));
        let split = split_percent(chad_votes, jeet_votes);
        ProfileTally {
            entity_id: entity_id.to_string(),
            chad_votes,
            jeet_votes,
            chad_percent: split.a,
            jeet_percent: split.b,
        }
    }

    pub fn global_stats(&self) -> StatsView {
        let total_chad = self.counters.value(&CounterRef::global(CounterKey::SideA));
        let total_jeet = self.counters.value(&CounterRef::global(CounterKey::SideB));
        StatsView {
            total_chad,
            total_jeet,
            total: self.counters.value(&CounterRef::global(CounterKey::Total)),
            jeet_percent: split_percent(total_chad, total_jeet).b,
        }
    }

    pub fn emit_global_stats(&self) {
        self.ui.send(UiUpdate::GlobalStats(self.global_stats()));
    }

    fn emit_battle_tally(&self) {
        if let Some(tally) = self.battle_tally() {
            self.ui.send(UiUpdate::BattleTally(tally));
        }
    }

    fn emit_profile_tally(&self, entity_id: &str) {
        self.ui
            .send(UiUpdate::ProfileTally(self.profile_tally(entity_id)));
    }

    fn emit_like_state(&self, comment_id: &str) {
        self.ui.send(UiUpdate::LikeState {
            comment_id: comment_id.to_string(),
            liked: self.liked.contains(comment_id),
            likes: self
                .counters
                .value(&CounterRef::new(comment_id, CounterKey::Likes)),
        });
    }

    // ------ helpers ------

    fn authorize(&self, kind: ActionKind, connection: &ConnectionState) -> Result<(), ActionError> {
        match self.authorizer.authorize(kind, connection) {
            Authorization::Allowed => Ok(()),
            Authorization::Denied(_) => Err(ActionError::AuthorizationDenied(kind)),
        }
    }

    fn next_id(&mut self) -> ActionId {
        self.next_action_id += 1;
        ActionId(self.next_action_id)
    }

    fn track(&mut self, id: ActionId, kind: ActionKind, pending: Pending) {
        debug!(%id, ?kind, phase = ?ActionPhase::AwaitingServer, "action sent");
        self.in_flight.insert(id, InFlight { kind, pending });
    }

    fn spawn_action<F>(&self, id: ActionId, call: F)
    where
        F: Future<Output = RpcReply> + Send + 'static,
    {
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let reply = call.await;
            let _ = completions.send(Completion::Action { id, reply });
        });
    }

    /// Merge server counters for fetched entities and remember them.
    fn cache_entities(&mut self, entities: &[Entity]) {
        for entity in entities {
            for (key, value) in [
                (CounterKey::Votes, entity.votes),
                (CounterKey::SideA, entity.chad_votes),
                (CounterKey::SideB, entity.jeet_votes),
            ] {
                self.counters
                    .merge_authoritative(CounterRef::new(entity.id.clone(), key), value);
            }
            self.entities.insert(entity.id.clone(), entity.clone());
        }
    }

    fn set_liked(&mut self, comment_id: &str, liked: bool) {
        if liked {
            self.liked.insert(comment_id.to_string());
        } else {
            self.liked.remove(comment_id);
        }
    }

    fn bump_user_votes(&mut self) {
        self.user_votes += 1;
        if let Err(e) = self
            .state_store
            .set(KEY_USER_VOTES, &serde_json::Value::from(self.user_votes))
        {
            warn!("failed to persist vote count: {e:#}");
        }
        self.ui.send(UiUpdate::UserVotes(self.user_votes));
    }

    /// Surface an error's notification, if it has one, and hand it back.
    pub fn report(&self, err: ActionError) -> ActionError {
        if let Some((message, severity)) = err.notification() {
            self.ui.notify(message, severity);
        }
        err
    }
}

fn reply_error(reply: RpcReply) -> Option<RpcError> {
    match reply {
        RpcReply::BattleVote(Err(e))
        | RpcReply::ProfileVote(Err(e))
        | RpcReply::Like(Err(e))
        | RpcReply::Comment(Err(e)) => Some(e),
        _ => None,
    }
}
