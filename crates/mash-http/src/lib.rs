// HTTP/JSON implementation of the backend RPC surface.
//
// Talks to the site's REST API under `base_url` (e.g.
// `http://localhost:3001/api`). Transport failures become
// `RpcError::Network`, non-2xx replies `RpcError::Status`, and bodies that
// do not decode `RpcError::Malformed`.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mash_core::backend::{
    AggregateStats, BackendRpc, BattleVoteReceipt, Comment, Entity, EntityFilter, LikeReceipt,
    ProfileSide, ProfileVoteReceipt, RpcError, SessionReceipt,
};
use mash_core::config::BackendConfig;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Profile listings come back either bare or wrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntityList {
    Bare(Vec<Entity>),
    Wrapped { profiles: Vec<Entity> },
}

impl EntityList {
    fn into_vec(self) -> Vec<Entity> {
        match self {
            EntityList::Bare(v) | EntityList::Wrapped { profiles: v } => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommentList {
    Bare(Vec<Comment>),
    Wrapped { comments: Vec<Comment> },
}

impl CommentList {
    fn into_vec(self) -> Vec<Comment> {
        match self {
            CommentList::Bare(v) | CommentList::Wrapped { comments: v } => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatsEnvelope {
    #[serde(default)]
    success: bool,
    stats: Option<AggregateStats>,
}

#[derive(Debug, Deserialize)]
struct AuthEnvelope {
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BattleVoteBody<'a> {
    winner_id: &'a str,
    loser_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileVoteBody {
    vote_type: ProfileSide,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentBody<'a> {
    profile_id: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthBody<'a> {
    wallet_address: &'a str,
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    /// Build a client for `base_url`. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid backend url `{base_url}`"))?;
        if base_url.cannot_be_a_base() {
            bail!("backend url `{base_url}` cannot hold a path");
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &BackendConfig) -> anyhow::Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Endpoint under the base url. Segments are percent-encoded one by
    /// one, so an id cannot add path components or a query.
    fn url(&self, segments: &[&str]) -> Result<Url, RpcError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RpcError::Malformed(format!("{} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, RpcError> {
        let url = self.url(segments)?;
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, RpcError> {
        let url = self.url(segments)?;
        debug!(%url, "POST");
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(transport_error)?;
        read_json(response).await
    }
}

#[async_trait]
impl BackendRpc for HttpBackend {
    async fn fetch_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>, RpcError> {
        let list: EntityList = match filter {
            EntityFilter::Random { limit } => {
                self.get(
                    &["profiles"],
                    &[("sort", "random".to_string()), ("limit", limit.to_string())],
                )
                .await?
            }
            EntityFilter::Leaderboard { period, limit } => {
                self.get(
                    &["leaderboard", period.as_str()],
                    &[("limit", limit.to_string())],
                )
                .await?
            }
        };
        Ok(list.into_vec())
    }

    async fn submit_vote(
        &self,
        winner_id: &str,
        loser_id: &str,
    ) -> Result<BattleVoteReceipt, RpcError> {
        self.post(
            &["votes", "battle"],
            Some(&BattleVoteBody {
                winner_id,
                loser_id,
            }),
        )
        .await
    }

    async fn submit_profile_vote(
        &self,
        entity_id: &str,
        side: ProfileSide,
    ) -> Result<ProfileVoteReceipt, RpcError> {
        self.post(
            &["profiles", entity_id, "vote"],
            Some(&ProfileVoteBody { vote_type: side }),
        )
        .await
    }

    async fn toggle_like(&self, target_id: &str) -> Result<LikeReceipt, RpcError> {
        self.post::<_, ()>(&["comments", target_id, "like"], None)
            .await
    }

    async fn fetch_comments(&self, target_id: &str) -> Result<Vec<Comment>, RpcError> {
        let list: CommentList = self.get(&["comments", target_id], &[]).await?;
        Ok(list.into_vec())
    }

    async fn post_comment(&self, target_id: &str, text: &str) -> Result<Comment, RpcError> {
        let mut comment: Comment = self
            .post(
                &["comments"],
                Some(&CommentBody {
                    profile_id: target_id,
                    text,
                }),
            )
            .await?;
        if comment.target_id.is_empty() {
            comment.target_id = target_id.to_string();
        }
        Ok(comment)
    }

    async fn fetch_aggregate_stats(&self) -> Result<AggregateStats, RpcError> {
        let envelope: StatsEnvelope = self.get(&["stats", "global"], &[]).await?;
        unwrap_stats(envelope)
    }

    async fn authenticate_session(&self, address: &str) -> Result<SessionReceipt, RpcError> {
        let envelope: AuthEnvelope = self
            .post(
                &["auth", "wallet"],
                Some(&AuthBody {
                    wallet_address: address,
                }),
            )
            .await?;
        Ok(SessionReceipt {
            user_id: envelope.user.id,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RpcError> {
    let status = response.status();
    if !status.is_success() {
        return Err(RpcError::Status {
            status: status.as_u16(),
        });
    }
    let body = response.bytes().await.map_err(transport_error)?;
    decode(&body)
}

pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RpcError> {
    serde_json::from_slice(body).map_err(|e| RpcError::Malformed(e.to_string()))
}

fn unwrap_stats(envelope: StatsEnvelope) -> Result<AggregateStats, RpcError> {
    match envelope {
        StatsEnvelope {
            success: true,
            stats: Some(stats),
        } => Ok(stats),
        _ => Err(RpcError::Malformed("stats reply not successful".into())),
    }
}

fn transport_error(err: reqwest::Error) -> RpcError {
    if err.is_timeout() {
        RpcError::Network("request timed out".into())
    } else if err.is_decode() {
        RpcError::Malformed(err.to_string())
    } else {
        RpcError::Network(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
