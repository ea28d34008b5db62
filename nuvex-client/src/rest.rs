//! HTTP implementation of the remote collection store.
//!
//! Speaks the PostgREST dialect: collections live under `/rest/v1/<name>`,
//! filters are `column=eq.value`, ordering is `order=column.desc`. Writes ask
//! for `Prefer: return=representation` so an empty body on update or delete
//! identifies a missing target. The signed-in actor comes from
//! `/auth/v1/user`.

use async_trait::async_trait;
use nuvex_core::{
    CatalogError, CatalogResult, EntityIdType, EntityKind, NewProject, NewReview, Project,
    ProjectId, ProjectPatch, RemoteError, Review, ReviewId, ReviewPatch, Role, UserId,
    UserIdentity,
};
use nuvex_storage::{CollectionQuery, RemoteCollectionClient};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ClientConfig, ConfigError};
use crate::error::ClientResult;

const PREFER_REPRESENTATION: &str = "return=representation";

/// Error body returned by PostgREST and the auth endpoint.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, alias = "msg", alias = "error_description")]
    message: Option<String>,
}

#[derive(Clone)]
pub struct PostgrestClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    has_session: bool,
}

impl PostgrestClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let headers = build_auth_headers(&config.anon_key, config.access_token.as_deref())?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            headers,
            has_session: config.access_token.is_some(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, kind.collection())
    }

    async fn select<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        pairs: Vec<(String, String)>,
    ) -> CatalogResult<Vec<T>> {
        debug!(kind = ?kind, query = ?pairs, "Selecting rows");
        let response = self
            .client
            .get(self.collection_url(kind))
            .headers(self.headers.clone())
            .query(&pairs)
            .send()
            .await
            .map_err(transport_error)?;
        parse_rows(response).await
    }

    async fn insert<T, B>(&self, kind: EntityKind, body: &B) -> CatalogResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(self.collection_url(kind))
            .headers(self.headers.clone())
            .header("prefer", PREFER_REPRESENTATION)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let mut rows: Vec<T> = parse_rows(response).await?;
        if rows.is_empty() {
            return Err(RemoteError::InvalidResponse {
                reason: format!("insert into {kind} returned no row"),
            }
            .into());
        }
        Ok(rows.swap_remove(0))
    }

    async fn update<B>(&self, kind: EntityKind, id: &str, body: &B) -> CatalogResult<()>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .patch(self.collection_url(kind))
            .headers(self.headers.clone())
            .header("prefer", PREFER_REPRESENTATION)
            .query(&[id_filter(id)])
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let rows: Vec<serde_json::Value> = parse_rows(response).await?;
        expect_affected(kind, id, &rows)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> CatalogResult<()> {
        let response = self
            .client
            .delete(self.collection_url(kind))
            .headers(self.headers.clone())
            .header("prefer", PREFER_REPRESENTATION)
            .query(&[id_filter(id)])
            .send()
            .await
            .map_err(transport_error)?;
        let rows: Vec<serde_json::Value> = parse_rows(response).await?;
        expect_affected(kind, id, &rows)
    }
}

#[async_trait]
impl RemoteCollectionClient for PostgrestClient {
    async fn project_select(&self, query: &CollectionQuery) -> CatalogResult<Vec<Project>> {
        self.select(EntityKind::Project, select_pairs(query)).await
    }

    async fn project_insert(&self, project: &NewProject) -> CatalogResult<Project> {
        self.insert(EntityKind::Project, project).await
    }

    async fn project_update(&self, id: &ProjectId, patch: &ProjectPatch) -> CatalogResult<()> {
        self.update(EntityKind::Project, id.as_str(), patch).await
    }

    async fn project_delete(&self, id: &ProjectId) -> CatalogResult<()> {
        self.delete(EntityKind::Project, id.as_str()).await
    }

    async fn review_select(&self, query: &CollectionQuery) -> CatalogResult<Vec<Review>> {
        self.select(EntityKind::Review, select_pairs(query)).await
    }

    async fn review_insert(&self, review: &NewReview) -> CatalogResult<Review> {
        self.insert(EntityKind::Review, review).await
    }

    async fn review_update(&self, id: &ReviewId, patch: &ReviewPatch) -> CatalogResult<()> {
        self.update(EntityKind::Review, id.as_str(), patch).await
    }

    async fn review_delete(&self, id: &ReviewId) -> CatalogResult<()> {
        self.delete(EntityKind::Review, id.as_str()).await
    }

    async fn current_user(&self) -> CatalogResult<Option<UserIdentity>> {
        if !self.has_session {
            return Ok(None);
        }
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(transport_error)?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            debug!(status = response.status().as_u16(), "Session rejected, treating as anonymous");
            return Ok(None);
        }
        let identity = parse_json(response).await?;
        Ok(Some(identity))
    }

    async fn user_role_exists(&self, user_id: &UserId, role: Role) -> CatalogResult<bool> {
        let query = CollectionQuery::new()
            .eq("user_id", user_id.as_str())
            .eq("role", role.as_str());
        let mut pairs = vec![("select".to_string(), "user_id".to_string())];
        pairs.extend(query.to_query_pairs());
        pairs.push(("limit".to_string(), "1".to_string()));
        let rows: Vec<serde_json::Value> = self.select(EntityKind::UserRole, pairs).await?;
        Ok(!rows.is_empty())
    }
}

fn build_auth_headers(anon_key: &str, access_token: Option<&str>) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("apikey"),
        header_value("anon_key", anon_key)?,
    );
    let bearer = format!("Bearer {}", access_token.unwrap_or(anon_key));
    let field = if access_token.is_some() {
        "access_token"
    } else {
        "anon_key"
    };
    headers.insert(AUTHORIZATION, header_value(field, &bearer)?);
    Ok(headers)
}

fn header_value(field: &'static str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })
}

fn select_pairs(query: &CollectionQuery) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), "*".to_string())];
    pairs.extend(query.to_query_pairs());
    pairs
}

fn id_filter(id: &str) -> (&'static str, String) {
    ("id", format!("eq.{id}"))
}

/// An empty representation means no row matched the filter for this caller.
/// Row-level security yields the same answer for a refused row, so the two
/// cases both map to `NotFound`.
fn expect_affected(kind: EntityKind, id: &str, rows: &[serde_json::Value]) -> CatalogResult<()> {
    if rows.is_empty() {
        return Err(CatalogError::not_found(kind, id));
    }
    Ok(())
}

fn transport_error(err: reqwest::Error) -> CatalogError {
    if err.is_decode() {
        RemoteError::InvalidResponse {
            reason: err.to_string(),
        }
        .into()
    } else {
        RemoteError::Unreachable {
            reason: err.to_string(),
        }
        .into()
    }
}

async fn parse_rows<T: DeserializeOwned>(response: reqwest::Response) -> CatalogResult<Vec<T>> {
    parse_json(response).await
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> CatalogResult<T> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;
    if status.is_success() {
        serde_json::from_str(&text).map_err(|e| {
            RemoteError::InvalidResponse {
                reason: e.to_string(),
            }
            .into()
        })
    } else {
        Err(rejection(status.as_u16(), &text).into())
    }
}

fn rejection(status: u16, text: &str) -> RemoteError {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(ErrorBody {
            code,
            message: Some(message),
        }) => RemoteError::Rejected {
            status,
            code,
            message,
        },
        _ => RemoteError::Rejected {
            status,
            code: None,
            message: format!("HTTP {}: {}", status, text),
        },
    }
}
