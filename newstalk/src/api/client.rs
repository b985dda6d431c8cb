use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{
    ensure_success, normalize_articles, normalize_conversation, normalize_subtopic, normalize_turn,
    ApiError, ChatEnvelope, ChatRequest, NewsEnvelope, NewsResult, Subtopic, SubtopicData,
    SubtopicEnvelope, SubtopicsEnvelope,
};
use crate::models::{Side, TurnDraft};
use crate::personas::PersonaRegistry;

/// HTTP client for the news backend (`/api/*`).
#[derive(Debug, Clone)]
pub struct NewsApiClient {
    base_url: String,
    timeout: Duration,
    registry: PersonaRegistry,
    client: reqwest::Client,
}

impl NewsApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(15),
            registry: PersonaRegistry::standard(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &common::Config) -> anyhow::Result<Self> {
        Ok(Self::new(config.api_base_url()?).with_timeout(config.api_timeout()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, endpoint: &Url) -> Result<T, ApiError> {
        let endpoint_str = endpoint.path().to_string();
        debug!(endpoint = %endpoint_str, "calling backend");

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ApiError::Timeout { endpoint: endpoint_str.clone() })?
            .map_err(|source| ApiError::Transport { endpoint: endpoint_str.clone(), source })?;

        let status = response.status();
        // body read shares the request deadline
        let body = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| ApiError::Timeout { endpoint: endpoint_str.clone() })?
            .map_err(|source| ApiError::Transport { endpoint: endpoint_str.clone(), source })?;

        if !status.is_success() {
            warn!(endpoint = %endpoint_str, status = status.as_u16(), "backend returned an error status");
            return Err(ApiError::Status { status: status.as_u16(), body });
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::Malformed(format!("{} (endpoint {})", e, endpoint_str)))
    }

    /// `GET /api/subtopics/{category}`
    pub async fn subtopics(&self, category: &str) -> Result<Vec<Subtopic>, ApiError> {
        let url = self.endpoint(&["api", "subtopics", category])?;
        let env: SubtopicsEnvelope = self.send_json(self.client.get(url.clone()), &url).await?;
        ensure_success(env.success, env.message)?;
        let wire = env
            .subtopics
            .ok_or_else(|| ApiError::Malformed("missing 'subtopics'".to_string()))?;
        wire.into_iter().map(normalize_subtopic).collect()
    }

    /// `GET /api/subtopic/{category}/{subtopic}?style=..`
    pub async fn subtopic(
        &self,
        category: &str,
        subtopic_id: &str,
        style: common::Style,
    ) -> Result<SubtopicData, ApiError> {
        let url = self.endpoint(&["api", "subtopic", category, subtopic_id])?;
        let request = self.client.get(url.clone()).query(&[("style", style.as_str())]);
        let env: SubtopicEnvelope = self.send_json(request, &url).await?;
        ensure_success(env.success, env.message)?;
        let articles = env
            .articles
            .ok_or_else(|| ApiError::Malformed("missing 'articles'".to_string()))?;
        Ok(SubtopicData {
            subtopic: env.subtopic.map(normalize_subtopic).transpose()?,
            articles: normalize_articles(articles),
            conversation: normalize_conversation(env.conversation, &self.registry),
        })
    }

    /// `POST /api/chat`; the reply becomes one persona turn.
    pub async fn chat(&self, payload: &ChatRequest) -> Result<TurnDraft, ApiError> {
        let url = self.endpoint(&["api", "chat"])?;
        let env: ChatEnvelope = self
            .send_json(self.client.post(url.clone()).json(payload), &url)
            .await?;
        ensure_success(env.success, env.message)?;
        let mut turn = env
            .response
            .ok_or_else(|| ApiError::Malformed("missing 'response'".to_string()))?;
        // a reply is never the reader's own message
        turn.is_user = None;
        normalize_turn(turn, &self.registry, Side::Left)
    }

    /// `GET /api/news?q=..&days=..`
    pub async fn news(&self, query: Option<&str>, days: u32) -> Result<NewsResult, ApiError> {
        let url = self.endpoint(&["api", "news"])?;
        let mut request = self.client.get(url.clone()).query(&[("days", days.to_string())]);
        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            request = request.query(&[("q", q)]);
        }
        let env: NewsEnvelope = self.send_json(request, &url).await?;
        ensure_success(env.success, env.message)?;
        let wire = env
            .articles
            .ok_or_else(|| ApiError::Malformed("missing 'articles'".to_string()))?;
        let articles = normalize_articles(wire);
        Ok(NewsResult {
            total_articles: env.total_articles.unwrap_or(articles.len()),
            articles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_escapes_segments() {
        let client = NewsApiClient::new("http://localhost:5000/");
        let url = client.endpoint(&["api", "subtopic", "business", "tesla q3/earnings"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/subtopic/business/tesla%20q3%2Fearnings"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = NewsApiClient::new("http://host/prefix");
        let url = client.endpoint(&["api", "chat"]).unwrap();
        assert_eq!(url.as_str(), "http://host/prefix/api/chat");
    }
}
