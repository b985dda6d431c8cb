use anyhow::Result;

use crate::api::{NewsApiClient, Subtopic, SubtopicData};

/// Where a view gets its articles from.
#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    async fn subtopics(&self, category: &str) -> Result<Vec<Subtopic>>;

    async fn subtopic(&self, category: &str, subtopic_id: &str, style: common::Style) -> Result<SubtopicData>;
}

#[async_trait::async_trait]
impl ArticleSource for NewsApiClient {
    async fn subtopics(&self, category: &str) -> Result<Vec<Subtopic>> {
        Ok(NewsApiClient::subtopics(self, category).await?)
    }

    async fn subtopic(&self, category: &str, subtopic_id: &str, style: common::Style) -> Result<SubtopicData> {
        Ok(NewsApiClient::subtopic(self, category, subtopic_id, style).await?)
    }
}
