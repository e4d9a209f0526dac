//! Source of the per-user documents handed to the assistant when a session
//! starts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

pub const APPLICATIONS_FILE: &str = "applications.json";
pub const QUESTIONS_FILE: &str = "questions.json";

#[derive(Debug, Clone, PartialEq)]
pub struct DomainData {
    pub applications: Value,
    pub questions: Value,
}

impl DomainData {
    pub fn empty() -> Self {
        Self {
            applications: empty_document(),
            questions: empty_document(),
        }
    }
}

/// `{"items": [], "totalCount": 0}`
pub fn empty_document() -> Value {
    json!({ "items": [], "totalCount": 0 })
}

#[async_trait]
pub trait DomainDataSource: Send + Sync {
    async fn load(&self, user_id: &str) -> anyhow::Result<DomainData>;
}

/// Always returns empty documents.
pub struct EmptyDataSource;

#[async_trait]
impl DomainDataSource for EmptyDataSource {
    async fn load(&self, _user_id: &str) -> anyhow::Result<DomainData> {
        Ok(DomainData::empty())
    }
}

/// Reads `<root>/<user_id>/applications.json` and `questions.json`. Missing
/// files fall back to empty documents; unreadable or invalid files are errors.
pub struct DirectoryDataSource {
    root: PathBuf,
}

impl DirectoryDataSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn user_dir(&self, user_id: &str) -> anyhow::Result<PathBuf> {
        let trimmed = user_id.trim();
        if trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.contains(['/', '\\'])
        {
            anyhow::bail!("Invalid user id: {:?}", user_id);
        }
        Ok(self.root.join(trimmed))
    }
}

#[async_trait]
impl DomainDataSource for DirectoryDataSource {
    async fn load(&self, user_id: &str) -> anyhow::Result<DomainData> {
        let dir = self.user_dir(user_id)?;
        let applications = read_document(&dir.join(APPLICATIONS_FILE)).await?;
        let questions = read_document(&dir.join(QUESTIONS_FILE)).await?;
        Ok(DomainData {
            applications,
            questions,
        })
    }
}

async fn read_document(path: &Path) -> anyhow::Result<Value> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|err| anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), err)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Domain document missing, using empty");
            Ok(empty_document())
        }
        Err(err) => Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), err)),
    }
}
