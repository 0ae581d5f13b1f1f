use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::StoryboardSource;
use crate::error::{StoryResult, StoryboardError};
use crate::response::{decode_storyboard, ValidationPolicy};
use crate::schema::Storyboard;

/// Serves a previously saved model response from disk instead of calling a
/// model. The explanation is ignored; the file is re-read on every call so
/// edits show up on the next generation.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    path: PathBuf,
    validation: ValidationPolicy,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>, validation: ValidationPolicy) -> Self {
        Self {
            path: path.into(),
            validation,
        }
    }
}

#[async_trait]
impl StoryboardSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    async fn generate(&self, _explanation: &str) -> StoryResult<Storyboard> {
        info!(path = %self.path.display(), "replaying saved storyboard response");
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|error| {
            StoryboardError::configuration(format!(
                "failed to read replay file {}: {error}",
                self.path.display()
            ))
        })?;
        decode_storyboard(&raw, self.validation)
    }
}
