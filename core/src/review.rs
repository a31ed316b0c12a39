//! Contract for the external command reviewer.
//!
//! The reviewer (typically LLM-backed) classifies a command before it is
//! shown in an approval prompt. The core only consumes this interface; a
//! missing or slow reviewer never blocks the approval flow beyond the
//! 20-second deadline.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

pub(crate) const REVIEW_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct ReviewAssessment {
    pub description: String,
    pub risk_level: RiskLevel,
}

#[async_trait]
pub trait CommandReviewer: Send + Sync {
    async fn review(&self, workdir: &Path, command: &str) -> ReviewAssessment;
}

/// Runs the reviewer under its deadline. `None` when it times out.
pub(crate) async fn review_command(
    reviewer: &dyn CommandReviewer,
    workdir: &Path,
    command: &str,
) -> Option<ReviewAssessment> {
    match tokio::time::timeout(REVIEW_TIMEOUT, reviewer.review(workdir, command)).await {
        Ok(assessment) => Some(assessment),
        Err(_) => {
            warn!("command reviewer timed out");
            None
        }
    }
}
