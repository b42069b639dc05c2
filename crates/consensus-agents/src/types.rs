//! Per-agent result records.
//!
//! Field names on the wire (`agent`, `response`, `score`, `time`, `status`)
//! match what the web front-end renders.

use std::fmt;
use std::time::Duration;

use evaluation::round_score;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Response text recorded for a timed-out agent.
pub const TIMEOUT_MARKER: &str = "⏱️ Timed out (model took too long)";
/// Response text recorded when the model server was unreachable.
pub const CONNECTION_FAILURE_MARKER: &str = "❌ Could not connect to the model server";

/// Terminal state of one agent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Ok,
    Timeout,
    ConnectionError,
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectionError => write!(f, "connection_error"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of dispatching the query to one agent.
///
/// Built once through the status-specific constructors and read-only
/// afterwards. Failed agents always carry `score == 0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentResult {
    #[serde(rename = "agent")]
    agent_id: String,
    #[serde(rename = "response")]
    response_text: String,
    score: f64,
    #[serde(rename = "time")]
    elapsed_seconds: f64,
    status: AgentStatus,
}

impl AgentResult {
    /// Successful answer. Score is clamped to `[0, 1]`; score and elapsed
    /// time are rounded to two decimals.
    pub fn ok(
        agent_id: impl Into<String>,
        response_text: impl Into<String>,
        score: f64,
        elapsed: Duration,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            response_text: response_text.into(),
            score: round_score(score.clamp(0.0, 1.0)),
            elapsed_seconds: round_score(elapsed.as_secs_f64()),
            status: AgentStatus::Ok,
        }
    }

    /// The agent exceeded its read timeout after `elapsed` wall time.
    pub fn timeout(agent_id: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            agent_id: agent_id.into(),
            response_text: TIMEOUT_MARKER.to_string(),
            score: 0.0,
            elapsed_seconds: round_score(elapsed.as_secs_f64()),
            status: AgentStatus::Timeout,
        }
    }

    /// The model server was unreachable. Elapsed time is not measured.
    pub fn connection_error(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            response_text: CONNECTION_FAILURE_MARKER.to_string(),
            score: 0.0,
            elapsed_seconds: 0.0,
            status: AgentStatus::ConnectionError,
        }
    }

    /// Any other failure; `description` is embedded in the response text.
    pub fn error(agent_id: impl Into<String>, description: impl fmt::Display) -> Self {
        Self {
            agent_id: agent_id.into(),
            response_text: format!("❌ Error: {description}"),
            score: 0.0,
            elapsed_seconds: 0.0,
            status: AgentStatus::Error,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn response_text(&self) -> &str {
        &self.response_text
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == AgentStatus::Ok
    }
}
