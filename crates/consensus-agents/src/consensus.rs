//! Consensus selection
//!
//! The consensus is every agent tied at the maximum score. Ties are kept,
//! never broken: two agents scoring 0.91 are both best.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::types::AgentResult;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    /// No results to choose from; zero models were dispatched.
    #[error("No results available for consensus")]
    EmptyResultSet,
}

/// Full result set plus the agents tied at the top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Consensus {
    pub answers: Vec<AgentResult>,
    pub best_agents: Vec<AgentResult>,
    pub max_score: f64,
}

/// Picks the best-scoring agents from a dispatch round.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusSelector;

impl ConsensusSelector {
    /// All results, plus every result whose score equals the maximum.
    ///
    /// `best_agents` keeps the order of `results`.
    pub fn select(results: Vec<AgentResult>) -> Result<Consensus, ConsensusError> {
        let max_score = results
            .iter()
            .map(AgentResult::score)
            .reduce(f64::max)
            .ok_or(ConsensusError::EmptyResultSet)?;

        let best_agents: Vec<AgentResult> = results
            .iter()
            .filter(|r| r.score() == max_score)
            .cloned()
            .collect();

        info!(
            max_score,
            best = best_agents.len(),
            total = results.len(),
            "consensus selected"
        );

        Ok(Consensus {
            answers: results,
            best_agents,
            max_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ok(id: &str, score: f64) -> AgentResult {
        AgentResult::ok(id, "answer", score, Duration::from_secs(1))
    }

    fn ids(results: &[AgentResult]) -> Vec<&str> {
        results.iter().map(AgentResult::agent_id).collect()
    }

    #[test]
    fn unique_maximum_has_one_winner() {
        let consensus =
            ConsensusSelector::select(vec![ok("a", 0.7), ok("b", 0.91), ok("c", 0.5)]).unwrap();
        assert_eq!(ids(&consensus.best_agents), vec!["b"]);
        assert_eq!(consensus.max_score, 0.91);
        assert_eq!(consensus.answers.len(), 3);
    }

    #[test]
    fn ties_return_every_tied_agent() {
        let consensus =
            ConsensusSelector::select(vec![ok("a", 1.0), ok("b", 0.8), ok("c", 1.0)]).unwrap();
        assert_eq!(ids(&consensus.best_agents), vec!["a", "c"]);
    }

    #[test]
    fn all_failed_means_all_tied_at_zero() {
        let consensus = ConsensusSelector::select(vec![
            AgentResult::timeout("a", Duration::from_secs(120)),
            AgentResult::connection_error("b"),
        ])
        .unwrap();
        assert_eq!(consensus.max_score, 0.0);
        assert_eq!(consensus.best_agents.len(), 2);
    }

    #[test]
    fn empty_set_is_an_error() {
        assert_eq!(
            ConsensusSelector::select(Vec::new()).unwrap_err(),
            ConsensusError::EmptyResultSet
        );
    }
}
