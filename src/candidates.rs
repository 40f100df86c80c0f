//! Locally generated response candidates for the offline flow
//!
//! Candidates are drawn uniformly with replacement, so one offer may contain
//! the same content more than once. Each draw still gets its own id.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candidates per offer
pub const DEFAULT_BATCH_SIZE: usize = 4;

const DEFAULT_RESPONSES: [&str; 8] = [
    "Based on the data analysis, the optimal approach would be to implement a multi-tiered strategy.",
    "From a technical perspective, this requires careful consideration of scalability and performance.",
    "The research indicates that user engagement increases by 35% with this method.",
    "Industry best practices suggest integrating these components for maximum efficiency.",
    "Alternative solutions include leveraging cloud infrastructure for better resource management.",
    "Statistical models show a high correlation between these variables.",
    "The framework provides robust support for this use case.",
    "Recent studies demonstrate significant improvements in processing time.",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("cand-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub content: String,
}

/// The single open set of candidates the user may choose from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateOffer {
    /// Bumped on every generate/regenerate; stale offers are dropped
    pub generation: u64,
    pub seed: Option<String>,
    pub candidates: Vec<Candidate>,
}

impl CandidateOffer {
    pub fn find(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.id == id)
    }
}

/// Source of candidate contents
#[derive(Debug, Clone)]
pub struct CandidatePool {
    responses: Vec<String>,
    batch_size: usize,
}

impl Default for CandidatePool {
    fn default() -> Self {
        Self {
            responses: DEFAULT_RESPONSES.iter().map(ToString::to_string).collect(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl CandidatePool {
    /// Pool over custom responses. An empty list falls back to the defaults.
    pub fn new(responses: Vec<String>, batch_size: usize) -> Self {
        let responses = if responses.is_empty() {
            Self::default().responses
        } else {
            responses
        };
        Self {
            responses,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Draw one batch, uniformly with replacement
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Candidate> {
        (0..self.batch_size)
            .filter_map(|_| self.responses.choose(rng))
            .map(|content| Candidate {
                id: CandidateId::generate(),
                content: content.clone(),
            })
            .collect()
    }
}
