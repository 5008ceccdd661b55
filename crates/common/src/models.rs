#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// One tracked job execution, as exchanged over the agent RPC surface.
///
/// Caller-owned identity is `job_uuid`; `job_id`, `created_time`,
/// `last_updated_time` and `last_updated_sequence_number` are assigned by
/// the store and absent until the record has been persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentJob {
    #[serde(default)]
    pub job_id: Option<i64>,
    pub job_uuid: String,
    pub job_name: String,
    pub job_args: Vec<String>,
    pub job_user: String,
    pub job_host: String,
    #[serde(default)]
    pub job_tags: Vec<String>,
    #[serde(default)]
    pub job_status_code: Option<i64>,
    pub job_start_time: f64,
    #[serde(default)]
    pub job_end_time: Option<f64>,
    #[serde(default)]
    pub created_time: Option<f64>,
    #[serde(default)]
    pub last_updated_time: Option<f64>,
    #[serde(default)]
    pub last_updated_sequence_number: Option<i64>,
}

impl AgentJob {
    /// Tags behave as a set: sorted, no duplicates.
    pub fn normalize_tags(&mut self) {
        self.job_tags.sort();
        self.job_tags.dedup();
    }

    pub fn is_completed(&self) -> bool {
        self.job_end_time.is_some()
    }
}

/// Projection returned after a completion update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobCompletion {
    pub job_uuid: String,
    pub job_status_code: i64,
    pub job_end_time: f64,
    pub job_updated_time: f64,
    pub job_updated_sequence_number: i64,
}
