#![forbid(unsafe_code)]

use super::key_value::get_key_value;
use super::{JobStore, REPLICATION_LAST_SUCCESSFUL_SEQ_NUMBER, StoreError};
use ct_common::time::{SECONDS_PER_HOUR, utc_now_epoch_seconds};
use rusqlite::{Transaction, TransactionBehavior, params};
use serde_json::Value;

/// Age thresholds for the two-tier sweep: rows the replication layer has
/// confirmed may go early, everything else waits for the long threshold.
#[derive(Clone, Copy, Debug)]
pub struct RetentionPolicy {
    pub replicated_min_age_hours: f64,
    pub unreplicated_min_age_hours: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetentionSweep {
    pub replicated_deleted: usize,
    pub unreplicated_deleted: usize,
}

impl RetentionSweep {
    pub fn total_deleted(&self) -> usize {
        self.replicated_deleted + self.unreplicated_deleted
    }
}

/// Deletes completed jobs older than the threshold; running jobs are never
/// touched. The optional bound restricts deletion to sequence numbers at or
/// below it.
fn remove_old_jobs_tx(
    tx: &Transaction<'_>,
    minimum_age_hours: f64,
    maximum_sequence_number: Option<i64>,
) -> Result<usize, StoreError> {
    let cutoff = utc_now_epoch_seconds() - minimum_age_hours * SECONDS_PER_HOUR;
    let affected = match maximum_sequence_number {
        Some(max_sequence) => tx.execute(
            "DELETE FROM job WHERE job_end_time_utc_epoch_seconds IS NOT NULL \
             AND job_end_time_utc_epoch_seconds < ?1 \
             AND last_updated_sequence_number <= ?2",
            params![cutoff, max_sequence],
        )?,
        None => tx.execute(
            "DELETE FROM job WHERE job_end_time_utc_epoch_seconds IS NOT NULL \
             AND job_end_time_utc_epoch_seconds < ?1",
            params![cutoff],
        )?,
    };
    Ok(affected)
}

impl JobStore {
    pub fn remove_old_jobs(
        &self,
        minimum_age_hours: f64,
        maximum_sequence_number: Option<i64>,
    ) -> Result<usize, StoreError> {
        let mut conn = self.pool().checkout()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = remove_old_jobs_tx(&tx, minimum_age_hours, maximum_sequence_number)?;
        tx.commit()?;
        Ok(deleted)
    }

    /// One immediate transaction covering both passes: the replicated pass
    /// is bounded by the confirmed replication cursor and uses the short
    /// threshold; the unreplicated pass is unbounded at the long threshold.
    /// No cursor means nothing is confirmed, so only the long pass runs.
    pub fn sweep_expired_jobs(&self, policy: &RetentionPolicy) -> Result<RetentionSweep, StoreError> {
        let mut conn = self.pool().checkout()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let cursor = get_key_value(&tx, REPLICATION_LAST_SUCCESSFUL_SEQ_NUMBER)?
            .as_ref()
            .and_then(Value::as_i64);
        let replicated_deleted = match cursor {
            Some(max_sequence) => {
                remove_old_jobs_tx(&tx, policy.replicated_min_age_hours, Some(max_sequence))?
            }
            None => 0,
        };
        let unreplicated_deleted =
            remove_old_jobs_tx(&tx, policy.unreplicated_min_age_hours, None)?;
        tx.commit()?;
        Ok(RetentionSweep { replicated_deleted, unreplicated_deleted })
    }
}
