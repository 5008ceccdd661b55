#![forbid(unsafe_code)]

use super::counters::get_and_increment_counter_tx;
use super::{JobStore, REPLICATION_COUNTER, StoreError};
use ct_common::models::{AgentJob, JobCompletion};
use ct_common::time::utc_now_epoch_seconds;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params, params_from_iter};

const JOB_COLUMNS: &str = "job_id, job_uuid, job_name, job_args_json, job_user, job_host, \
     job_tags_json, job_status_code, job_start_time_utc_epoch_seconds, \
     job_end_time_utc_epoch_seconds, created_time_utc_epoch_seconds, \
     last_updated_time_utc_epoch_seconds, last_updated_sequence_number";

/// Closed allow-list of sortable columns. Caller-supplied order-by input is
/// mapped through this enum and never interpolated into SQL as text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderColumn {
    StartTime,
    EndTime,
    CreatedTime,
    LastUpdatedTime,
    SequenceNumber,
}

impl OrderColumn {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "job_start_time" => Some(OrderColumn::StartTime),
            "job_end_time" => Some(OrderColumn::EndTime),
            "created_time" => Some(OrderColumn::CreatedTime),
            "last_updated_time" => Some(OrderColumn::LastUpdatedTime),
            "last_updated_sequence_number" => Some(OrderColumn::SequenceNumber),
            _ => None,
        }
    }

    fn as_column(self) -> &'static str {
        match self {
            OrderColumn::StartTime => "job_start_time_utc_epoch_seconds",
            OrderColumn::EndTime => "job_end_time_utc_epoch_seconds",
            OrderColumn::CreatedTime => "created_time_utc_epoch_seconds",
            OrderColumn::LastUpdatedTime => "last_updated_time_utc_epoch_seconds",
            OrderColumn::SequenceNumber => "last_updated_sequence_number",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobOrdering {
    pub column: OrderColumn,
    pub direction: SortDirection,
}

impl JobOrdering {
    pub fn start_time_descending() -> Self {
        Self { column: OrderColumn::StartTime, direction: SortDirection::Descending }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JobQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order_by: Option<JobOrdering>,
}

fn job_from_row(row: &Row<'_>) -> Result<AgentJob, rusqlite::Error> {
    let args_json: String = row.get(3)?;
    let tags_json: String = row.get(6)?;
    Ok(AgentJob {
        job_id: row.get(0)?,
        job_uuid: row.get(1)?,
        job_name: row.get(2)?,
        job_args: serde_json::from_str(&args_json)
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?,
        job_user: row.get(4)?,
        job_host: row.get(5)?,
        job_tags: serde_json::from_str(&tags_json)
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(err)))?,
        job_status_code: row.get(7)?,
        job_start_time: row.get(8)?,
        job_end_time: row.get(9)?,
        created_time: row.get(10)?,
        last_updated_time: row.get(11)?,
        last_updated_sequence_number: row.get(12)?,
    })
}

impl JobStore {
    /// Persists a new job record. Sequence assignment and the insert commit
    /// atomically; `created_time` and `last_updated_time` are stamped here,
    /// never trusted from the caller.
    pub fn add_job(&self, mut job: AgentJob) -> Result<AgentJob, StoreError> {
        job.normalize_tags();
        let args_json = serde_json::to_string(&job.job_args)?;
        let tags_json = serde_json::to_string(&job.job_tags)?;

        let mut conn = self.pool().checkout()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sequence_number = get_and_increment_counter_tx(&tx, REPLICATION_COUNTER)?;
        let now = utc_now_epoch_seconds();
        tx.execute(
            "INSERT INTO job (job_uuid, job_name, job_args_json, job_user, job_host, \
             job_tags_json, job_status_code, job_start_time_utc_epoch_seconds, \
             job_end_time_utc_epoch_seconds, created_time_utc_epoch_seconds, \
             last_updated_time_utc_epoch_seconds, last_updated_sequence_number) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                job.job_uuid,
                job.job_name,
                args_json,
                job.job_user,
                job.job_host,
                tags_json,
                job.job_status_code,
                job.job_start_time,
                job.job_end_time,
                now,
                now,
                sequence_number,
            ],
        )?;
        job.job_id = Some(tx.last_insert_rowid());
        tx.commit()?;

        job.created_time = Some(now);
        job.last_updated_time = Some(now);
        job.last_updated_sequence_number = Some(sequence_number);
        Ok(job)
    }

    /// Full-record update addressed by the store-assigned `job_id`, with a
    /// fresh sequence number and update time.
    pub fn update_job(&self, job: &AgentJob) -> Result<AgentJob, StoreError> {
        let Some(job_id) = job.job_id else {
            return Err(StoreError::InvalidInput("update_job requires a store-assigned job_id"));
        };
        let args_json = serde_json::to_string(&job.job_args)?;
        let tags_json = serde_json::to_string(&job.job_tags)?;

        let mut conn = self.pool().checkout()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sequence_number = get_and_increment_counter_tx(&tx, REPLICATION_COUNTER)?;
        let now = utc_now_epoch_seconds();
        tx.execute(
            "UPDATE job SET job_uuid = ?1, job_name = ?2, job_args_json = ?3, job_user = ?4, \
             job_host = ?5, job_tags_json = ?6, job_status_code = ?7, \
             job_start_time_utc_epoch_seconds = ?8, job_end_time_utc_epoch_seconds = ?9, \
             last_updated_time_utc_epoch_seconds = ?10, last_updated_sequence_number = ?11 \
             WHERE job_id = ?12",
            params![
                job.job_uuid,
                job.job_name,
                args_json,
                job.job_user,
                job.job_host,
                tags_json,
                job.job_status_code,
                job.job_start_time,
                job.job_end_time,
                now,
                sequence_number,
                job_id,
            ],
        )?;
        tx.commit()?;

        let mut updated = job.clone();
        updated.last_updated_time = Some(now);
        updated.last_updated_sequence_number = Some(sequence_number);
        Ok(updated)
    }

    /// Records a job's completion, addressed by uuid. An unknown uuid is
    /// not an error: the result is `Ok(None)` and the write is a no-op
    /// apart from the consumed sequence number. Repeated calls for the
    /// same uuid are last-writer-wins.
    pub fn update_job_end_time_and_status(
        &self,
        job_uuid: &str,
        job_end_time: f64,
        job_status_code: i64,
    ) -> Result<Option<JobCompletion>, StoreError> {
        let mut conn = self.pool().checkout()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sequence_number = get_and_increment_counter_tx(&tx, REPLICATION_COUNTER)?;
        let now = utc_now_epoch_seconds();
        let affected = tx.execute(
            "UPDATE job SET job_status_code = ?1, job_end_time_utc_epoch_seconds = ?2, \
             last_updated_time_utc_epoch_seconds = ?3, last_updated_sequence_number = ?4 \
             WHERE job_uuid = ?5",
            params![job_status_code, job_end_time, now, sequence_number, job_uuid],
        )?;
        tx.commit()?;

        if affected == 0 {
            return Ok(None);
        }
        Ok(Some(JobCompletion {
            job_uuid: job_uuid.to_string(),
            job_status_code,
            job_end_time,
            job_updated_time: now,
            job_updated_sequence_number: sequence_number,
        }))
    }

    pub fn get_job_by_uuid(&self, job_uuid: &str) -> Result<Option<AgentJob>, StoreError> {
        let conn = self.pool().checkout()?;
        let job = conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM job WHERE job_uuid = ?1"),
                params![job_uuid],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    pub fn get_all_jobs(&self, query: &JobQuery) -> Result<Vec<AgentJob>, StoreError> {
        self.select_jobs(None, query)
    }

    /// Active means no end time has been recorded yet.
    pub fn get_all_active_jobs(&self, query: &JobQuery) -> Result<Vec<AgentJob>, StoreError> {
        self.select_jobs(Some("job_end_time_utc_epoch_seconds IS NULL"), query)
    }

    fn select_jobs(
        &self,
        filter: Option<&str>,
        query: &JobQuery,
    ) -> Result<Vec<AgentJob>, StoreError> {
        let mut sql = format!("SELECT {JOB_COLUMNS} FROM job");
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        if let Some(ordering) = query.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(ordering.column.as_column());
            sql.push(' ');
            sql.push_str(ordering.direction.as_sql());
        }
        let mut bound: Vec<i64> = Vec::new();
        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                bound.push(limit);
                bound.push(offset);
            }
            (Some(limit), None) => {
                sql.push_str(" LIMIT ?");
                bound.push(limit);
            }
            // SQLite requires LIMIT before OFFSET; -1 means unbounded.
            (None, Some(offset)) => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                bound.push(offset);
            }
            (None, None) => {}
        }

        let conn = self.pool().checkout()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bound))?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next()? {
            jobs.push(job_from_row(row)?);
        }
        Ok(jobs)
    }
}
