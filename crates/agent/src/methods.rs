#![forbid(unsafe_code)]

use ct_common::models::AgentJob;
use ct_common::rpc::{Dispatcher, MethodError};
use ct_storage::{JobOrdering, JobQuery, JobStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Deserialize)]
struct NoParams {}

#[derive(Serialize)]
struct PingResult {
    response: &'static str,
}

#[derive(Deserialize)]
struct AddNewJobParams {
    raw_job_record: AgentJob,
}

#[derive(Serialize)]
struct AddNewJobResult {
    record: AgentJob,
}

#[derive(Deserialize)]
struct UpdateJobEndParams {
    job_uuid: String,
    job_end_time: f64,
    job_status_code: i64,
}

#[derive(Serialize)]
struct UpdateJobEndResult {
    updated_info: Value,
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

#[derive(Serialize)]
struct RecentJobsResult {
    recent_jobs: Vec<AgentJob>,
}

#[derive(Serialize)]
struct ActiveJobsResult {
    active_jobs: Vec<AgentJob>,
}

fn ping(_: NoParams) -> Result<PingResult, MethodError> {
    Ok(PingResult { response: "pong" })
}

/// Registers every method the agent serves against a shared store handle.
pub(crate) fn build_dispatcher(store: Arc<JobStore>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();

    dispatcher.register("ping", ping);

    {
        let store = Arc::clone(&store);
        dispatcher.register(
            "add_new_job",
            move |params: AddNewJobParams| -> Result<AddNewJobResult, MethodError> {
                let record = store.add_job(params.raw_job_record).map_err(MethodError::internal)?;
                Ok(AddNewJobResult { record })
            },
        );
    }

    {
        let store = Arc::clone(&store);
        dispatcher.register(
            "update_job_end_time_and_status_code",
            move |params: UpdateJobEndParams| -> Result<UpdateJobEndResult, MethodError> {
                let updated = store
                    .update_job_end_time_and_status(
                        &params.job_uuid,
                        params.job_end_time,
                        params.job_status_code,
                    )
                    .map_err(MethodError::internal)?;
                // Unknown uuid is empty-but-successful, not an error.
                let updated_info = match updated {
                    Some(completion) => {
                        serde_json::to_value(completion).map_err(MethodError::internal)?
                    }
                    None => Value::Object(Map::new()),
                };
                Ok(UpdateJobEndResult { updated_info })
            },
        );
    }

    {
        let store = Arc::clone(&store);
        dispatcher.register(
            "get_recent_jobs",
            move |params: PageParams| -> Result<RecentJobsResult, MethodError> {
                let query = JobQuery {
                    limit: params.limit,
                    offset: params.offset,
                    order_by: Some(JobOrdering::start_time_descending()),
                };
                let recent_jobs = store.get_all_jobs(&query).map_err(MethodError::internal)?;
                Ok(RecentJobsResult { recent_jobs })
            },
        );
    }

    dispatcher.register(
        "get_active_jobs",
        move |params: PageParams| -> Result<ActiveJobsResult, MethodError> {
            let query = JobQuery {
                limit: params.limit,
                offset: params.offset,
                order_by: Some(JobOrdering::start_time_descending()),
            };
            let active_jobs = store.get_all_active_jobs(&query).map_err(MethodError::internal)?;
            Ok(ActiveJobsResult { active_jobs })
        },
    );

    dispatcher
}
