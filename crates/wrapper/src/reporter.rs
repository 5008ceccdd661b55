#![forbid(unsafe_code)]

use ct_common::models::AgentJob;
use ct_common::rpc::RpcClient;
use serde_json::json;
use std::path::Path;

/// Best-effort job tracking. Every failure is logged and swallowed, and the
/// client is dropped after the first fault; the wrapped job must never be
/// blocked by tracking unavailability. There is no retry queue.
pub struct Reporter {
    client: Option<RpcClient>,
}

impl Reporter {
    pub fn connect(socket_path: &Path) -> Self {
        let mut client = RpcClient::new(socket_path);
        match client.connect() {
            Ok(()) => Self { client: Some(client) },
            Err(err) => {
                eprintln!("ct_wrapper: agent unreachable, running untracked: {err}");
                Self { client: None }
            }
        }
    }

    pub fn report_start(&mut self, job: &AgentJob) {
        let Some(client) = self.client.as_mut() else {
            return;
        };
        let record = match serde_json::to_value(job) {
            Ok(record) => record,
            Err(err) => {
                eprintln!("ct_wrapper: cannot encode job record: {err}");
                return;
            }
        };
        if let Err(err) = client.call("add_new_job", json!({ "raw_job_record": record })) {
            eprintln!("ct_wrapper: failed to register job start: {err}");
            self.client = None;
        }
    }

    pub fn report_completion(&mut self, job_uuid: &str, job_end_time: f64, job_status_code: i64) {
        let Some(client) = self.client.as_mut() else {
            return;
        };
        let params = json!({
            "job_uuid": job_uuid,
            "job_end_time": job_end_time,
            "job_status_code": job_status_code,
        });
        if let Err(err) = client.call("update_job_end_time_and_status_code", params) {
            eprintln!("ct_wrapper: failed to report job completion: {err}");
            self.client = None;
        }
    }
}
