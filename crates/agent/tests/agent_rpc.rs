#![forbid(unsafe_code)]

use ct_agent::{AgentApp, AgentConfig, CleanUpPolicy, ShutdownHandle};
use ct_common::rpc::{RpcClient, RpcClientError};
use serde_json::{Value, json};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

fn temp_dir(test_name: &str) -> PathBuf {
    let nonce = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_nanos();
    let dir = std::env::temp_dir().join(format!("ct_{}_{}_{}", test_name, std::process::id(), nonce));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

struct RunningAgent {
    socket_path: PathBuf,
    shutdown: ShutdownHandle,
    server: Option<std::thread::JoinHandle<()>>,
}

impl RunningAgent {
    fn start(dir: &Path) -> Self {
        let socket_path = dir.join("agent.sock");
        let config = AgentConfig {
            sqlite_database_path: dir.join("agent.db"),
            listen_socket_path: socket_path.clone(),
            clean_up_policy: CleanUpPolicy { enabled: false, ..CleanUpPolicy::default() },
        };
        let app = AgentApp::build(config).expect("build agent");
        let shutdown = app.shutdown_handle();
        let server = std::thread::spawn(move || {
            app.run().expect("agent run");
        });
        wait_for_socket(&socket_path);
        Self { socket_path, shutdown, server: Some(server) }
    }

    fn client(&self) -> RpcClient {
        RpcClient::new(&self.socket_path)
    }
}

impl Drop for RunningAgent {
    fn drop(&mut self) {
        self.shutdown.request_shutdown();
        if let Some(server) = self.server.take() {
            let _ = server.join();
        }
    }
}

fn wait_for_socket(socket_path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if UnixStream::connect(socket_path).is_ok() {
            return;
        }
        assert!(Instant::now() < deadline, "agent socket never came up");
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn raw_job_record(uuid: &str, start_time: f64) -> Value {
    json!({
        "job_uuid": uuid,
        "job_name": "foo",
        "job_args": ["sleep", "3"],
        "job_user": "cron",
        "job_host": "host-1",
        "job_tags": ["nightly"],
        "job_start_time": start_time,
    })
}

#[test]
fn two_clients_ping_concurrently() {
    let dir = temp_dir("agent_ping");
    let agent = RunningAgent::start(&dir);

    let mut client = agent.client();
    let mut client_2 = agent.client();
    assert_eq!(client.call("ping", json!({})).expect("ping"), json!({"response": "pong"}));
    assert_eq!(client_2.call("ping", json!({})).expect("ping"), json!({"response": "pong"}));
    // Both connections stay usable afterwards.
    assert_eq!(client.call("ping", json!({})).expect("ping"), json!({"response": "pong"}));
}

#[test]
fn malformed_magic_closes_only_that_connection() {
    let dir = temp_dir("agent_magic");
    let agent = RunningAgent::start(&dir);

    let mut rogue = UnixStream::connect(&agent.socket_path).expect("connect");
    rogue.set_read_timeout(Some(Duration::from_secs(5))).expect("timeout");
    rogue.write_all(&[0x00, 0x01, 0x02, 0x03, 0x04]).expect("write junk");
    let mut sink = Vec::new();
    // The server drops the connection without answering.
    let read = rogue.read_to_end(&mut sink).expect("read until close");
    assert_eq!(read, 0);

    // The listener itself is unaffected.
    let mut client = agent.client();
    assert_eq!(client.call("ping", json!({})).expect("ping"), json!({"response": "pong"}));
}

#[test]
fn unknown_method_is_reported_without_killing_the_connection() {
    let dir = temp_dir("agent_unknown_method");
    let agent = RunningAgent::start(&dir);

    let mut client = agent.client();
    match client.call("no_such_method", json!({})) {
        Err(RpcClientError::Remote { code, .. }) => assert_eq!(code, -32601),
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(client.call("ping", json!({})).expect("ping"), json!({"response": "pong"}));
}

#[test]
fn job_lifecycle_over_rpc() {
    let dir = temp_dir("agent_lifecycle");
    let agent = RunningAgent::start(&dir);
    let mut client = agent.client();

    let empty = client
        .call("get_recent_jobs", json!({"limit": null, "offset": null}))
        .expect("recent jobs");
    assert_eq!(empty, json!({"recent_jobs": []}));

    let added = client
        .call("add_new_job", json!({"raw_job_record": raw_job_record("uuid-1", 1000.0)}))
        .expect("add job");
    let record = added.get("record").expect("record");
    assert_eq!(record["job_uuid"], json!("uuid-1"));
    assert_eq!(record["last_updated_sequence_number"], json!(0));
    assert!(record["job_id"].as_i64().is_some());

    // Unknown uuid completes empty-but-successfully.
    let missing = client
        .call(
            "update_job_end_time_and_status_code",
            json!({"job_uuid": "no-such-uuid", "job_end_time": 2000.0, "job_status_code": 0}),
        )
        .expect("update unknown");
    assert_eq!(missing, json!({"updated_info": {}}));

    let updated = client
        .call(
            "update_job_end_time_and_status_code",
            json!({"job_uuid": "uuid-1", "job_end_time": 2000.0, "job_status_code": 0}),
        )
        .expect("update");
    let info = updated.get("updated_info").expect("updated_info");
    assert_eq!(info["job_uuid"], json!("uuid-1"));
    assert_eq!(info["job_status_code"], json!(0));
    assert_eq!(info["job_end_time"], json!(2000.0));

    let recent = client
        .call("get_recent_jobs", json!({"limit": null, "offset": null}))
        .expect("recent jobs");
    let jobs = recent["recent_jobs"].as_array().expect("array");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["job_args"], json!(["sleep", "3"]));
    assert_eq!(jobs[0]["job_status_code"], json!(0));
}

#[test]
fn active_jobs_reflect_pending_completions() {
    let dir = temp_dir("agent_active");
    let agent = RunningAgent::start(&dir);
    let mut client = agent.client();

    client
        .call("add_new_job", json!({"raw_job_record": raw_job_record("uuid-1", 1.0)}))
        .expect("add");
    client
        .call("add_new_job", json!({"raw_job_record": raw_job_record("uuid-2", 2.0)}))
        .expect("add");
    client
        .call(
            "update_job_end_time_and_status_code",
            json!({"job_uuid": "uuid-1", "job_end_time": 3.0, "job_status_code": 0}),
        )
        .expect("complete");

    let active = client.call("get_active_jobs", json!({})).expect("active jobs");
    let jobs = active["active_jobs"].as_array().expect("array");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["job_uuid"], json!("uuid-2"));
}

#[test]
fn invalid_params_are_rejected_before_the_store_is_touched() {
    let dir = temp_dir("agent_invalid_params");
    let agent = RunningAgent::start(&dir);
    let mut client = agent.client();

    match client.call(
        "update_job_end_time_and_status_code",
        json!({"job_uuid": "uuid-1", "job_end_time": "not-a-number", "job_status_code": 0}),
    ) {
        Err(RpcClientError::Remote { code, .. }) => assert_eq!(code, -32602),
        other => panic!("expected invalid params, got {other:?}"),
    }

    let recent = client
        .call("get_recent_jobs", json!({}))
        .expect("recent jobs");
    assert_eq!(recent, json!({"recent_jobs": []}));
}
