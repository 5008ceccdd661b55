#![forbid(unsafe_code)]

use ct_common::models::AgentJob;
use ct_common::time::utc_now_epoch_seconds;
use ct_storage::{JobOrdering, JobQuery, JobStore};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(test_name: &str) -> PathBuf {
    let nonce = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_nanos();
    let dir = std::env::temp_dir().join(format!("ct_{}_{}_{}", test_name, std::process::id(), nonce));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn new_job(uuid: &str, start_time: f64) -> AgentJob {
    AgentJob {
        job_id: None,
        job_uuid: uuid.to_string(),
        job_name: "backup".to_string(),
        job_args: vec!["rsync".to_string(), "-a".to_string()],
        job_user: "cron".to_string(),
        job_host: "host-1".to_string(),
        job_tags: vec!["nightly".to_string()],
        job_status_code: None,
        job_start_time: start_time,
        job_end_time: None,
        created_time: None,
        last_updated_time: None,
        last_updated_sequence_number: None,
    }
}

#[test]
fn add_job_assigns_identity_and_round_trips() {
    let dir = temp_dir("jobs_add");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");

    let mut job = new_job("uuid-1", 1000.0);
    job.job_tags = vec!["b".to_string(), "a".to_string(), "b".to_string()];
    let stored = store.add_job(job).expect("add job");

    assert_eq!(stored.job_id, Some(1));
    assert_eq!(stored.last_updated_sequence_number, Some(0));
    assert!(stored.created_time.is_some());
    assert_eq!(stored.created_time, stored.last_updated_time);
    // Tags behave as a set.
    assert_eq!(stored.job_tags, vec!["a".to_string(), "b".to_string()]);

    let fetched = store.get_job_by_uuid("uuid-1").expect("fetch").expect("present");
    assert_eq!(fetched, stored);
}

#[test]
fn sequence_numbers_are_dense_across_writes() {
    let dir = temp_dir("jobs_sequence");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");

    let first = store.add_job(new_job("uuid-1", 1.0)).expect("add");
    let second = store.add_job(new_job("uuid-2", 2.0)).expect("add");
    assert_eq!(first.last_updated_sequence_number, Some(0));
    assert_eq!(second.last_updated_sequence_number, Some(1));

    let completion = store
        .update_job_end_time_and_status("uuid-1", 3.0, 0)
        .expect("update")
        .expect("known uuid");
    assert_eq!(completion.job_updated_sequence_number, 2);
}

#[test]
fn completion_update_is_last_writer_wins() {
    let dir = temp_dir("jobs_completion");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");
    store.add_job(new_job("uuid-1", 1.0)).expect("add");

    let first = store
        .update_job_end_time_and_status("uuid-1", 10.0, 1)
        .expect("update")
        .expect("known uuid");
    let second = store
        .update_job_end_time_and_status("uuid-1", 20.0, 0)
        .expect("update")
        .expect("known uuid");
    assert!(second.job_updated_sequence_number > first.job_updated_sequence_number);

    let fetched = store.get_job_by_uuid("uuid-1").expect("fetch").expect("present");
    assert_eq!(fetched.job_end_time, Some(20.0));
    assert_eq!(fetched.job_status_code, Some(0));
    assert_eq!(
        fetched.last_updated_sequence_number,
        Some(second.job_updated_sequence_number)
    );
}

#[test]
fn completion_update_for_unknown_uuid_is_empty_but_successful() {
    let dir = temp_dir("jobs_unknown");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");

    let outcome = store
        .update_job_end_time_and_status("no-such-uuid", utc_now_epoch_seconds(), 0)
        .expect("must not fail");
    assert!(outcome.is_none());
}

#[test]
fn full_record_update_stamps_fresh_sequence_and_time() {
    let dir = temp_dir("jobs_full_update");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");

    let mut stored = store.add_job(new_job("uuid-1", 1.0)).expect("add");
    let original_sequence = stored.last_updated_sequence_number;

    stored.job_name = "backup-renamed".to_string();
    stored.job_end_time = Some(99.0);
    stored.job_status_code = Some(0);
    let updated = store.update_job(&stored).expect("update");
    assert!(updated.last_updated_sequence_number > original_sequence);

    let fetched = store.get_job_by_uuid("uuid-1").expect("fetch").expect("present");
    assert_eq!(fetched.job_name, "backup-renamed");
    assert_eq!(fetched.job_end_time, Some(99.0));
}

#[test]
fn full_record_update_requires_store_assigned_id() {
    let dir = temp_dir("jobs_update_no_id");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");
    assert!(store.update_job(&new_job("uuid-1", 1.0)).is_err());
}

#[test]
fn listing_supports_ordering_limit_and_offset() {
    let dir = temp_dir("jobs_listing");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");
    for (index, uuid) in ["uuid-1", "uuid-2", "uuid-3"].into_iter().enumerate() {
        store.add_job(new_job(uuid, index as f64)).expect("add");
    }

    let recent_first = JobQuery {
        limit: None,
        offset: None,
        order_by: Some(JobOrdering::start_time_descending()),
    };
    let jobs = store.get_all_jobs(&recent_first).expect("list");
    let uuids: Vec<&str> = jobs.iter().map(|job| job.job_uuid.as_str()).collect();
    assert_eq!(uuids, vec!["uuid-3", "uuid-2", "uuid-1"]);

    let page = JobQuery { limit: Some(1), offset: Some(1), ..recent_first };
    let jobs = store.get_all_jobs(&page).expect("page");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_uuid, "uuid-2");

    // Offset without limit still applies.
    let tail = JobQuery { limit: None, offset: Some(2), ..recent_first };
    let jobs = store.get_all_jobs(&tail).expect("tail");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_uuid, "uuid-1");
}

#[test]
fn active_listing_excludes_completed_jobs() {
    let dir = temp_dir("jobs_active");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");
    store.add_job(new_job("uuid-1", 1.0)).expect("add");
    store.add_job(new_job("uuid-2", 2.0)).expect("add");
    store
        .update_job_end_time_and_status("uuid-1", 3.0, 0)
        .expect("update")
        .expect("known uuid");

    let active = store.get_all_active_jobs(&JobQuery::default()).expect("active");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].job_uuid, "uuid-2");
    assert!(active[0].job_end_time.is_none());
}
