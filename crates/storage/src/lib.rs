#![forbid(unsafe_code)]

mod pool;
mod store;

pub use pool::{ConnectionPool, PooledConnection};
pub use store::{
    JobOrdering, JobQuery, JobStore, OrderColumn, REPLICATION_COUNTER,
    REPLICATION_LAST_SUCCESSFUL_SEQ_NUMBER, RetentionPolicy, RetentionSweep, SortDirection,
    StoreError,
};
