// calsync library
// Offline calendar store: cached sources, recurrence expansion and a
// durable queue of local changes waiting to reach the server

pub mod cache;
pub mod calendar;
pub mod config;
pub mod database;
pub mod error;
pub mod interval_tree;
pub mod models;
pub mod store;
pub mod sync_queue;
pub mod utils;
pub mod worker;

// Re-export commonly used types
pub use cache::SourceCache;
pub use calendar::{IcsFeed, RemoteCalendar, TimeRange};
pub use config::StoreConfig;
pub use database::Database;
pub use error::{AppError, AppResult, RemoteError};
pub use interval_tree::{IntervalHandle, IntervalTree};
pub use models::*;
pub use store::{run_sync_loop, StoreCoordinator};
pub use sync_queue::SyncQueue;
pub use worker::{TaskOutcome, Ticket, WorkerPool};
