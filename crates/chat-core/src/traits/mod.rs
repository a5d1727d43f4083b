//! Ports implemented by the infrastructure layer

mod repositories;

pub use repositories::{MessageStore, RepoResult, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
