//! Test fixtures and data generators

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use chat_common::AppConfig;

/// Shared secret used by every test server
pub const TEST_SECRET: &str = "integration-test-secret-that-is-long-enough";

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A room id no other test uses
pub fn unique_room() -> String {
    format!("room-{}", unique_suffix())
}

/// Build a gateway configuration from explicit variables
///
/// Nothing is read from the process environment, so no database is used
/// and messages stay in memory.
pub fn test_config(vars: &[(&str, &str)]) -> Result<AppConfig> {
    let mut vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    vars.entry("JWT_SECRET".to_string())
        .or_insert_with(|| TEST_SECRET.to_string());

    AppConfig::from_lookup(|key| vars.get(key).cloned())
        .map_err(|e| anyhow::anyhow!("Config error: {e}"))
}
