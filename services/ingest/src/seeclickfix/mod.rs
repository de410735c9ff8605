pub mod client;
pub mod issue_sync;
pub mod models;
pub mod pacing;
pub mod persist;
pub mod query;
pub mod watermark;

#[cfg(test)]
pub(crate) mod testing;
