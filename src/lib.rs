pub mod cache;
pub mod matching;
pub mod models;
pub mod orchestrator;
pub mod parsing;
pub mod queue;
pub mod reporting;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
