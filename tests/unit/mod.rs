//! Unit tests for individual components

mod builders_test;
mod config_test;
mod counter_test;
mod error_test;
mod squelch_test;
mod worker_pool_test;
