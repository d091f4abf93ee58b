// Library root: re-exports all modules so integration tests and external
// consumers can access the crate's public API.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod order;
pub mod recommend;
pub mod roster;
pub mod session;
pub mod store;
pub mod validate;
