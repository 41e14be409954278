//! Persistence layer: entities, storage errors, and store backends.

pub mod game_store;
pub mod models;
pub mod storage;
