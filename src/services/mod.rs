//! Service layer orchestrating storage, engine, and SSE broadcasts.

pub mod documentation;
pub mod health_service;
pub mod session_service;
pub mod sse_events;
pub mod sse_service;
pub mod storage_supervisor;
pub mod submission_service;
pub mod view_service;
