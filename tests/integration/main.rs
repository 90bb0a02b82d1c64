//! End-to-end flows over a small blog schema.
//!
//! Every database answer is scripted through `MockExecutor`, so no server
//! is needed.

mod common;
mod concurrency;
mod load_flow;
mod store_flow;
