//! Sharded single-writer async runtime and event stream APIs.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle, shard loops and persistence worker.
pub mod handle;
