//! Shared access for concurrent callers.
//!
//! The pool engine itself is synchronous; [`SharedPool`] serializes async
//! callers behind one lock per pool.

mod shared_pool;

pub use shared_pool::*;
