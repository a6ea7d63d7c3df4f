//! Content-addressing primitives shared by the forum graph.
//!
//! - [`ContentHash`]: 64-byte SHA3-512 content address of a puff
//! - [`current_timestamp_millis`]: the clock used for payload timestamps

mod hash;

pub use hash::{current_timestamp_millis, ContentHash};
