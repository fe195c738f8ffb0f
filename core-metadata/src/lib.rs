//! # Cover Art Fetching
//!
//! A bounded pool of background workers that resolve cover art for library
//! entries without blocking the caller.
//!
//! ## Overview
//!
//! - [`CoverFetchPool`] owns N workers consuming one bounded queue
//! - [`CoverJob`] carries the lookup keys, the destination file and a
//!   completion callback
//! - The actual lookup is delegated to a host-supplied
//!   [`bridge_traits::CoverResolver`]

pub mod cover_pool;
pub mod error;

pub use cover_pool::{
    CoverCallback, CoverFetchConfig, CoverFetchPool, CoverJob, CoverOutcome, CoverPoolStats,
};
pub use error::{MetadataError, Result};
