//! Core analysis library for malscout
//!
//! Turns a Windows PE image into a deduplicated set of imported API names and
//! enriches each name with a description from a remote knowledge base. The
//! HTTP transport lives in `malscout-web`; this crate is the extraction,
//! lookup, and fan-out machinery it drives.

pub mod error;
pub mod imports;
pub mod lookup;
pub mod pipeline;
pub mod report;

pub use crate::error::{Error, Result};
