//! Core report model shared by the beacon crates.
//!
//! Provides the immutable [`Report`] produced by collection, the tagged
//! [`Section`] variant every producer returns, the error type for report
//! construction, and the clock abstraction used for timestamps and
//! deadlines.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{PageContext, Report, ReportBuilder, Section, RESERVED_FIELDS};
pub use time::{Clock, RealClock, TestClock};

/// User agent sent with every outbound request.
pub const USER_AGENT: &str = concat!("beacon/", env!("CARGO_PKG_VERSION"));
