//! Beacon reporting agent.
//!
//! Ties collection and delivery together: a [`Session`] assembles one
//! environment report with the host producers and hands it to the delivery
//! engine, returning a [`SessionOutcome`] that never carries an error type.
//! [`Config`] loads the agent options from defaults, `beacon.toml` and
//! `BEACON_` environment variables.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod session;

pub use config::Config;
pub use error::{Result, SessionError};
pub use session::{Session, SessionOutcome};
