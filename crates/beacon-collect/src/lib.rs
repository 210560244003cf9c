//! Host attribute collection for beacon reports.
//!
//! Attribute producers are independent and best-effort: each fills one
//! report section or records why it could not. The [`ReportAssembler`] runs
//! them concurrently and merges their sections into a
//! [`beacon_core::Report`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod assembler;
pub mod error;
pub mod lookup;
pub mod producer;
pub mod producers;

pub use assembler::{AssemblerConfig, ReportAssembler, IP_SECTION, LOCATION_SECTION};
pub use error::{CollectError, Result};
pub use lookup::{
    location_from_response, HttpIpResolver, HttpLocationLookup, LookupConfig,
    DEFAULT_IP_LOOKUP_URLS, DEFAULT_LOCATION_LOOKUP_URL,
};
pub use producer::{Collector, Feature, IpResolver, LocationLookup, UNKNOWN_IP};
