//! Built-in host attribute producers.
//!
//! Each producer fills one report section and tolerates whatever the host
//! does not expose.

pub mod connection;
pub mod device;
pub mod hardware;
pub mod performance;
pub mod runtime;

pub use connection::ConnectionCollector;
pub use device::DeviceCollector;
pub use hardware::HardwareCollector;
pub use performance::PerformanceCollector;
pub use runtime::RuntimeCollector;
