//! Device detection and protocol exchange: AT commands, the Odin binary
//! handshake, and the coordinator that moves a device between the two.

pub mod at;
pub mod error;
pub mod mode;
pub mod models;
pub mod odin;

pub use error::DeviceError;
pub use models::{ATDeviceInfo, OdinDeviceInfo};
