//! Drivers module
//!
//! Register-level sensor drivers. Each driver borrows the bus per call.

pub mod mpl3115a2;
pub mod sensor_trait;
