//! SW03 weather board driver
//!
//! `no_std` driver for the NXP MPL3115A2 pressure / altitude / temperature
//! sensor on the XinaBox SW03, built on `embedded-hal` 1.0. The bus and delay
//! are borrowed per call, so several drivers can share one bus.
//!
//! ```ignore
//! let mut sw03 = Mpl3115a2::default();
//! sw03.init(&mut i2c, 0)?;
//! let temp = sw03.get_temp_c(&mut i2c, &mut delay)?;    // °C
//! let alt = sw03.get_altitude(&mut i2c, &mut delay)?;   // m
//! let pres = sw03.get_pressure(&mut i2c, &mut delay)?;  // Pa
//! ```
//!
//! Features: `defmt` or `log` route the driver's internal logging.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to the other modules.
mod fmt;

pub mod drivers;
pub mod middleware;

pub use drivers::mpl3115a2::{
    altitude_from_raw, pressure_from_raw, temperature_from_raw, Error, Measurement, Mode, Mpl3115a2,
    Oversample, RawSample, DEFAULT_CLOCK_HZ, MPL3115A2_ADDR,
};
pub use drivers::sensor_trait::SensorDriver;
pub use middleware::sw03_api::Sw03Middleware;
