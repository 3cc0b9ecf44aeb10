//! Driver for Sensirion SHT1x and SHT7x temperature/humidity sensors wired
//! directly to GPIO pins, using the Linux sysfs GPIO interface.
//!
//! These sensors speak a proprietary two-wire protocol, not I2C, so they
//! work on any two exportable pins:
//!
//! ```no_run
//! use sht_sensor::{PinPair, Sht, Voltage};
//!
//! let mut sht = Sht::open(PinPair::new(21, 17), Voltage::V3_5)?;
//! let t = sht.read_temperature()?;
//! let rh = sht.read_humidity(Some(t))?;
//! println!("{t:.2} C, {rh:.2} %RH");
//! # Ok::<(), sht_sensor::Error>(())
//! ```

mod convert;
mod error;
mod gpio;
mod protocol;
mod sensor;

#[cfg(all(test, feature = "hw-tests"))]
mod hw_tests;

pub use convert::{dew_point, relative_humidity, temperature, Voltage};
pub use error::*;
pub use gpio::{Direction, Gpio, GpioError, Pin, PinPair, RetryPolicy, SysfsGpio};
pub use sensor::Sht;
