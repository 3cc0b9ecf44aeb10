use std::time::Duration;

use crate::gpio::GpioError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Hard GPIO failure, reported by the sysfs layer once its internal
    /// retries are exhausted.
    #[error(transparent)]
    Gpio(#[from] GpioError),

    /// The sensor did not acknowledge a command byte. Step 1 is the pull-low
    /// during the acknowledge clock pulse, step 2 the release after it.
    #[error("no acknowledgement from the sensor (step {step})")]
    NoAck { step: u8 },

    /// The sensor never signalled measurement-ready.
    #[error("measurement not ready after {0:?}")]
    MeasurementTimeout(Duration),

    #[error("crc mismatch: computed {computed:#04x}, received {received:#04x}")]
    CrcMismatch { computed: u8, received: u8 },

    /// Supply voltage label not present in the coefficient table.
    #[error("unknown supply voltage {0:?}, expected one of 5V, 4V, 3.5V, 3V, 2.5V")]
    UnknownVoltage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
