//! Pin access through the Linux sysfs GPIO interface.
//!
//! The protocol engine talks to pins through the [`Gpio`] trait so it can be
//! tested against a scripted implementation; [`SysfsGpio`] is the real one,
//! driving attribute files under `/sys/class/gpio`. Pins are exported on
//! demand, and every attribute access is retried for a short while because
//! freshly exported files can reject access until udev has fixed up their
//! ownership.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::debug;

/// GPIO line number, in the kernel sysfs numbering scheme.
pub type Pin = u16;

/// The clock/data line pair a sensor is wired to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinPair {
    pub sck: Pin,
    pub data: Pin,
}

impl PinPair {
    pub const fn new(sck: Pin, data: Pin) -> Self {
        Self { sck, data }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_sysfs(self) -> &'static [u8] {
        match self {
            Direction::In => b"in",
            Direction::Out => b"out",
        }
    }
}

/// Hard GPIO failure. Transient I/O errors are absorbed by the retry layer;
/// what comes out here is final.
#[derive(thiserror::Error, Debug)]
pub enum GpioError {
    /// No sysfs control directory for the pin, even after an export attempt.
    #[error("no sysfs control path for pin {0}")]
    UnknownPin(Pin),

    /// An attribute access kept failing until the retry budget ran out.
    #[error("gpio access failed after {attempts} attempts: {source}")]
    AccessFailed {
        attempts: u32,
        #[source]
        source: io::Error,
    },
}

/// Bounded retry with a fixed delay between attempts.
///
/// The operation always runs at least once, even with a zero attempt count.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // roughly a one second budget, enough for udev to catch up
        Self {
            attempts: 12,
            delay: Duration::from_millis(83),
        }
    }
}

impl RetryPolicy {
    pub fn run<T>(&self, mut op: impl FnMut() -> io::Result<T>) -> Result<T, GpioError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts => {
                    debug!("gpio access failed (attempt {attempt}): {err}");
                    thread::sleep(self.delay);
                }
                Err(err) => {
                    return Err(GpioError::AccessFailed {
                        attempts: attempt,
                        source: err,
                    })
                }
            }
        }
    }
}

/// Pin capability consumed by the protocol engine. Levels are logical
/// (`true` is high); implementations report only hard failures.
pub trait Gpio {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<(), GpioError>;
    fn write(&mut self, pin: Pin, level: bool) -> Result<(), GpioError>;
    fn read(&mut self, pin: Pin) -> Result<bool, GpioError>;
}

impl<G: Gpio + ?Sized> Gpio for &mut G {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<(), GpioError> {
        (**self).set_direction(pin, direction)
    }

    fn write(&mut self, pin: Pin, level: bool) -> Result<(), GpioError> {
        (**self).write(pin, level)
    }

    fn read(&mut self, pin: Pin) -> Result<bool, GpioError> {
        (**self).read(pin)
    }
}

/// `/sys/class/gpio` implementation with a per-instance cache of resolved
/// pin control directories.
pub struct SysfsGpio {
    base: PathBuf,
    paths: HashMap<Pin, PathBuf>,
    retry: RetryPolicy,
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_base("/sys/class/gpio")
    }

    /// Uses `base` instead of `/sys/class/gpio`. The tests point this at a
    /// scratch directory laid out like the real tree.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            paths: HashMap::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Control directory for a pin, exporting it first if the kernel has not
    /// done so yet.
    fn pin_path(&mut self, pin: Pin) -> Result<PathBuf, GpioError> {
        if let Some(path) = self.paths.get(&pin) {
            return Ok(path.clone());
        }
        let mut exported = false;
        loop {
            if let Some(path) = self.resolve(pin) {
                self.paths.insert(pin, path.clone());
                return Ok(path);
            }
            if exported {
                return Err(GpioError::UnknownPin(pin));
            }
            debug!("exporting pin {pin}");
            let export = self.base.join("export");
            self.write_file(&export, pin.to_string().as_bytes())?;
            exported = true;
        }
    }

    /// Plain `gpioN` first; some platforms suffix the directory with the
    /// line name (`gpio44_PB12`), so a prefix scan is the fallback.
    fn resolve(&self, pin: Pin) -> Option<PathBuf> {
        let plain = self.base.join(format!("gpio{pin}"));
        if plain.is_dir() {
            return Some(plain);
        }
        let prefix = format!("gpio{pin}_");
        for entry in std::fs::read_dir(&self.base).ok()?.flatten() {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                return Some(entry.path());
            }
        }
        None
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), GpioError> {
        self.retry.run(|| {
            let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
            file.write_all(contents)
        })
    }
}

impl Gpio for SysfsGpio {
    fn set_direction(&mut self, pin: Pin, direction: Direction) -> Result<(), GpioError> {
        let path = self.pin_path(pin)?.join("direction");
        self.write_file(&path, direction.as_sysfs())
    }

    fn write(&mut self, pin: Pin, level: bool) -> Result<(), GpioError> {
        let path = self.pin_path(pin)?.join("value");
        self.write_file(&path, if level { b"1" } else { b"0" })
    }

    fn read(&mut self, pin: Pin) -> Result<bool, GpioError> {
        let path = self.pin_path(pin)?.join("value");
        self.retry.run(|| {
            let mut raw = String::new();
            File::open(&path)?.read_to_string(&mut raw)?;
            match raw.trim() {
                "0" => Ok(false),
                "1" => Ok(true),
                other => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected pin value {other:?}"),
                )),
            }
        })
    }
}
