//! Wire protocol of the SHT1x serial interface.
//!
//! The sensor speaks a proprietary two-wire protocol. The controller owns
//! the clock line outright and shares the data line with the sensor,
//! switching it between output (command bits, acknowledges) and input
//! (sensor bits). Bits travel MSB first, and every measurement is covered
//! by a CRC8 that the sensor shifts out in reversed bit order.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::gpio::{Direction, Gpio, PinPair};

/// Measurement commands. The three address bits above them are always zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    MeasureTemperature = 0b0000_0011,
    MeasureHumidity = 0b0000_0101,
}

impl Command {
    fn byte(self) -> u8 {
        self as u8
    }
}

/// Settle pause after a clock edge. Sysfs write latency alone usually
/// exceeds this by orders of magnitude.
const SCK_SETTLE: Duration = Duration::from_nanos(100);

/// Poll interval while waiting for measurement-ready.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default bound on the ready wait. The longest (14-bit) conversion takes
/// up to ~320 ms, so one second leaves plenty of headroom.
pub(crate) const READY_TIMEOUT: Duration = Duration::from_secs(1);

/// Protocol engine: owns the pin pair and tracks the data line direction so
/// the expensive sysfs direction writes only happen on actual changes.
pub(crate) struct Comms<G> {
    gpio: G,
    pins: PinPair,
    data_dir: Direction,
    pub(crate) ready_timeout: Duration,
}

impl<G: Gpio> Comms<G> {
    /// Drives both lines to output low, the sensor's idle state.
    pub(crate) fn new(gpio: G, pins: PinPair) -> Result<Self> {
        let mut comms = Self {
            gpio,
            pins,
            data_dir: Direction::Out,
            ready_timeout: READY_TIMEOUT,
        };
        for pin in [pins.sck, pins.data] {
            comms.gpio.set_direction(pin, Direction::Out)?;
            comms.gpio.write(pin, false)?;
        }
        Ok(comms)
    }

    /// Runs one full measurement: command, ready wait, two data bytes, CRC
    /// check. A humidity measurement ends with the cleanup sequence that
    /// puts the lines back into the idle state.
    pub(crate) fn measure(&mut self, cmd: Command) -> Result<u16> {
        self.send_command(cmd)?;
        self.wait_ready(self.ready_timeout)?;
        let msb = self.read_bits(8)? as u8;
        self.send_ack()?;
        let lsb = self.read_bits(8)? as u8;
        let computed = crc8(cmd.byte(), msb, lsb);
        let received = self.read_crc()?;
        if computed != received {
            return Err(Error::CrcMismatch { computed, received });
        }
        if cmd == Command::MeasureHumidity {
            self.cleanup()?;
        }
        Ok(u16::from(msb) << 8 | u16::from(lsb))
    }

    /// Connection reset: data held high through nine clock pulses, followed
    /// by a transmission start. Clears a half-clocked command after a
    /// communication failure without touching the status register.
    pub(crate) fn reset(&mut self) -> Result<()> {
        self.data_set(true)?;
        for _ in 0..9 {
            self.tick(true)?;
            self.tick(false)?;
        }
        self.transmission_start()
    }

    /// Transmission start: data dips low while the clock is high, then
    /// returns high, leaving the clock low for the first command bit.
    fn transmission_start(&mut self) -> Result<()> {
        self.tick(false)?;
        self.data_set(true)?;
        self.tick(true)?;
        self.data_set(false)?;
        self.tick(false)?;
        self.tick(true)?;
        self.data_set(true)?;
        self.tick(false)
    }

    /// Clocks out a command byte MSB first and verifies both acknowledge
    /// checkpoints: the sensor pulls data low while the ninth clock is high
    /// and releases it after the falling edge.
    fn send_command(&mut self, cmd: Command) -> Result<()> {
        self.transmission_start()?;
        let byte = cmd.byte();
        for bit in (0..8).rev() {
            self.data_set(byte & (1 << bit) != 0)?;
            self.tick(true)?;
            self.tick(false)?;
        }
        self.tick(true)?;
        if self.data_get()? {
            return Err(Error::NoAck { step: 1 });
        }
        self.tick(false)?;
        if !self.data_get()? {
            return Err(Error::NoAck { step: 2 });
        }
        Ok(())
    }

    /// Polls for the sensor pulling data low once the measurement is done.
    /// Samples at least once; on timeout the data line stays in input mode.
    fn wait_ready(&mut self, timeout: Duration) -> Result<()> {
        self.set_data_dir(Direction::In)?;
        let deadline = Instant::now() + timeout;
        loop {
            thread::sleep(READY_POLL_INTERVAL);
            if !self.gpio.read(self.pins.data)? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::MeasurementTimeout(timeout));
            }
        }
    }

    /// Clocks in `count` bits with the data line in input mode, sampling
    /// while the clock is high, MSB first.
    fn read_bits(&mut self, count: u32) -> Result<u16> {
        self.set_data_dir(Direction::In)?;
        let mut value = 0u16;
        for _ in 0..count {
            self.tick(true)?;
            value = value << 1 | u16::from(self.gpio.read(self.pins.data)?);
            self.tick(false)?;
        }
        Ok(value)
    }

    /// Acknowledges the previous byte, telling the sensor to keep shifting:
    /// data pulled low through one clock pulse.
    fn send_ack(&mut self) -> Result<()> {
        self.data_set(true)?;
        self.data_set(false)?;
        self.tick(true)?;
        self.tick(false)
    }

    fn read_crc(&mut self) -> Result<u8> {
        self.send_ack()?;
        Ok(self.read_bits(8)? as u8)
    }

    /// Back to the idle state after a measurement. Only the data line may
    /// need a direction switch; the clock line never left output mode.
    fn cleanup(&mut self) -> Result<()> {
        self.gpio.write(self.pins.sck, false)?;
        self.data_set(false)
    }

    /// Switches the data line only when the direction actually changes.
    fn set_data_dir(&mut self, direction: Direction) -> Result<()> {
        if self.data_dir != direction {
            self.gpio.set_direction(self.pins.data, direction)?;
            self.data_dir = direction;
        }
        Ok(())
    }

    fn data_set(&mut self, level: bool) -> Result<()> {
        self.set_data_dir(Direction::Out)?;
        Ok(self.gpio.write(self.pins.data, level)?)
    }

    fn data_get(&mut self) -> Result<bool> {
        self.set_data_dir(Direction::In)?;
        Ok(self.gpio.read(self.pins.data)?)
    }

    fn tick(&mut self, level: bool) -> Result<()> {
        self.gpio.write(self.pins.sck, level)?;
        thread::sleep(SCK_SETTLE);
        Ok(())
    }
}

/// CRC8 over the command byte and both measurement bytes. The table folds
/// in the default all-zero status register as the initial value; the result
/// is bit-reversed because the sensor shifts its CRC register out LSB first.
pub(crate) fn crc8(cmd: u8, msb: u8, lsb: u8) -> u8 {
    let mut crc = CRC_TABLE[cmd as usize];
    crc = CRC_TABLE[(crc ^ msb) as usize];
    crc = CRC_TABLE[(crc ^ lsb) as usize];
    reverse_byte(crc)
}

/// Constant-time byte reversal, the multiply/mask/modulo identity from the
/// Stanford bit-twiddling collection.
fn reverse_byte(byte: u8) -> u8 {
    ((u64::from(byte) * 0x0202020202 & 0x010884422010) % 1023) as u8
}

/// Lookup table for the sensor's CRC polynomial x^8 + x^5 + x^4 + 1.
const CRC_TABLE: [u8; 256] = [
    0x00, 0x31, 0x62, 0x53, 0xc4, 0xf5, 0xa6, 0x97,
    0xb9, 0x88, 0xdb, 0xea, 0x7d, 0x4c, 0x1f, 0x2e,
    0x43, 0x72, 0x21, 0x10, 0x87, 0xb6, 0xe5, 0xd4,
    0xfa, 0xcb, 0x98, 0xa9, 0x3e, 0x0f, 0x5c, 0x6d,
    0x86, 0xb7, 0xe4, 0xd5, 0x42, 0x73, 0x20, 0x11,
    0x3f, 0x0e, 0x5d, 0x6c, 0xfb, 0xca, 0x99, 0xa8,
    0xc5, 0xf4, 0xa7, 0x96, 0x01, 0x30, 0x63, 0x52,
    0x7c, 0x4d, 0x1e, 0x2f, 0xb8, 0x89, 0xda, 0xeb,
    0x3d, 0x0c, 0x5f, 0x6e, 0xf9, 0xc8, 0x9b, 0xaa,
    0x84, 0xb5, 0xe6, 0xd7, 0x40, 0x71, 0x22, 0x13,
    0x7e, 0x4f, 0x1c, 0x2d, 0xba, 0x8b, 0xd8, 0xe9,
    0xc7, 0xf6, 0xa5, 0x94, 0x03, 0x32, 0x61, 0x50,
    0xbb, 0x8a, 0xd9, 0xe8, 0x7f, 0x4e, 0x1d, 0x2c,
    0x02, 0x33, 0x60, 0x51, 0xc6, 0xf7, 0xa4, 0x95,
    0xf8, 0xc9, 0x9a, 0xab, 0x3c, 0x0d, 0x5e, 0x6f,
    0x41, 0x70, 0x23, 0x12, 0x85, 0xb4, 0xe7, 0xd6,
    0x7a, 0x4b, 0x18, 0x29, 0xbe, 0x8f, 0xdc, 0xed,
    0xc3, 0xf2, 0xa1, 0x90, 0x07, 0x36, 0x65, 0x54,
    0x39, 0x08, 0x5b, 0x6a, 0xfd, 0xcc, 0x9f, 0xae,
    0x80, 0xb1, 0xe2, 0xd3, 0x44, 0x75, 0x26, 0x17,
    0xfc, 0xcd, 0x9e, 0xaf, 0x38, 0x09, 0x5a, 0x6b,
    0x45, 0x74, 0x27, 0x16, 0x81, 0xb0, 0xe3, 0xd2,
    0xbf, 0x8e, 0xdd, 0xec, 0x7b, 0x4a, 0x19, 0x28,
    0x06, 0x37, 0x64, 0x55, 0xc2, 0xf3, 0xa0, 0x91,
    0x47, 0x76, 0x25, 0x14, 0x83, 0xb2, 0xe1, 0xd0,
    0xfe, 0xcf, 0x9c, 0xad, 0x3a, 0x0b, 0x58, 0x69,
    0x04, 0x35, 0x66, 0x57, 0xc0, 0xf1, 0xa2, 0x93,
    0xbd, 0x8c, 0xdf, 0xee, 0x79, 0x48, 0x1b, 0x2a,
    0xc1, 0xf0, 0xa3, 0x92, 0x05, 0x34, 0x67, 0x56,
    0x78, 0x49, 0x1a, 0x2b, 0xbc, 0x8d, 0xde, 0xef,
    0x82, 0xb3, 0xe0, 0xd1, 0x46, 0x77, 0x24, 0x15,
    0x3b, 0x0a, 0x59, 0x68, 0xff, 0xce, 0x9d, 0xac,
];
