use std::time::Duration;

use crate::convert::{self, Voltage};
use crate::error::Result;
use crate::gpio::{Gpio, PinPair, SysfsGpio};
use crate::protocol::{Command, Comms};

/// An SHT1x or SHT7x sensor wired to a pair of GPIO lines.
///
/// All reads take `&mut self`: the protocol is a serial waveform on shared
/// lines, so operations cannot overlap. Driving several sensors means one
/// value of this type per pin pair; instances share nothing.
pub struct Sht<G> {
    comms: Comms<G>,
    voltage: Voltage,
}

impl Sht<SysfsGpio> {
    /// Opens the sensor through `/sys/class/gpio`, initializing both lines
    /// to the idle state.
    pub fn open(pins: PinPair, voltage: Voltage) -> Result<Self> {
        Self::new(SysfsGpio::new(), pins, voltage)
    }
}

impl<G: Gpio> Sht<G> {
    /// Like [`Sht::open`], but over any [`Gpio`] implementation.
    pub fn new(gpio: G, pins: PinPair, voltage: Voltage) -> Result<Self> {
        Ok(Self {
            comms: Comms::new(gpio, pins)?,
            voltage,
        })
    }

    /// Bounds the wait for a measurement to finish (default one second).
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.comms.ready_timeout = timeout;
        self
    }

    /// Temperature in degrees Celsius.
    pub fn read_temperature(&mut self) -> Result<f64> {
        let raw = self.comms.measure(Command::MeasureTemperature)?;
        Ok(convert::temperature(raw, self.voltage))
    }

    /// Relative humidity in %RH. The conversion is compensated with the
    /// temperature the reading was taken at, measured first unless the
    /// caller already has it.
    pub fn read_humidity(&mut self, temperature: Option<f64>) -> Result<f64> {
        let t = match temperature {
            Some(t) => t,
            None => self.read_temperature()?,
        };
        let raw = self.comms.measure(Command::MeasureHumidity)?;
        Ok(convert::relative_humidity(raw, t))
    }

    /// Dew point in degrees Celsius. With both values supplied this is a
    /// pure computation and the hardware is left alone. A humidity value
    /// supplied without its temperature is discarded and measured fresh,
    /// because the compensated conversion ties the two together.
    pub fn read_dew_point(
        &mut self,
        temperature: Option<f64>,
        humidity: Option<f64>,
    ) -> Result<f64> {
        let (t, rh) = match (temperature, humidity) {
            (Some(t), Some(rh)) => (t, rh),
            (Some(t), None) => (t, self.read_humidity(Some(t))?),
            (None, _) => {
                let t = self.read_temperature()?;
                (t, self.read_humidity(Some(t))?)
            }
        };
        Ok(convert::dew_point(t, rh))
    }

    /// Resets the sensor interface, recovering from a communication failure
    /// without clearing the status register.
    pub fn reset(&mut self) -> Result<()> {
        self.comms.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::gpio::mock::MockGpio;
    use crate::gpio::Pin;

    const SCK: Pin = 21;
    const DATA: Pin = 17;

    const EPS: f64 = 1e-9;

    fn pins() -> PinPair {
        PinPair::new(SCK, DATA)
    }

    fn byte_levels(byte: u8) -> impl Iterator<Item = bool> {
        (0..8).rev().map(move |bit| byte & (1 << bit) != 0)
    }

    /// Data line levels for one measurement: acknowledge, one busy poll,
    /// data bytes, CRC.
    fn measurement_script(msb: u8, lsb: u8, crc: u8) -> Vec<bool> {
        let mut levels = vec![false, true, true, false];
        levels.extend(byte_levels(msb));
        levels.extend(byte_levels(lsb));
        levels.extend(byte_levels(crc));
        levels
    }

    /// Raw temperature 0x1846 converts to 22.44 degrees at 3.5V.
    fn temperature_script() -> Vec<bool> {
        measurement_script(0x18, 0x46, 0x10)
    }

    /// Raw humidity 1340 converts to 43.97 %RH at 22.44 degrees.
    fn humidity_script() -> Vec<bool> {
        measurement_script(0x05, 0x3c, 0x05)
    }

    #[test]
    fn temperature_read_applies_the_supply_voltage_offset() {
        let mut mock = MockGpio::script(temperature_script());
        let mut sht = Sht::new(&mut mock, pins(), Voltage::V3_5).unwrap();
        let t = sht.read_temperature().unwrap();
        assert!((t - 22.44).abs() < EPS, "t = {t}");
    }

    #[test]
    fn humidity_read_measures_temperature_first_when_not_given() {
        let mut script = temperature_script();
        script.extend(humidity_script());
        let mut mock = MockGpio::script(script);
        {
            let mut sht = Sht::new(&mut mock, pins(), Voltage::V3_5).unwrap();
            let rh = sht.read_humidity(None).unwrap();
            assert!((rh - 43.9662882).abs() < EPS, "rh = {rh}");
        }
        assert!(mock.levels.is_empty(), "script not fully consumed");
    }

    #[test]
    fn humidity_read_reuses_a_known_temperature() {
        let mut mock = MockGpio::script(humidity_script());
        {
            let mut sht = Sht::new(&mut mock, pins(), Voltage::V3_5).unwrap();
            let rh = sht.read_humidity(Some(25.0)).unwrap();
            assert!((rh - 44.2663202).abs() < EPS, "rh = {rh}");
        }
        // one measurement's worth of samples, no temperature read
        assert_eq!(mock.reads.len(), 28);
    }

    #[test]
    fn dew_point_with_both_values_leaves_the_hardware_alone() {
        let mut mock = MockGpio::default();
        {
            let mut sht = Sht::new(&mut mock, pins(), Voltage::V3_5).unwrap();
            let dp = sht.read_dew_point(Some(20.0), Some(50.0)).unwrap();
            assert!((dp - 9.255174598981256).abs() < EPS, "dp = {dp}");
        }
        // only the idle-state setup from construction
        assert_eq!(mock.writes, vec![(SCK, false), (DATA, false)]);
        assert!(mock.reads.is_empty());
    }

    #[test]
    fn dew_point_discards_humidity_supplied_without_temperature() {
        let mut script = temperature_script();
        script.extend(humidity_script());
        let mut mock = MockGpio::script(script);
        let mut sht = Sht::new(&mut mock, pins(), Voltage::V3_5).unwrap();
        // 80 %RH is not tied to any temperature, so both get measured
        let dp = sht.read_dew_point(None, Some(80.0)).unwrap();
        assert!((dp - 9.567639142543829).abs() < EPS, "dp = {dp}");
    }

    #[test]
    fn crc_failures_surface_through_the_facade() {
        let mut mock = MockGpio::script(measurement_script(0x18, 0x46, 0x2a));
        let mut sht = Sht::new(&mut mock, pins(), Voltage::V3_5).unwrap();
        let err = sht.read_temperature().unwrap_err();
        assert!(matches!(err, Error::CrcMismatch { received: 0x2a, .. }));
    }

    #[test]
    fn ready_timeout_is_configurable() {
        let mut mock = MockGpio::script([false, true]);
        mock.idle_level = Some(true); // acknowledge, then never ready
        let timeout = Duration::from_millis(30);
        let mut sht = Sht::new(&mut mock, pins(), Voltage::V3_5)
            .unwrap()
            .with_ready_timeout(timeout);
        let err = sht.read_temperature().unwrap_err();
        assert!(matches!(err, Error::MeasurementTimeout(t) if t == timeout));
    }
}
