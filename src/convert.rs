//! Conversions from raw sensor readouts to physical units.
//!
//! Table references point to the Sensirion SHT7x datasheet V5. All
//! coefficients assume the default measurement resolution, 14-bit
//! temperature and 12-bit humidity.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Temperature scale, degrees Celsius per count (Table 8, 14-bit).
const D2: f64 = 0.01;

/// Humidity linearization coefficients (Table 6, 12-bit).
const C1: f64 = -2.0468;
const C2: f64 = 0.0367;
const C3: f64 = -1.5955e-6;

/// Humidity temperature-compensation coefficients (Table 7, 12-bit).
const T1: f64 = 0.01;
const T2: f64 = 0.00008;

/// Magnus constants for dew point over water and over ice (Table 9).
const TN_WATER: f64 = 243.12;
const M_WATER: f64 = 17.62;
const TN_ICE: f64 = 272.62;
const M_ICE: f64 = 22.46;

/// Sensor supply voltage, as labelled in the datasheet coefficient table.
///
/// The temperature conversion offset depends on it; converting with the
/// wrong label shifts every temperature by up to 0.7 degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Voltage {
    V5,
    V4,
    #[default]
    V3_5,
    V3,
    V2_5,
}

impl Voltage {
    /// Temperature conversion offset d1, degrees Celsius (Table 8).
    pub fn d1(self) -> f64 {
        match self {
            Voltage::V5 => -40.1,
            Voltage::V4 => -39.8,
            Voltage::V3_5 => -39.7,
            Voltage::V3 => -39.6,
            Voltage::V2_5 => -39.4,
        }
    }

    /// The datasheet label, also accepted on the command line.
    pub fn label(self) -> &'static str {
        match self {
            Voltage::V5 => "5V",
            Voltage::V4 => "4V",
            Voltage::V3_5 => "3.5V",
            Voltage::V3 => "3V",
            Voltage::V2_5 => "2.5V",
        }
    }
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Voltage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5V" => Ok(Voltage::V5),
            "4V" => Ok(Voltage::V4),
            "3.5V" => Ok(Voltage::V3_5),
            "3V" => Ok(Voltage::V3),
            "2.5V" => Ok(Voltage::V2_5),
            _ => Err(Error::UnknownVoltage(s.to_string())),
        }
    }
}

/// Temperature in degrees Celsius from a raw 14-bit readout.
pub fn temperature(raw: u16, voltage: Voltage) -> f64 {
    f64::from(raw) * D2 + voltage.d1()
}

/// Relative humidity in %RH from a raw 12-bit readout, compensated with the
/// temperature the measurement was taken at.
pub fn relative_humidity(raw: u16, temperature: f64) -> f64 {
    let raw = f64::from(raw);
    let linear = C1 + C2 * raw + C3 * raw * raw;
    (temperature - 25.0) * (T1 + T2 * raw) + linear
}

/// Dew point in degrees Celsius, using the Magnus formula over water for
/// temperatures at or above freezing and over ice below it.
///
/// `relative_humidity` must be positive; zero or negative values have no
/// logarithm and produce NaN.
pub fn dew_point(temperature: f64, relative_humidity: f64) -> f64 {
    let (tn, m) = if temperature >= 0.0 {
        (TN_WATER, M_WATER)
    } else {
        (TN_ICE, M_ICE)
    };
    let gamma = (relative_humidity / 100.0).ln() + m * temperature / (tn + temperature);
    tn * gamma / (m - gamma)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn temperature_scales_with_supply_voltage() {
        assert!((temperature(0x1846, Voltage::V3_5) - 22.44).abs() < EPS);
        assert!((temperature(6400, Voltage::V5) - 23.9).abs() < EPS);
        assert!((temperature(6400, Voltage::V2_5) - 24.6).abs() < EPS);
        for raw in [0, 1000, 6400, u16::MAX] {
            let shift = temperature(raw, Voltage::V2_5) - temperature(raw, Voltage::V5);
            assert!((shift - 0.7).abs() < EPS);
        }
    }

    #[test]
    fn temperature_rises_with_the_raw_count() {
        for raw in [0u16, 1, 3999, 6213, 30000] {
            assert!(temperature(raw + 1, Voltage::V3_5) > temperature(raw, Voltage::V3_5));
        }
    }

    #[test]
    fn humidity_compensation_pivots_at_25_degrees() {
        assert!((relative_humidity(1340, 25.0) - 44.2663202).abs() < EPS);
        assert!((relative_humidity(1340, 30.0) - 44.8523202).abs() < EPS);
        assert!((relative_humidity(1340, 22.44) - 43.9662882).abs() < EPS);
        // warmer air at the same count reads as higher humidity
        assert!(relative_humidity(1340, 30.0) > relative_humidity(1340, 20.0));
    }

    #[test]
    fn dew_point_reference_values() {
        let dp = dew_point(20.0, 50.0);
        assert!((dp - 9.255174598981256).abs() < EPS);
        // physical sanity: well below the air temperature
        assert!(dp > 5.0 && dp < 12.0);
        assert!(dew_point(20.0, 80.0) > dew_point(20.0, 40.0));
    }

    #[test]
    fn dew_point_switches_to_ice_constants_below_freezing() {
        assert!((dew_point(0.0, 60.0) + 6.849766702692025).abs() < EPS);
        assert!((dew_point(-0.1, 60.0) + 6.158130978581484).abs() < EPS);
    }

    #[test]
    fn dew_point_is_nan_without_humidity() {
        assert!(dew_point(20.0, 0.0).is_nan());
    }

    #[test]
    fn voltage_labels_round_trip() {
        for voltage in [
            Voltage::V5,
            Voltage::V4,
            Voltage::V3_5,
            Voltage::V3,
            Voltage::V2_5,
        ] {
            assert_eq!(voltage.label().parse::<Voltage>().unwrap(), voltage);
        }
        assert_eq!(Voltage::default(), Voltage::V3_5);
    }

    #[test]
    fn voltage_rejects_unknown_labels() {
        match "3.3V".parse::<Voltage>().unwrap_err() {
            Error::UnknownVoltage(label) => assert_eq!(label, "3.3V"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
