//! This module contains automated testcases that require a physically wired
//! sensor so they're not run by default. Wire the sensor up, then point the
//! tests at its pins:
//! `SHT_SCK=21 SHT_DATA=17 cargo test --features hw-tests`

use serial_test::serial;

use crate::{PinPair, Sht, SysfsGpio, Voltage};

fn pin_from_env(name: &str) -> u16 {
    std::env::var(name)
        .unwrap_or_else(|_| panic!("{name} not set"))
        .parse()
        .unwrap_or_else(|_| panic!("{name} is not a pin number"))
}

fn open_from_env() -> Sht<SysfsGpio> {
    let pins = PinPair::new(pin_from_env("SHT_SCK"), pin_from_env("SHT_DATA"));
    Sht::open(pins, Voltage::default()).unwrap()
}

#[test]
#[serial]
fn test_read_temperature() {
    let mut sht = open_from_env();
    let t = sht.read_temperature().unwrap();
    assert!((-40.0..=120.0).contains(&t), "t = {t}");
}

#[test]
#[serial]
fn test_read_humidity_and_dew_point() {
    let mut sht = open_from_env();
    let t = sht.read_temperature().unwrap();
    let rh = sht.read_humidity(Some(t)).unwrap();
    assert!((0.0..=100.0).contains(&rh), "rh = {rh}");
    let dp = sht.read_dew_point(Some(t), Some(rh)).unwrap();
    assert!(dp <= t, "dew point {dp} above temperature {t}");
}

#[test]
#[serial]
fn test_reset_then_read() {
    let mut sht = open_from_env();
    sht.reset().unwrap();
    sht.read_temperature().unwrap();
}
