use anyhow::{Context, Result};
use clap::Parser;

use sht_sensor::{PinPair, Sht, Voltage};

/// Read an SHT1x/SHT7x-type sensor wired to two GPIO pins.
#[derive(Parser)]
#[command(name = "sht", version, about)]
struct Args {
    /// Clock (SCK) pin number, in the kernel sysfs numbering scheme.
    pin_sck: u16,

    /// Data pin number, in the kernel sysfs numbering scheme.
    pin_data: u16,

    /// Sensor supply voltage, exactly as labelled in the datasheet
    /// coefficient table. Slightly affects the temperature conversion.
    #[arg(long, default_value_t = Voltage::default())]
    voltage: Voltage,

    /// Read the temperature, in degrees Celsius. The default when no other
    /// value is requested.
    #[arg(short = 't', long)]
    temperature: bool,

    /// Read the relative humidity, in %RH.
    #[arg(short = 'r', long)]
    rel_humidity: bool,

    /// Read the dew point, in degrees Celsius.
    #[arg(short = 'd', long)]
    dew_point: bool,

    /// Print a label in front of each value.
    #[arg(short, long)]
    verbose: bool,

    /// Log the low-level pin traffic.
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let mut args = Args::parse();
    env_logger::Builder::new()
        .filter_level(if args.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();
    if !(args.temperature || args.rel_humidity || args.dew_point) {
        args.temperature = true;
    }

    let pins = PinPair::new(args.pin_sck, args.pin_data);
    let mut sht = Sht::open(pins, args.voltage)
        .with_context(|| format!("failed to open the sensor on pins {pins:?}"))?;

    // read everything before printing anything, so a failure half-way
    // through cannot leave a partial result on stdout
    let mut t = None;
    let mut rh = None;
    let mut dp = None;
    if args.temperature {
        t = Some(sht.read_temperature()?);
    }
    if args.rel_humidity {
        rh = Some(sht.read_humidity(t)?);
    }
    if args.dew_point {
        dp = Some(sht.read_dew_point(t, rh)?);
    }

    for (label, value) in [("temperature", t), ("humidity", rh), ("dew point", dp)] {
        if let Some(value) = value {
            if args.verbose {
                println!("{label}: {value}");
            } else {
                println!("{value}");
            }
        }
    }
    Ok(())
}
