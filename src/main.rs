#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]

mod macros;

use setvolt::{
    usb::{self, TIMEOUT},
    Error, Voltage, VoltageController,
};
use argh::FromArgs;
use std::{path::Path, thread, time::Duration};

/// Power your board from a MikroElektronika mikroProg programmer.
#[derive(FromArgs)]
struct Arguments {
    /// wait until a mikroProg is available.
    #[argh(switch, short = 'w')]
    wait: bool,

    /// print progress messages.
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// override the mikroProg vendor ID.
    #[argh(option, short = 'V')]
    vendor_id: Option<u16>,
    /// override the mikroProg product ID.
    #[argh(option, short = 'P')]
    product_id: Option<u16>,

    /// timeout of a single USB transfer in milliseconds.
    #[argh(option, short = 't')]
    timeout: Option<u64>,

    /// output voltage: 0 to switch power off, or 1.8 to 5.
    #[argh(positional)]
    voltage: Option<f32>,
}

fn main() {
    let strings: Vec<String> = std::env::args().collect();
    let cmd = strings
        .first()
        .and_then(|path| Path::new(path).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or(env!("CARGO_PKG_NAME"));
    let rest: Vec<&str> = strings.iter().skip(1).map(String::as_str).collect();

    let args = match parse_arguments(cmd, &rest) {
        Ok(args) => args,
        Err(exit) => match exit.status {
            Ok(()) => {
                println!("{}", exit.output);
                std::process::exit(0);
            }
            Err(()) => {
                eprintln!(
                    "{}\nRun {} --help for more information.",
                    exit.output, cmd
                );
                std::process::exit(1);
            }
        },
    };

    match run(args) {
        Ok(voltage) => println!("{}", voltage),
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(err.exit_code());
        }
    }
}

/// Parses the command line, treating negative numbers as the voltage
/// rather than as flags.
fn parse_arguments(cmd: &str, args: &[&str]) -> Result<Arguments, argh::EarlyExit> {
    let mut args = args.to_vec();
    let end_of_options = args.iter().position(|arg| *arg == "--");
    let negative = args
        .iter()
        .position(|arg| arg.len() > 1 && arg.starts_with('-') && arg.parse::<f32>().is_ok());
    if let Some(index) = negative {
        if end_of_options.map_or(true, |end| index < end) {
            args.insert(index, "--");
        }
    }
    Arguments::from_args(&[cmd], &args)
}

fn run(args: Arguments) -> Result<Voltage, Error> {
    let volts = match args.voltage {
        Some(volts) => volts,
        None => return Err(Error::Usage(program_name())),
    };
    // Reject bad input before touching libusb.
    Voltage::new(volts)?;

    let timeout = match args.timeout {
        Some(millis) => usb::transfer_timeout(millis)?,
        None => TIMEOUT,
    };
    let verbose = args.verbose;

    let context = usb::init()?;
    if verbose {
        info!("Searching", "for a mikroProg...");
    }
    let handle = if args.wait {
        loop {
            match usb::open_device(&context, args.vendor_id, args.product_id) {
                Ok(handle) => break handle,
                Err(rusb::Error::NoDevice) => thread::sleep(Duration::from_millis(500)),
                Err(_) => return Err(Error::DeviceNotFound),
            }
        }
    } else {
        usb::open_device(&context, args.vendor_id, args.product_id)
            .map_err(|_| Error::DeviceNotFound)?
    };
    if verbose {
        let device = handle.device();
        ok!(
            "Found",
            "mikroProg on bus {} address {}",
            device.bus_number(),
            device.address()
        );
    }

    let mut controller = VoltageController::new(handle)?.with_timeout(timeout);
    if verbose {
        info!("Switching", "output to {} V...", volts);
    }
    controller.set_voltage(volts)
}

fn program_name() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Arguments {
        match parse_arguments("setvolt", args) {
            Ok(args) => args,
            Err(exit) => panic!("{:?} was rejected: {}", args, exit.output),
        }
    }

    fn voltage_of(args: &[&str]) -> Result<Voltage, Error> {
        Voltage::new(parse(args).voltage.expect("no voltage"))
    }

    #[test]
    fn test_parses_voltage() {
        assert_eq!(voltage_of(&["0"]).unwrap(), Voltage::Off);
        assert_eq!(voltage_of(&["3.3"]).unwrap(), Voltage::On(3.3));
        assert_eq!(voltage_of(&["-v", "-t", "500", "5"]).unwrap(), Voltage::On(5.0));
    }

    #[test]
    fn test_negative_zero_powers_off() {
        assert_eq!(voltage_of(&["-0"]).unwrap(), Voltage::Off);
        assert_eq!(voltage_of(&["-w", "-0.0"]).unwrap(), Voltage::Off);
    }

    #[test]
    fn test_negative_voltage_is_invalid() {
        for args in &[&["-1"][..], &["-3.3"][..], &["-v", "-1"][..], &["--", "-1"][..]] {
            match voltage_of(args) {
                Err(Error::InvalidVoltage(_)) => {}
                other => panic!("{:?} was accepted: {:?}", args, other),
            }
        }
    }

    #[test]
    fn test_flags_still_parse() {
        let args = parse(&["-w", "-V", "15898", "3.3"]);
        assert!(args.wait);
        assert_eq!(args.vendor_id, Some(0x3e1a));
        assert!(parse_arguments("setvolt", &["-x", "3.3"]).is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let args = parse(&["-t", "0", "3.3"]);
        match run(args) {
            Err(Error::InvalidTimeout(0)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_voltage_is_usage_error() {
        let args = parse(&[]);
        match run(args) {
            Err(Error::Usage(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
