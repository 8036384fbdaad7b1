use std::fmt;
use thiserror::Error;

/// Result type used throughout `setvolt`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// `EIO`, returned when no programmer could be opened.
const EXIT_NO_DEVICE: i32 = 5;

/// The step of a command sequence that was not acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PowerOff,
    SetVoltage,
    PowerOn,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::PowerOff => "deactivating power",
            Stage::SetVoltage => "setting voltage",
            Stage::PowerOn => "activating power",
        })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Usage: {0} <0|1.8-5>")]
    Usage(String),
    #[error("Invalid voltage level. Must be between 1.8v and 5v")]
    InvalidVoltage(f32),
    #[error("Invalid timeout {0}. Must be between 1ms and 4294967295ms")]
    InvalidTimeout(u64),
    #[error("failed to initialise libusb")]
    ContextInit(#[source] rusb::Error),
    #[error("Could not find/open Mikroelektronika mikroProg device")]
    DeviceNotFound,
    #[error("usb_claim_interface error {}\nDo you have sufficient rights?", libusb_code(.0))]
    ClaimInterface(#[source] rusb::Error),
    /// The device accepted fewer bytes than the frame holds.
    ///
    /// A transport failure leaves `written` at zero and is kept as the source.
    #[error("Error writing data to usb device")]
    ShortWrite {
        written: usize,
        source: Option<rusb::Error>,
    },
    /// The device did not answer with a single `0` byte.
    ///
    /// Covers both a negative acknowledgment and a failed read.
    #[error("Error {stage}: Did not receive 'ok' signal from mikroProg")]
    BadAck {
        stage: Stage,
        ack: Option<u8>,
        source: Option<rusb::Error>,
    },
}

impl Error {
    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_)
            | Error::InvalidVoltage(_)
            | Error::InvalidTimeout(_)
            | Error::ContextInit(_) => 1,
            Error::DeviceNotFound => EXIT_NO_DEVICE,
            Error::ClaimInterface(err) => -libusb_code(err),
            Error::ShortWrite {
                source: Some(err), ..
            }
            | Error::BadAck {
                source: Some(err), ..
            } => -libusb_code(err),
            Error::ShortWrite { source: None, .. } | Error::BadAck { source: None, .. } => 1,
        }
    }
}

/// Maps an `rusb` error back to the libusb return code it was created from.
#[allow(unreachable_patterns)]
pub(crate) fn libusb_code(err: &rusb::Error) -> i32 {
    match err {
        rusb::Error::Io => -1,
        rusb::Error::InvalidParam => -2,
        rusb::Error::Access => -3,
        rusb::Error::NoDevice => -4,
        rusb::Error::NotFound => -5,
        rusb::Error::Busy => -6,
        rusb::Error::Timeout => -7,
        rusb::Error::Overflow => -8,
        rusb::Error::Pipe => -9,
        rusb::Error::Interrupted => -10,
        rusb::Error::NoMem => -11,
        rusb::Error::NotSupported => -12,
        _ => -99,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_exit_with_one() {
        assert_eq!(Error::Usage("setvolt".into()).exit_code(), 1);
        assert_eq!(Error::InvalidVoltage(7.0).exit_code(), 1);
        assert_eq!(Error::InvalidTimeout(0).exit_code(), 1);
        assert_eq!(Error::ContextInit(rusb::Error::Other).exit_code(), 1);
    }

    #[test]
    fn test_usb_errors_exit_with_libusb_code() {
        assert_eq!(Error::DeviceNotFound.exit_code(), 5);
        assert_eq!(Error::ClaimInterface(rusb::Error::Access).exit_code(), 3);
        assert_eq!(Error::ClaimInterface(rusb::Error::Busy).exit_code(), 6);

        let err = Error::ShortWrite {
            written: 0,
            source: Some(rusb::Error::Timeout),
        };
        assert_eq!(err.exit_code(), 7);

        let err = Error::BadAck {
            stage: Stage::PowerOn,
            ack: None,
            source: Some(rusb::Error::Pipe),
        };
        assert_eq!(err.exit_code(), 9);
    }

    #[test]
    fn test_protocol_failures_exit_with_one() {
        let err = Error::ShortWrite {
            written: 2,
            source: None,
        };
        assert_eq!(err.exit_code(), 1);

        let err = Error::BadAck {
            stage: Stage::SetVoltage,
            ack: Some(1),
            source: None,
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::Usage("setvolt".into()).to_string(),
            "Usage: setvolt <0|1.8-5>"
        );
        assert_eq!(
            Error::ClaimInterface(rusb::Error::Access).to_string(),
            "usb_claim_interface error -3\nDo you have sufficient rights?"
        );
        let stages = [
            (Stage::PowerOff, "deactivating power"),
            (Stage::SetVoltage, "setting voltage"),
            (Stage::PowerOn, "activating power"),
        ];
        for &(stage, what) in &stages {
            let err = Error::BadAck {
                stage,
                ack: Some(0xff),
                source: None,
            };
            assert_eq!(
                err.to_string(),
                format!("Error {}: Did not receive 'ok' signal from mikroProg", what)
            );
        }
    }
}
