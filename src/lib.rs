//! `setvolt` powers a target board from a MikroElektronika mikroProg
//! programmer by configuring the programmer's output voltage over USB.
//!
//! The protocol consists of three fixed 3-byte command frames sent to
//! bulk endpoint 2:
//! 1. `STOP` (`01 20 02`) switches the output off.
//! 2. `SET_VOLTAGE` (`01 10 <level>`) selects the output level, where the
//! level is the calibration byte computed by [`calibration_level`].
//! 3. `START` (`01 20 01`) switches the output on.
//!
//! The device answers every frame with a single acknowledgment byte, which
//! must be `0`.

pub use bytes;
use bytes::{BufMut, Bytes, BytesMut};
pub use rusb;
use std::fmt;

pub mod controller;
pub mod error;
pub mod usb;

pub use controller::VoltageController;
pub use error::{Error, Result, Stage};

/// Lowest non-zero voltage the programmer can supply.
pub const MIN_VOLTS: f32 = 1.8;
/// Highest voltage the programmer can supply.
pub const MAX_VOLTS: f32 = 5.0;

// Calibration byte sent for `MIN_VOLTS`.
const CALIBRATION_BASE: u8 = 58;
// Calibration steps per volt above `MIN_VOLTS`.
const CALIBRATION_STEP: f32 = 52.9;

const CATEGORY_POWER: u8 = 0x01;
const SUBCOMMAND_VOLTAGE: u8 = 0x10;
const SUBCOMMAND_SWITCH: u8 = 0x20;
const SWITCH_START: u8 = 0x01;
const SWITCH_STOP: u8 = 0x02;

/// A validated output voltage request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Voltage {
    /// The output is switched off.
    Off,
    /// The output is switched on at the given level in volts.
    On(f32),
}

impl Voltage {
    /// Validates a voltage request.
    ///
    /// Accepts `0` to switch the output off, or any value in
    /// [`MIN_VOLTS`]`..=`[`MAX_VOLTS`].
    pub fn new(volts: f32) -> Result<Self> {
        if volts == 0.0 {
            Ok(Voltage::Off)
        } else if (MIN_VOLTS..=MAX_VOLTS).contains(&volts) {
            Ok(Voltage::On(volts))
        } else {
            Err(Error::InvalidVoltage(volts))
        }
    }

    /// Returns the requested level in volts, `0.0` when off.
    pub fn volts(self) -> f32 {
        match self {
            Voltage::Off => 0.0,
            Voltage::On(volts) => volts,
        }
    }
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Voltage::Off => f.write_str("Power off"),
            Voltage::On(volts) => write!(f, "Power was set to {:.1} Volt", volts),
        }
    }
}

/// Computes the calibration byte for a voltage in
/// [`MIN_VOLTS`]`..=`[`MAX_VOLTS`].
///
/// The scaled offset is truncated, not rounded, which is what the
/// programmer's firmware expects. Values outside the range saturate at
/// `58` and `255`.
pub fn calibration_level(volts: f32) -> u8 {
    CALIBRATION_BASE.saturating_add(((volts - MIN_VOLTS) * CALIBRATION_STEP) as u8)
}

/// A command frame understood by the mikroProg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch the output off.
    Stop,
    /// Select the output level, given as a calibration byte.
    SetVoltage(u8),
    /// Switch the output on.
    Start,
}

impl Command {
    /// Length of every encoded frame.
    pub const LEN: usize = 3;

    /// Encodes the command into its wire frame.
    pub fn encode(self) -> Bytes {
        let mut frame = BytesMut::with_capacity(Self::LEN);
        frame.put_u8(CATEGORY_POWER);
        match self {
            Command::Stop => {
                frame.put_u8(SUBCOMMAND_SWITCH);
                frame.put_u8(SWITCH_STOP);
            }
            Command::SetVoltage(level) => {
                frame.put_u8(SUBCOMMAND_VOLTAGE);
                frame.put_u8(level);
            }
            Command::Start => {
                frame.put_u8(SUBCOMMAND_SWITCH);
                frame.put_u8(SWITCH_START);
            }
        }
        frame.freeze()
    }

    /// The stage reported when this command is not acknowledged.
    pub fn stage(self) -> Stage {
        match self {
            Command::Stop => Stage::PowerOff,
            Command::SetVoltage(_) => Stage::SetVoltage,
            Command::Start => Stage::PowerOn,
        }
    }
}
