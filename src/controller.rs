//! Command sequencing for the mikroProg power supply.

use crate::{
    calibration_level,
    usb::{Transport, ENDPOINT_IN, ENDPOINT_OUT, INTERFACE, TIMEOUT},
    Command, Error, Result, Voltage,
};
use std::time::Duration;

/// Drives the power supply of a mikroProg.
///
/// The controller claims the command interface when created and releases
/// it when dropped, so frames are only ever sent while the interface is
/// claimed. Dropping the transport afterwards closes the device.
pub struct VoltageController<T: Transport> {
    /// The underlying USB connection to the programmer.
    transport: T,
    /// The timeout applied to every bulk transfer.
    timeout: Duration,
    /// The last output state the device acknowledged.
    output: Option<Voltage>,
}

impl<T: Transport> VoltageController<T> {
    /// Claims the command interface of the given transport.
    pub fn new(mut transport: T) -> Result<Self> {
        transport.claim(INTERFACE).map_err(Error::ClaimInterface)?;

        Ok(VoltageController {
            transport,
            timeout: TIMEOUT,
            output: None,
        })
    }

    /// Replaces the timeout applied to every bulk transfer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the last output state the device acknowledged.
    pub fn output(&self) -> Option<Voltage> {
        self.output
    }

    /// Switches the output off.
    pub fn power_off(&mut self) -> Result<()> {
        self.transfer(Command::Stop)?;
        self.output = Some(Voltage::Off);
        Ok(())
    }

    /// Sets the output to `volts`, or switches it off for `0`.
    ///
    /// Nothing is sent to the device if `volts` is out of range. A failed
    /// transfer aborts the sequence, so `START` is never sent after the
    /// device rejected the new level.
    pub fn set_voltage(&mut self, volts: f32) -> Result<Voltage> {
        let voltage = Voltage::new(volts)?;

        match voltage {
            Voltage::Off => self.power_off()?,
            Voltage::On(volts) => {
                self.transfer(Command::SetVoltage(calibration_level(volts)))?;
                self.transfer(Command::Start)?;
                self.output = Some(voltage);
            }
        }

        Ok(voltage)
    }

    /// Writes a command frame and checks the acknowledgment byte.
    fn transfer(&mut self, command: Command) -> Result<()> {
        let frame = command.encode();

        let written = self
            .transport
            .write(ENDPOINT_OUT, &frame, self.timeout)
            .map_err(|err| Error::ShortWrite {
                written: 0,
                source: Some(err),
            })?;
        if written < frame.len() {
            return Err(Error::ShortWrite {
                written,
                source: None,
            });
        }

        let mut ack = [0xff; 1];
        let read = self
            .transport
            .read(ENDPOINT_IN, &mut ack, self.timeout)
            .map_err(|err| Error::BadAck {
                stage: command.stage(),
                ack: None,
                source: Some(err),
            })?;
        if read != 1 || ack[0] != 0 {
            return Err(Error::BadAck {
                stage: command.stage(),
                ack: if read == 1 { Some(ack[0]) } else { None },
                source: None,
            });
        }

        Ok(())
    }
}

impl<T: Transport> Drop for VoltageController<T> {
    fn drop(&mut self) {
        // Nothing useful can be done if the device is already gone.
        let _ = self.transport.release(INTERFACE);
    }
}
