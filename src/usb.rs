//! USB primitives for talking to a mikroProg.

use crate::{Error, Result};
use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;

/// Default mikroProg Vendor ID.
pub const VENDOR_ID: u16 = 0x3e1a;
/// Default mikroProg Product ID.
pub const PRODUCT_ID: u16 = 0x0200;

/// The interface carrying the command endpoints.
pub const INTERFACE: u8 = 0;
/// Bulk endpoint 2, host to device.
pub const ENDPOINT_OUT: u8 = 0x02;
/// Bulk endpoint 2, device to host.
pub const ENDPOINT_IN: u8 = 0x82;

/// Default timeout of a single bulk transfer.
pub const TIMEOUT: Duration = Duration::from_millis(1000);

/// The operations the voltage protocol needs from a USB connection.
pub trait Transport {
    /// Claims the given interface.
    fn claim(&mut self, interface: u8) -> rusb::Result<()>;

    /// Releases a previously claimed interface.
    fn release(&mut self, interface: u8) -> rusb::Result<()>;

    /// Performs a bulk write, returning the number of bytes written.
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize>;

    /// Performs a bulk read, returning the number of bytes read.
    fn read(
        &mut self,
        endpoint: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;
}

impl<T: UsbContext> Transport for DeviceHandle<T> {
    fn claim(&mut self, interface: u8) -> rusb::Result<()> {
        self.claim_interface(interface)
    }

    fn release(&mut self, interface: u8) -> rusb::Result<()> {
        self.release_interface(interface)
    }

    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.write_bulk(endpoint, data, timeout)
    }

    fn read(
        &mut self,
        endpoint: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.read_bulk(endpoint, buffer, timeout)
    }
}

/// Converts a timeout given in milliseconds into a transfer timeout.
///
/// libusb treats a zero timeout as unlimited and only accepts 32-bit
/// values, so both are rejected.
pub fn transfer_timeout(millis: u64) -> Result<Duration> {
    if millis == 0 || millis > u64::from(u32::MAX) {
        return Err(Error::InvalidTimeout(millis));
    }
    Ok(Duration::from_millis(millis))
}

/// Initialises a libusb context.
///
/// libusb is torn down once the context and every handle opened from it
/// are dropped.
pub fn init() -> Result<Context> {
    Context::new().map_err(Error::ContextInit)
}

/// Attempts to find a mikroProg with the given IDs and opens a handle to it.
pub fn open_device<T: UsbContext>(
    context: &T,
    vid: Option<u16>,
    pid: Option<u16>,
) -> rusb::Result<DeviceHandle<T>> {
    let vid = vid.unwrap_or(VENDOR_ID);
    let pid = pid.unwrap_or(PRODUCT_ID);

    for device in context.devices()?.iter() {
        let descriptor = device.device_descriptor()?;

        if descriptor.vendor_id() == vid && descriptor.product_id() == pid {
            return device.open();
        }
    }

    Err(rusb::Error::NoDevice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_timeout_bounds() {
        assert_eq!(transfer_timeout(1).unwrap(), Duration::from_millis(1));
        assert_eq!(transfer_timeout(1000).unwrap(), TIMEOUT);
        assert_eq!(
            transfer_timeout(u64::from(u32::MAX)).unwrap(),
            Duration::from_millis(u64::from(u32::MAX))
        );
    }

    #[test]
    fn test_transfer_timeout_rejects_unbounded() {
        for &millis in &[0, u64::from(u32::MAX) + 1, u64::MAX] {
            match transfer_timeout(millis) {
                Err(Error::InvalidTimeout(m)) => assert_eq!(m, millis),
                other => panic!("{} was accepted: {:?}", millis, other),
            }
        }
    }
}
