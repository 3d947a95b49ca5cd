use crate::hid::HidBackend;
use crate::protocol::VID;
use crate::types::{DeviceDescriptor, FirmwareVersion};
use crate::{Result, SensorError};
use std::collections::BTreeMap;

/// Serial number -> device table built by the last discovery pass.
///
/// Owned by one capture engine; every `enumerate` call rebuilds it from scratch.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<u32, DeviceDescriptor>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate all HID interfaces under the sensor vendor id.
    ///
    /// Returns the number of devices found. If the HID subsystem cannot be
    /// used, the registry is left empty and 0 is returned. A serial number
    /// that is not a plain decimal integer fails the whole pass with
    /// `SensorError::InvalidSerial`.
    pub fn enumerate<B: HidBackend>(&mut self, backend: &mut B) -> Result<usize> {
        self.devices.clear();

        let entries = match backend.enumerate(VID) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("HID enumeration unavailable: {}", e);
                return Ok(0);
            }
        };

        let mut devices = BTreeMap::new();
        for entry in entries {
            let sn_str = entry.serial_number.unwrap_or_default();
            let serial_number =
                sn_str
                    .trim()
                    .parse::<u32>()
                    .map_err(|source| SensorError::InvalidSerial {
                        serial: sn_str.clone(),
                        source,
                    })?;

            let descriptor = DeviceDescriptor {
                serial_number,
                product_id: entry.product_id,
                firmware: FirmwareVersion::from_release_number(entry.release_number),
                manufacturer: entry.manufacturer.unwrap_or_default(),
                product: entry.product.unwrap_or_default(),
                path: entry.path,
            };

            log::debug!(
                "Device found: VID={:04x} PID={:04x} Path={} SN={} Manufacturer={} Product={} FW={}",
                VID,
                descriptor.product_id,
                descriptor.path,
                descriptor.serial_number,
                descriptor.manufacturer,
                descriptor.product,
                descriptor.firmware
            );

            devices.insert(serial_number, descriptor);
        }

        self.devices = devices;
        Ok(self.devices.len())
    }

    /// Serial numbers in ascending order, enumerating first only if the
    /// registry is empty.
    pub fn device_list<B: HidBackend>(&mut self, backend: &mut B) -> Result<Vec<u32>> {
        if self.devices.is_empty() {
            self.enumerate(backend)?;
        }
        Ok(self.serials())
    }

    pub fn serials(&self) -> Vec<u32> {
        self.devices.keys().copied().collect()
    }

    pub fn get(&self, serial: u32) -> Option<&DeviceDescriptor> {
        self.devices.get(&serial)
    }

    pub fn product_id(&self, serial: u32) -> Option<u16> {
        self.devices.get(&serial).map(|d| d.product_id)
    }

    /// Lowest serial number present, used when no serial is requested.
    pub fn lowest_serial(&self) -> Option<u32> {
        self.devices.keys().next().copied()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
