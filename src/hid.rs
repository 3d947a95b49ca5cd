use crate::protocol::{self, REPORT_BUFFER_SIZE, REP_ID_STREAM_STATUS};
use crate::{Result, SensorError};
use hidapi::{HidApi, HidDevice};
use parking_lot::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Longest single locked read inside [`HidTransport::read_report`]. Bounds
/// how long a feature-report exchange waits behind the capture thread.
pub const READ_SLICE_MS: i32 = 20;

/// One HID interface reported by the OS during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidDeviceEntry {
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub release_number: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub path: String,
}

/// An open HID handle: timed input reads plus the feature-report side channel.
pub trait HidHandle: Send {
    /// Read one input report. Returns 0 when the timeout elapsed without data.
    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;

    /// Send a feature report; `data[0]` is the report id.
    fn send_feature_report(&mut self, data: &[u8]) -> Result<()>;

    /// Fetch the feature report whose id is preset in `buf[0]`.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Device discovery and open, abstracted so the engine can run without hardware.
pub trait HidBackend {
    type Handle: HidHandle + 'static;

    /// List every HID interface exposed under `vendor_id`.
    ///
    /// Fails with `SensorError::Initialization` if the HID subsystem is unavailable.
    fn enumerate(&mut self, vendor_id: u16) -> Result<Vec<HidDeviceEntry>>;

    fn open(&mut self, vendor_id: u16, product_id: u16, serial: &str) -> Result<Self::Handle>;
}

impl HidHandle for HidDevice {
    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        HidDevice::read_timeout(self, buf, timeout_ms).map_err(SensorError::from)
    }

    fn send_feature_report(&mut self, data: &[u8]) -> Result<()> {
        HidDevice::send_feature_report(self, data).map_err(SensorError::from)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        HidDevice::get_feature_report(self, buf).map_err(SensorError::from)
    }
}

fn create_hid_api() -> Result<HidApi> {
    let api = HidApi::new().map_err(|e| SensorError::Initialization(e.to_string()))?;
    #[cfg(target_os = "macos")]
    {
        // Keep HID opens shared on macOS to avoid seizing the interface.
        api.set_open_exclusive(false);
    }
    Ok(api)
}

/// hidapi-backed implementation of [`HidBackend`].
///
/// The `HidApi` context is created on first use so that constructing a
/// capture engine never fails, even on hosts without a HID subsystem.
#[derive(Default)]
pub struct HidApiBackend {
    api: Option<HidApi>,
}

impl HidApiBackend {
    pub fn new() -> Self {
        Self { api: None }
    }

    fn api(&mut self) -> Result<&mut HidApi> {
        if self.api.is_none() {
            self.api = Some(create_hid_api()?);
        }
        self.api
            .as_mut()
            .ok_or_else(|| SensorError::Initialization("hidapi context missing".into()))
    }
}

impl HidBackend for HidApiBackend {
    type Handle = HidDevice;

    fn enumerate(&mut self, vendor_id: u16) -> Result<Vec<HidDeviceEntry>> {
        let api = self.api()?;
        api.refresh_devices()?;

        Ok(api
            .device_list()
            .filter(|d| d.vendor_id() == vendor_id)
            .map(|d| HidDeviceEntry {
                product_id: d.product_id(),
                serial_number: d.serial_number().map(str::to_owned),
                release_number: d.release_number(),
                manufacturer: d.manufacturer_string().map(str::to_owned),
                product: d.product_string().map(str::to_owned),
                path: d.path().to_string_lossy().into_owned(),
            })
            .collect())
    }

    fn open(&mut self, vendor_id: u16, product_id: u16, serial: &str) -> Result<HidDevice> {
        let api = self.api()?;
        Ok(api.open_serial(vendor_id, product_id, serial)?)
    }
}

/// Report-level access to one open sensor MCU.
///
/// The handle sits behind a mutex shared by the capture thread (streamed
/// reads, keepalive) and the owning session (stream control). Every
/// operation holds the lock for a single transport call; streamed reads are
/// cut into slices of at most [`READ_SLICE_MS`].
pub struct HidTransport<H: HidHandle> {
    handle: Mutex<H>,
}

impl<H: HidHandle> HidTransport<H> {
    pub fn new(handle: H) -> Self {
        Self {
            handle: Mutex::new(handle),
        }
    }

    /// Timed read of one streamed input report.
    ///
    /// Waits up to `timeout_ms` (forever if negative) but releases the
    /// handle between slices, so stream control and pings from other
    /// threads get through while the stream is quiet.
    pub fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        let deadline = u64::try_from(timeout_ms)
            .ok()
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        loop {
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    // round up so a sub-millisecond rest does not spin
                    let ms = remaining.as_micros().div_ceil(1000);
                    ms.min(READ_SLICE_MS as u128) as i32
                }
                None => READ_SLICE_MS,
            };

            let mut handle = self.handle.lock();
            let res = handle.read_timeout(buf, slice);
            MutexGuard::unlock_fair(handle);

            let len = res?;
            if len > 0 || deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(len);
            }
        }
    }

    /// Switch the firmware-side sensor stream on or off.
    ///
    /// Returns `false` if the feature report could not be sent.
    pub fn enable_data_stream(&self, enabled: bool) -> bool {
        let report = protocol::build_stream_status_report(enabled);
        let res = self.handle.lock().send_feature_report(&report);
        match res {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Unable to set a feature report [stream status]: {}", e);
                false
            }
        }
    }

    /// Query the firmware-side sensor stream state.
    ///
    /// Transport failures and malformed answers are logged and read as `false`.
    pub fn is_data_stream_enabled(&self) -> bool {
        let mut buf = [0u8; REPORT_BUFFER_SIZE];
        buf[0] = REP_ID_STREAM_STATUS;

        let res = self.handle.lock().get_feature_report(&mut buf);
        let len = match res {
            Ok(len) => len.min(buf.len()),
            Err(e) => {
                log::warn!("Unable to get a feature report [stream status]: {}", e);
                return false;
            }
        };

        match protocol::parse_stream_status(&buf[..len]) {
            Ok(enabled) => enabled,
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// Send the keepalive ping so the firmware keeps streaming.
    pub fn send_ping(&self) -> bool {
        let report = protocol::build_ping_report();
        let res = self.handle.lock().send_feature_report(&report);
        match res {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Unable to send ping [request set / ping]: {}", e);
                false
            }
        }
    }
}
