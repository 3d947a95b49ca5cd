use crate::cache::SampleCache;
use crate::capture::CaptureLoop;
use crate::config::CaptureParams;
use crate::hid::{HidApiBackend, HidBackend, HidHandle, HidTransport};
use crate::protocol::VID;
use crate::registry::DeviceRegistry;
use crate::types::{
    CamTempSample, CaptureState, DeviceDescriptor, DeviceModel, EnvSample, FirmwareVersion,
    ImuSample, MagSample, SensorSnapshot,
};
use crate::{Result, SensorError};
use std::sync::Arc;

/// One open transport handle bound to one serial number.
struct Session<H: HidHandle> {
    serial: u32,
    descriptor: Option<DeviceDescriptor>,
    transport: Arc<HidTransport<H>>,
    capture: Option<CaptureLoop>,
}

/// Capture engine for the sensor MCU of one camera.
///
/// Owns the device registry, at most one open session and the cache of the
/// latest samples. The cache handle stays the same across sessions but is
/// emptied each time a device is opened. Dropping the engine closes the
/// session.
pub struct SensorCapture<B: HidBackend = HidApiBackend> {
    backend: B,
    registry: DeviceRegistry,
    params: CaptureParams,
    cache: Arc<SampleCache>,
    session: Option<Session<B::Handle>>,
    /// State of the last capture loop once its session is gone.
    final_state: CaptureState,
}

impl SensorCapture<HidApiBackend> {
    /// hidapi-backed engine configured from the environment.
    pub fn new() -> Self {
        Self::with_params(CaptureParams::from_env())
    }

    pub fn with_params(params: CaptureParams) -> Self {
        Self::with_backend(HidApiBackend::new(), params)
    }
}

impl Default for SensorCapture<HidApiBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: HidBackend> SensorCapture<B> {
    pub fn with_backend(backend: B, params: CaptureParams) -> Self {
        Self {
            backend,
            registry: DeviceRegistry::new(),
            params,
            cache: Arc::new(SampleCache::new()),
            session: None,
            final_state: CaptureState::Idle,
        }
    }

    /// Rebuild the device table; returns the number of devices found.
    pub fn enumerate_devices(&mut self) -> Result<usize> {
        self.registry.enumerate(&mut self.backend)
    }

    /// Serial numbers of the known devices, ascending.
    pub fn device_list(&mut self) -> Result<Vec<u32>> {
        self.registry.device_list(&mut self.backend)
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.registry.descriptors()
    }

    /// Open the device with the given serial number, or the lowest serial
    /// found when `serial` is `None`, then enable streaming and start the
    /// capture thread.
    ///
    /// Succeeds as soon as the handle is acquired. If the firmware refuses
    /// to enable streaming the session stays open but no capture thread
    /// runs; check [`is_initialized`](Self::is_initialized).
    pub fn open(&mut self, serial: Option<u32>) -> Result<()> {
        if let Some(session) = &self.session {
            return Err(SensorError::AlreadyOpen(session.serial));
        }

        if self.registry.is_empty() {
            self.registry.enumerate(&mut self.backend)?;
        }

        let serial = match serial {
            Some(sn) => sn,
            None => match self.registry.lowest_serial() {
                Some(sn) => sn,
                None => {
                    log::error!("No available sensor device");
                    return Err(SensorError::NoDevice);
                }
            },
        };

        let product_id = match self.registry.product_id(serial) {
            Some(pid) => pid,
            None => {
                let err = SensorError::Connection {
                    serial,
                    reason: "serial number not found during discovery".into(),
                };
                log::error!("{}", err);
                return Err(err);
            }
        };

        let handle = self
            .backend
            .open(VID, product_id, &serial.to_string())
            .map_err(|e| {
                let err = SensorError::Connection {
                    serial,
                    reason: e.to_string(),
                };
                log::error!("{}", err);
                err
            })?;

        log::info!("Connected to device with sn {}", serial);
        self.cache.clear();
        self.final_state = CaptureState::Idle;

        let transport = Arc::new(HidTransport::new(handle));
        let mut session = Session {
            serial,
            descriptor: self.registry.get(serial).cloned(),
            transport: transport.clone(),
            capture: None,
        };

        if transport.enable_data_stream(true) {
            match CaptureLoop::start(transport, self.cache.clone(), &self.params) {
                Ok(capture) => session.capture = Some(capture),
                Err(e) => {
                    log::error!("{}", e);
                    session.transport.enable_data_stream(false);
                    return Err(e);
                }
            }
        } else {
            log::warn!(
                "Sensor stream could not be enabled on sn {}; capture not started",
                serial
            );
        }

        self.session = Some(session);
        Ok(())
    }

    /// Stop capturing, disable streaming and release the handle.
    ///
    /// Safe to call repeatedly and on an engine that never opened a device.
    pub fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        let initialized = session.capture.is_some();
        if let Some(capture) = session.capture.take() {
            capture.stop();
            self.final_state = CaptureState::Stopped;
        }

        session.transport.enable_data_stream(false);
        drop(session);

        if initialized {
            log::info!("Device closed");
        }
    }

    /// Alias of [`close`](Self::close).
    pub fn reset(&mut self) {
        self.close();
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// True once streaming was enabled and the capture thread started.
    pub fn is_initialized(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.capture.is_some())
    }

    /// `Idle` before any capture ran or when streaming could not be
    /// enabled, `Stopped` once the last session's loop has ended.
    pub fn capture_state(&self) -> CaptureState {
        match &self.session {
            Some(session) => session
                .capture
                .as_ref()
                .map_or(CaptureState::Idle, CaptureLoop::state),
            None => self.final_state,
        }
    }

    pub fn serial_number(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.serial)
    }

    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.session
            .as_ref()
            .and_then(|s| s.descriptor.as_ref())
            .map(|d| d.firmware)
    }

    pub fn model(&self) -> Option<DeviceModel> {
        self.session
            .as_ref()
            .and_then(|s| s.descriptor.as_ref())
            .map(DeviceDescriptor::model)
    }

    /// Returns `false` if no device is open or the report could not be sent.
    pub fn enable_data_stream(&self, enabled: bool) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.transport.enable_data_stream(enabled))
    }

    pub fn is_data_stream_enabled(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.transport.is_data_stream_enabled())
    }

    /// Send one keepalive ping outside the capture loop's own cadence.
    pub fn send_ping(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.transport.send_ping())
    }

    pub fn last_imu(&self) -> ImuSample {
        self.cache.imu()
    }

    pub fn last_mag(&self) -> MagSample {
        self.cache.mag()
    }

    pub fn last_env(&self) -> EnvSample {
        self.cache.env()
    }

    pub fn last_cam_temp(&self) -> CamTempSample {
        self.cache.cam_temp()
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        self.cache.snapshot()
    }

    /// Shared cache handle for polling from other threads.
    pub fn cache(&self) -> Arc<SampleCache> {
        self.cache.clone()
    }
}

impl<B: HidBackend> Drop for SensorCapture<B> {
    fn drop(&mut self) {
        self.close();
    }
}
