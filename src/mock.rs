//! Scripted HID backend used by the unit tests.

use crate::hid::{HidBackend, HidDeviceEntry, HidHandle};
use crate::protocol::{self, RawSensorData, REP_ID_STREAM_STATUS};
use crate::{Result, SensorError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct MockState {
    /// Reports returned by successive reads; an empty queue reads as a timeout.
    pub frames: VecDeque<Vec<u8>>,
    /// How long an empty read blocks (capped by the caller's timeout).
    pub read_delay: Duration,
    pub stream_enabled: bool,
    pub fail_feature: bool,
    /// Overrides the stream-status answer.
    pub status_reply: Option<Vec<u8>>,
    pub feature_writes: Vec<Vec<u8>>,
    pub pings: usize,
    /// `read_timeout` calls, one per read slice.
    pub reads: usize,
}

pub(crate) struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    pub fn new() -> Self {
        Self::with_state(Arc::new(Mutex::new(MockState::default())))
    }

    pub fn with_state(state: Arc<Mutex<MockState>>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> Arc<Mutex<MockState>> {
        self.state.clone()
    }
}

impl HidHandle for MockHandle {
    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        let (frame, delay) = {
            let mut state = self.state.lock();
            state.reads += 1;
            (state.frames.pop_front(), state.read_delay)
        };

        match frame {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            None => {
                let cap = Duration::from_millis(timeout_ms.max(0) as u64);
                std::thread::sleep(delay.min(cap));
                Ok(0)
            }
        }
    }

    fn send_feature_report(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_feature {
            return Err(SensorError::Io("mock feature report failure".into()));
        }
        state.feature_writes.push(data.to_vec());
        if data.len() >= 2 && data[0] == REP_ID_STREAM_STATUS {
            state.stream_enabled = data[1] == 1;
        }
        if data == protocol::build_ping_report() {
            state.pings += 1;
        }
        Ok(())
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        let state = self.state.lock();
        if state.fail_feature {
            return Err(SensorError::Io("mock feature report failure".into()));
        }
        let reply = state
            .status_reply
            .clone()
            .unwrap_or_else(|| vec![REP_ID_STREAM_STATUS, state.stream_enabled as u8]);
        let len = reply.len().min(buf.len());
        buf[..len].copy_from_slice(&reply[..len]);
        Ok(len)
    }
}

#[derive(Default)]
pub(crate) struct MockBackend {
    pub devices: Vec<HidDeviceEntry>,
    pub init_fails: bool,
    pub open_fails: bool,
    pub enumerations: usize,
    pub opened: Vec<(u16, u16, String)>,
    pub state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn with_serials(serials: &[&str]) -> Self {
        let mut backend = MockBackend::default();
        backend.devices = serials
            .iter()
            .map(|sn| entry(sn, protocol::PID_ZED_2))
            .collect();
        backend.state.lock().read_delay = Duration::from_millis(5);
        backend
    }
}

impl HidBackend for MockBackend {
    type Handle = MockHandle;

    fn enumerate(&mut self, _vendor_id: u16) -> Result<Vec<HidDeviceEntry>> {
        self.enumerations += 1;
        if self.init_fails {
            return Err(SensorError::Initialization("mock hid_init failure".into()));
        }
        Ok(self.devices.clone())
    }

    fn open(&mut self, vendor_id: u16, product_id: u16, serial: &str) -> Result<MockHandle> {
        if self.open_fails {
            return Err(SensorError::Io("mock open failure".into()));
        }
        self.opened.push((vendor_id, product_id, serial.to_string()));
        Ok(MockHandle::with_state(self.state.clone()))
    }
}

pub(crate) fn entry(serial: &str, product_id: u16) -> HidDeviceEntry {
    HidDeviceEntry {
        product_id,
        serial_number: Some(serial.to_string()),
        release_number: 0x0317,
        manufacturer: Some("STEREOLABS".into()),
        product: Some("ZED 2 HID INTERFACE".into()),
        path: format!("/dev/hidraw-{}", serial),
    }
}

pub(crate) fn sample_raw() -> RawSensorData {
    RawSensorData {
        imu_not_valid: 0,
        timestamp: 1_234_567,
        gyro: [-120, 45, 3000],
        accel: [12, -4096, 4100],
        frame_sync: 1,
        sync_capabilities: 1,
        frame_sync_count: 77,
        imu_temp: 3512,
        mag_status: 2,
        mag: [-310, 522, 80],
        camera_moving: 0,
        camera_moving_count: 3,
        camera_falling: 0,
        camera_falling_count: 0,
        env_status: 2,
        env_temp: 2875,
        pressure: 10_132_500,
        humidity: 4210,
        cam_temp_left: 4012,
        cam_temp_right: 3998,
    }
}

/// Encoded data report with the given mag/env status codes.
pub(crate) fn frame_with_status(timestamp: u64, mag_status: u8, env_status: u8) -> Vec<u8> {
    let mut raw = sample_raw();
    raw.timestamp = timestamp;
    raw.mag_status = mag_status;
    raw.env_status = env_status;
    raw.mag = [timestamp as i16; 3];
    raw.env_temp = timestamp as i16;
    raw.encode().to_vec()
}
