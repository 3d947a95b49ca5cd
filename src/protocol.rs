use crate::types::{
    CamTempSample, EnvSample, EnvScale, ImuFlags, ImuSample, MagSample, SensorStatus,
};
use crate::{Result, SensorError};

// -- USB identifiers --
pub const VID: u16 = 0x2B03;
pub const PID_ZED_MINI: u16 = 0xF681;
pub const PID_ZED_2: u16 = 0xF781;
pub const PID_ZED_2I: u16 = 0xF881;

// -- Report geometry --
/// Size of every buffer exchanged with the transport (report id + 64 bytes).
pub const REPORT_BUFFER_SIZE: usize = 65;
/// Maximum bytes requested per streamed read.
pub const READ_SIZE: usize = 64;
pub const STREAM_STATUS_SIZE: usize = 2;
pub const SENSOR_DATA_SIZE: usize = 62;

// -- Report tags --
pub const REP_ID_SENSOR_DATA: u8 = 0x01;
pub const REP_ID_REQUEST_SET: u8 = 0x21;
pub const REP_ID_STREAM_STATUS: u8 = 0x32;

// -- Request commands --
pub const RQ_CMD_PING: u8 = 0xF2;

// -- Scale factors (raw firmware integer -> physical unit) --
/// Nanoseconds per firmware clock tick.
pub const TS_SCALE: f64 = 39062.5;
// TS_SCALE as an exact ratio
const TS_NS_NUM: u128 = 78125;
const TS_NS_DEN: u128 = 2;
/// Largest tick count whose nanosecond value fits in a `u64` (about 584
/// years of uptime). Larger counts saturate to `u64::MAX`.
pub const MAX_TIMESTAMP_TICKS: u64 = (u64::MAX as u128 * TS_NS_DEN / TS_NS_NUM) as u64;
/// g per LSB (±8 g full scale).
pub const ACC_SCALE: f64 = 8.0 / 32768.0;
/// °/s per LSB (±1000 °/s full scale).
pub const GYRO_SCALE: f64 = 1000.0 / 32768.0;
/// µT per LSB.
pub const MAG_SCALE: f64 = 1.0 / 16.0;
/// °C per LSB.
pub const TEMP_SCALE: f64 = 0.01;
/// hPa per LSB.
pub const PRESS_SCALE_NEW: f64 = 0.0001;
pub const PRESS_SCALE_OLD: f64 = 0.01;
/// %RH per LSB.
pub const HUMID_SCALE_NEW: f64 = 0.01;
pub const HUMID_SCALE_OLD: f64 = 1.0 / 1024.0;

/// Raw camera temperature the firmware reports when no reading is available.
pub const TEMP_NOT_VALID: i16 = -27315;

// -- Data report field offsets --
const OFF_IMU_NOT_VALID: usize = 1;
const OFF_TIMESTAMP: usize = 2;
const OFF_GYRO: usize = 10;
const OFF_ACCEL: usize = 16;
const OFF_FRAME_SYNC: usize = 22;
const OFF_SYNC_CAPABILITIES: usize = 23;
const OFF_FRAME_SYNC_COUNT: usize = 24;
const OFF_IMU_TEMP: usize = 28;
const OFF_MAG_STATUS: usize = 30;
const OFF_MAG: usize = 31;
const OFF_CAMERA_MOVING: usize = 37;
const OFF_CAMERA_MOVING_COUNT: usize = 38;
const OFF_CAMERA_FALLING: usize = 42;
const OFF_CAMERA_FALLING_COUNT: usize = 43;
const OFF_ENV_STATUS: usize = 47;
const OFF_ENV_TEMP: usize = 48;
const OFF_PRESSURE: usize = 50;
const OFF_HUMIDITY: usize = 54;
const OFF_CAM_TEMP_LEFT: usize = 58;
const OFF_CAM_TEMP_RIGHT: usize = 60;

impl EnvScale {
    pub fn pressure(self) -> f64 {
        match self {
            EnvScale::Current => PRESS_SCALE_NEW,
            EnvScale::Legacy => PRESS_SCALE_OLD,
        }
    }

    pub fn humidity(self) -> f64 {
        match self {
            EnvScale::Current => HUMID_SCALE_NEW,
            EnvScale::Legacy => HUMID_SCALE_OLD,
        }
    }
}

/// Build the 2-byte stream-status feature report.
/// Format: [STREAM_STATUS, 0|1]
pub fn build_stream_status_report(enabled: bool) -> [u8; STREAM_STATUS_SIZE] {
    [REP_ID_STREAM_STATUS, if enabled { 1 } else { 0 }]
}

/// Build the 2-byte keepalive feature report.
/// Format: [REQUEST_SET, PING]
pub fn build_ping_report() -> [u8; 2] {
    [REP_ID_REQUEST_SET, RQ_CMD_PING]
}

/// Validate a stream-status feature report and return the streaming flag.
pub fn parse_stream_status(response: &[u8]) -> Result<bool> {
    if response.len() < STREAM_STATUS_SIZE {
        return Err(SensorError::ProtocolMismatch(format!(
            "stream status size mismatch ({} bytes)",
            response.len()
        )));
    }
    if response[0] != REP_ID_STREAM_STATUS {
        return Err(SensorError::ProtocolMismatch(format!(
            "stream status type mismatch (tag 0x{:02x})",
            response[0]
        )));
    }
    Ok(response[1] == 1)
}

/// Sensor data report with every field still in firmware units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSensorData {
    pub imu_not_valid: u8,
    pub timestamp: u64,
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
    pub frame_sync: u8,
    pub sync_capabilities: u8,
    pub frame_sync_count: u32,
    pub imu_temp: i16,
    pub mag_status: u8,
    pub mag: [i16; 3],
    pub camera_moving: u8,
    pub camera_moving_count: u32,
    pub camera_falling: u8,
    pub camera_falling_count: u32,
    pub env_status: u8,
    pub env_temp: i16,
    pub pressure: u32,
    pub humidity: u32,
    pub cam_temp_left: i16,
    pub cam_temp_right: i16,
}

fn le_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn le_i16(data: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([data[at], data[at + 1]])
}

fn le_i16x3(data: &[u8], at: usize) -> [i16; 3] {
    [le_i16(data, at), le_i16(data, at + 2), le_i16(data, at + 4)]
}

fn put_i16x3(buf: &mut [u8], at: usize, v: [i16; 3]) {
    for (i, axis) in v.iter().enumerate() {
        buf[at + 2 * i..at + 2 * i + 2].copy_from_slice(&axis.to_le_bytes());
    }
}

impl RawSensorData {
    /// Parse a data report.
    ///
    /// The slice must start with the report tag and hold at least
    /// `SENSOR_DATA_SIZE` bytes; trailing bytes are ignored.
    pub fn parse(data: &[u8]) -> Result<RawSensorData> {
        if data.len() < SENSOR_DATA_SIZE {
            return Err(SensorError::MalformedFrame(format!(
                "short frame ({} < {} bytes)",
                data.len(),
                SENSOR_DATA_SIZE
            )));
        }
        if data[0] != REP_ID_SENSOR_DATA {
            return Err(SensorError::MalformedFrame(format!(
                "unexpected report tag 0x{:02x}",
                data[0]
            )));
        }

        let mut ts = [0u8; 8];
        ts.copy_from_slice(&data[OFF_TIMESTAMP..OFF_TIMESTAMP + 8]);

        Ok(RawSensorData {
            imu_not_valid: data[OFF_IMU_NOT_VALID],
            timestamp: u64::from_le_bytes(ts),
            gyro: le_i16x3(data, OFF_GYRO),
            accel: le_i16x3(data, OFF_ACCEL),
            frame_sync: data[OFF_FRAME_SYNC],
            sync_capabilities: data[OFF_SYNC_CAPABILITIES],
            frame_sync_count: le_u32(data, OFF_FRAME_SYNC_COUNT),
            imu_temp: le_i16(data, OFF_IMU_TEMP),
            mag_status: data[OFF_MAG_STATUS],
            mag: le_i16x3(data, OFF_MAG),
            camera_moving: data[OFF_CAMERA_MOVING],
            camera_moving_count: le_u32(data, OFF_CAMERA_MOVING_COUNT),
            camera_falling: data[OFF_CAMERA_FALLING],
            camera_falling_count: le_u32(data, OFF_CAMERA_FALLING_COUNT),
            env_status: data[OFF_ENV_STATUS],
            env_temp: le_i16(data, OFF_ENV_TEMP),
            pressure: le_u32(data, OFF_PRESSURE),
            humidity: le_u32(data, OFF_HUMIDITY),
            cam_temp_left: le_i16(data, OFF_CAM_TEMP_LEFT),
            cam_temp_right: le_i16(data, OFF_CAM_TEMP_RIGHT),
        })
    }

    /// Serialize back into the on-wire layout, tag included.
    pub fn encode(&self) -> [u8; SENSOR_DATA_SIZE] {
        let mut buf = [0u8; SENSOR_DATA_SIZE];
        buf[0] = REP_ID_SENSOR_DATA;
        buf[OFF_IMU_NOT_VALID] = self.imu_not_valid;
        buf[OFF_TIMESTAMP..OFF_TIMESTAMP + 8].copy_from_slice(&self.timestamp.to_le_bytes());
        put_i16x3(&mut buf, OFF_GYRO, self.gyro);
        put_i16x3(&mut buf, OFF_ACCEL, self.accel);
        buf[OFF_FRAME_SYNC] = self.frame_sync;
        buf[OFF_SYNC_CAPABILITIES] = self.sync_capabilities;
        buf[OFF_FRAME_SYNC_COUNT..OFF_FRAME_SYNC_COUNT + 4]
            .copy_from_slice(&self.frame_sync_count.to_le_bytes());
        buf[OFF_IMU_TEMP..OFF_IMU_TEMP + 2].copy_from_slice(&self.imu_temp.to_le_bytes());
        buf[OFF_MAG_STATUS] = self.mag_status;
        put_i16x3(&mut buf, OFF_MAG, self.mag);
        buf[OFF_CAMERA_MOVING] = self.camera_moving;
        buf[OFF_CAMERA_MOVING_COUNT..OFF_CAMERA_MOVING_COUNT + 4]
            .copy_from_slice(&self.camera_moving_count.to_le_bytes());
        buf[OFF_CAMERA_FALLING] = self.camera_falling;
        buf[OFF_CAMERA_FALLING_COUNT..OFF_CAMERA_FALLING_COUNT + 4]
            .copy_from_slice(&self.camera_falling_count.to_le_bytes());
        buf[OFF_ENV_STATUS] = self.env_status;
        buf[OFF_ENV_TEMP..OFF_ENV_TEMP + 2].copy_from_slice(&self.env_temp.to_le_bytes());
        buf[OFF_PRESSURE..OFF_PRESSURE + 4].copy_from_slice(&self.pressure.to_le_bytes());
        buf[OFF_HUMIDITY..OFF_HUMIDITY + 4].copy_from_slice(&self.humidity.to_le_bytes());
        buf[OFF_CAM_TEMP_LEFT..OFF_CAM_TEMP_LEFT + 2]
            .copy_from_slice(&self.cam_temp_left.to_le_bytes());
        buf[OFF_CAM_TEMP_RIGHT..OFF_CAM_TEMP_RIGHT + 2]
            .copy_from_slice(&self.cam_temp_right.to_le_bytes());
        buf
    }
}

/// One data report converted to physical units.
///
/// `mag` and `env` are filled regardless of their status; the cache decides
/// whether they are published.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    pub imu: ImuSample,
    pub mag: MagSample,
    pub env: EnvSample,
    pub cam_temp: CamTempSample,
}

/// Firmware ticks to nanoseconds, exact for every count up to
/// [`MAX_TIMESTAMP_TICKS`].
pub fn ticks_to_ns(ticks: u64) -> u64 {
    let ns = ticks as u128 * TS_NS_NUM / TS_NS_DEN;
    u64::try_from(ns).unwrap_or(u64::MAX)
}

fn scale3(v: [i16; 3], scale: f64) -> [f64; 3] {
    [v[0] as f64 * scale, v[1] as f64 * scale, v[2] as f64 * scale]
}

impl SensorFrame {
    pub fn from_raw(raw: &RawSensorData, env_scale: EnvScale) -> SensorFrame {
        let timestamp_ns = ticks_to_ns(raw.timestamp);

        let mut flags = ImuFlags::empty();
        flags.set(ImuFlags::FRAME_SYNC, raw.frame_sync != 0);
        flags.set(ImuFlags::SYNC_CAPABLE, raw.sync_capabilities != 0);
        flags.set(ImuFlags::MOVING, raw.camera_moving != 0);
        flags.set(ImuFlags::FALLING, raw.camera_falling != 0);

        let imu = ImuSample {
            valid: raw.imu_not_valid != 1,
            timestamp_ns,
            accel: scale3(raw.accel, ACC_SCALE),
            gyro: scale3(raw.gyro, GYRO_SCALE),
            temperature: raw.imu_temp as f64 * TEMP_SCALE,
            flags,
            frame_sync_count: raw.frame_sync_count,
        };

        let mag = MagSample {
            status: SensorStatus::from_code(raw.mag_status),
            timestamp_ns,
            mag: scale3(raw.mag, MAG_SCALE),
        };

        let env_status = SensorStatus::from_code(raw.env_status);
        let env = EnvSample {
            status: env_status,
            timestamp_ns,
            temperature: raw.env_temp as f64 * TEMP_SCALE,
            pressure: raw.pressure as f64 * env_scale.pressure(),
            humidity: raw.humidity as f64 * env_scale.humidity(),
        };

        // Camera temperature is sampled together with the environment data.
        let cam_temp = CamTempSample {
            valid: raw.cam_temp_left != TEMP_NOT_VALID
                && raw.cam_temp_right != TEMP_NOT_VALID
                && env_status.is_new(),
            timestamp_ns,
            temp_left: raw.cam_temp_left as f64 * TEMP_SCALE,
            temp_right: raw.cam_temp_right as f64 * TEMP_SCALE,
        };

        SensorFrame {
            imu,
            mag,
            env,
            cam_temp,
        }
    }
}

/// Parse and scale a data report in one step.
pub fn decode_sensor_report(data: &[u8], env_scale: EnvScale) -> Result<SensorFrame> {
    let raw = RawSensorData::parse(data)?;
    Ok(SensorFrame::from_raw(&raw, env_scale))
}
