/// Firmware status code attached to the magnetometer and environment
/// sub-reports of every data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorStatus {
    /// The sensor is not fitted on this camera model.
    #[default]
    NotPresent,
    /// The frame repeats a value that was already delivered.
    OldValue,
    /// The frame carries a freshly sampled value.
    NewValue,
    /// Any other code the firmware reports.
    Unknown(u8),
}

impl SensorStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => SensorStatus::NotPresent,
            1 => SensorStatus::OldValue,
            2 => SensorStatus::NewValue,
            other => SensorStatus::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SensorStatus::NotPresent => 0,
            SensorStatus::OldValue => 1,
            SensorStatus::NewValue => 2,
            SensorStatus::Unknown(code) => code,
        }
    }

    pub fn is_new(self) -> bool {
        self == SensorStatus::NewValue
    }
}

bitflags::bitflags! {
    /// Motion and camera-sync indicators reported next to the IMU data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ImuFlags: u8 {
        /// The sample is synchronized to a camera frame.
        const FRAME_SYNC   = 1 << 0;
        /// Frame synchronization is active on the device.
        const SYNC_CAPABLE = 1 << 1;
        /// The IMU motion interrupt fired.
        const MOVING       = 1 << 2;
        /// The IMU free-fall interrupt fired.
        const FALLING      = 1 << 3;
    }
}

/// Latest accelerometer/gyroscope reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuSample {
    pub valid: bool,
    /// Firmware clock in nanoseconds. Exact up to
    /// [`MAX_TIMESTAMP_TICKS`](crate::protocol::MAX_TIMESTAMP_TICKS) ticks,
    /// saturated at `u64::MAX` beyond.
    pub timestamp_ns: u64,
    /// Acceleration [x, y, z] in g.
    pub accel: [f64; 3],
    /// Angular rate [x, y, z] in degrees per second.
    pub gyro: [f64; 3],
    /// IMU die temperature in °C.
    pub temperature: f64,
    pub flags: ImuFlags,
    /// Number of camera frames the IMU has been synced to.
    pub frame_sync_count: u32,
}

/// Latest magnetometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MagSample {
    pub status: SensorStatus,
    pub timestamp_ns: u64,
    /// Magnetic field [x, y, z] in µT.
    pub mag: [f64; 3],
}

/// Latest environmental sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvSample {
    pub status: SensorStatus,
    pub timestamp_ns: u64,
    /// °C
    pub temperature: f64,
    /// hPa
    pub pressure: f64,
    /// %RH
    pub humidity: f64,
}

/// Latest temperature of the two image sensors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CamTempSample {
    pub valid: bool,
    pub timestamp_ns: u64,
    /// °C
    pub temp_left: f64,
    /// °C
    pub temp_right: f64,
}

/// All four cached samples read under one lock ordering.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSnapshot {
    pub imu: ImuSample,
    pub mag: MagSample,
    pub env: EnvSample,
    pub cam_temp: CamTempSample,
}

/// Scale set used for pressure and humidity.
///
/// Older firmware reports pressure in 0.01 hPa and humidity in 1/1024 %RH;
/// current firmware uses 0.0001 hPa and 0.01 %RH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvScale {
    #[default]
    Current,
    Legacy,
}

/// Camera model, derived from the sensor MCU product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceModel {
    ZedMini,
    Zed2,
    Zed2i,
    Unknown(u16),
}

impl DeviceModel {
    pub fn from_product_id(pid: u16) -> Self {
        match pid {
            crate::protocol::PID_ZED_MINI => DeviceModel::ZedMini,
            crate::protocol::PID_ZED_2 => DeviceModel::Zed2,
            crate::protocol::PID_ZED_2I => DeviceModel::Zed2i,
            other => DeviceModel::Unknown(other),
        }
    }
}

/// Firmware version decoded from the USB release number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    pub fn from_release_number(release: u16) -> Self {
        Self {
            major: (release >> 8) as u8,
            minor: (release & 0x00FF) as u8,
        }
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// One sensor MCU found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub serial_number: u32,
    pub product_id: u16,
    pub firmware: FirmwareVersion,
    pub manufacturer: String,
    pub product: String,
    pub path: String,
}

impl DeviceDescriptor {
    pub fn model(&self) -> DeviceModel {
        DeviceModel::from_product_id(self.product_id)
    }
}

/// Lifecycle of the background capture worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl CaptureState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => CaptureState::Idle,
            1 => CaptureState::Running,
            _ => CaptureState::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(SensorStatus::from_code(0), SensorStatus::NotPresent);
        assert_eq!(SensorStatus::from_code(1), SensorStatus::OldValue);
        assert_eq!(SensorStatus::from_code(2), SensorStatus::NewValue);
        assert_eq!(SensorStatus::from_code(7), SensorStatus::Unknown(7));
        assert_eq!(SensorStatus::Unknown(7).code(), 7);
        assert!(SensorStatus::NewValue.is_new());
        assert!(!SensorStatus::OldValue.is_new());
    }

    #[test]
    fn test_firmware_version_from_release() {
        let fw = FirmwareVersion::from_release_number(0x0317);
        assert_eq!(fw.major, 3);
        assert_eq!(fw.minor, 0x17);
        assert_eq!(fw.to_string(), "v3.23");
    }

    #[test]
    fn test_device_model() {
        assert_eq!(DeviceModel::from_product_id(0xF781), DeviceModel::Zed2);
        assert_eq!(DeviceModel::from_product_id(0x1234), DeviceModel::Unknown(0x1234));
    }
}
