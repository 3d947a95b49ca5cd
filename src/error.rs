/// Errors that can occur when talking to the sensor MCU.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("HID subsystem unavailable: {0}")]
    Initialization(String),

    #[error("No sensor device found (VID=2B03)")]
    NoDevice,

    #[error("Connection to device with sn {serial} failed: {reason}")]
    Connection { serial: u32, reason: String },

    #[error("Invalid serial number {serial:?}: {source}")]
    InvalidSerial {
        serial: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("HID I/O failed: {0}")]
    Io(String),

    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("Malformed sensor frame: {0}")]
    MalformedFrame(String),

    #[error("Session already bound to device with sn {0}")]
    AlreadyOpen(u32),

    #[error("Failed to spawn capture thread: {0}")]
    Spawn(String),
}
