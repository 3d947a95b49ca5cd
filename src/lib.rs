//! # zed-sensors - Rust driver for the ZED camera sensor MCU
//!
//! Cross-platform driver using hidapi. Provides:
//! - Discovery of the sensor HID interface of ZED Mini / ZED 2 / ZED 2i cameras
//! - A background capture thread decoding IMU, magnetometer, environment and
//!   camera temperature reports, with the firmware keepalive handled for you
//! - A thread-safe cache of the latest sample of each kind
//!
//! ## Quick Start
//! ```no_run
//! use zed_sensors::SensorCapture;
//! use std::time::Duration;
//!
//! let mut sensors = SensorCapture::new();
//! sensors.open(None).unwrap();
//! println!("SN: {:?}", sensors.serial_number());
//!
//! for _ in 0..100 {
//!     let imu = sensors.last_imu();
//!     println!("accel: {:?} gyro: {:?}", imu.accel, imu.gyro);
//!     std::thread::sleep(Duration::from_millis(10));
//! }
//! sensors.close();
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod hid;
pub mod registry;
pub mod cache;
pub mod keepalive;
pub mod capture;
pub mod config;
pub mod device;

#[cfg(test)]
mod mock;

pub use error::SensorError;
pub use types::*;
pub use cache::SampleCache;
pub use config::CaptureParams;
pub use device::SensorCapture;
pub use keepalive::KeepAlivePolicy;
pub use registry::DeviceRegistry;

/// Result type alias for sensor operations.
pub type Result<T> = std::result::Result<T, SensorError>;
