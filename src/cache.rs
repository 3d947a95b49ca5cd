use crate::protocol::SensorFrame;
use crate::types::{CamTempSample, EnvSample, ImuSample, MagSample, SensorSnapshot};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Latest decoded value of each sample kind.
///
/// Written by the capture thread only, readable from any thread. Each kind
/// has its own lock; `publish` and `snapshot` take all four in the same
/// order (IMU, magnetometer, environment, camera temperature), so a snapshot
/// never mixes two frames.
#[derive(Debug, Default)]
pub struct SampleCache {
    imu: RwLock<ImuSample>,
    mag: RwLock<MagSample>,
    env: RwLock<EnvSample>,
    cam_temp: RwLock<CamTempSample>,
    frames: AtomicU64,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one decoded frame.
    ///
    /// - IMU is always replaced.
    /// - Magnetometer and environment values are replaced only when their
    ///   status is "new value"; otherwise only the status is updated.
    /// - Camera temperature is replaced when valid; otherwise it is marked
    ///   invalid and keeps its last readings.
    pub fn publish(&self, frame: &SensorFrame) {
        let mut imu = self.imu.write();
        let mut mag = self.mag.write();
        let mut env = self.env.write();
        let mut cam_temp = self.cam_temp.write();

        *imu = frame.imu;

        if frame.mag.status.is_new() {
            *mag = frame.mag;
        } else {
            mag.status = frame.mag.status;
        }

        if frame.env.status.is_new() {
            *env = frame.env;
        } else {
            env.status = frame.env.status;
        }

        if frame.cam_temp.valid {
            *cam_temp = frame.cam_temp;
        } else {
            cam_temp.valid = false;
        }

        self.frames.fetch_add(1, Ordering::Release);
    }

    /// Drop every sample and restart the frame counter.
    pub fn clear(&self) {
        let mut imu = self.imu.write();
        let mut mag = self.mag.write();
        let mut env = self.env.write();
        let mut cam_temp = self.cam_temp.write();

        *imu = ImuSample::default();
        *mag = MagSample::default();
        *env = EnvSample::default();
        *cam_temp = CamTempSample::default();
        self.frames.store(0, Ordering::Release);
    }

    pub fn imu(&self) -> ImuSample {
        *self.imu.read()
    }

    pub fn mag(&self) -> MagSample {
        *self.mag.read()
    }

    pub fn env(&self) -> EnvSample {
        *self.env.read()
    }

    pub fn cam_temp(&self) -> CamTempSample {
        *self.cam_temp.read()
    }

    /// All four samples as published by the same frame.
    pub fn snapshot(&self) -> SensorSnapshot {
        let imu = self.imu.read();
        let mag = self.mag.read();
        let env = self.env.read();
        let cam_temp = self.cam_temp.read();
        SensorSnapshot {
            imu: *imu,
            mag: *mag,
            env: *env,
            cam_temp: *cam_temp,
        }
    }

    /// Number of frames published so far. Pollers compare it between reads
    /// to tell whether anything new arrived.
    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{frame_with_status, sample_raw};
    use crate::protocol::{decode_sensor_report, RawSensorData, SensorFrame, TEMP_NOT_VALID};
    use crate::types::{EnvScale, SensorStatus};
    use std::sync::Arc;

    fn frame(timestamp: u64, mag_status: u8, env_status: u8) -> SensorFrame {
        decode_sensor_report(
            &frame_with_status(timestamp, mag_status, env_status),
            EnvScale::Current,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_are_invalid() {
        let cache = SampleCache::new();
        assert!(!cache.imu().valid);
        assert_eq!(cache.mag().status, SensorStatus::NotPresent);
        assert!(!cache.cam_temp().valid);
        assert_eq!(cache.frame_count(), 0);
    }

    #[test]
    fn test_mag_env_only_update_on_new_value() {
        let cache = SampleCache::new();

        cache.publish(&frame(100, 2, 2));
        let mag_new = cache.mag();
        let env_new = cache.env();
        assert_eq!(mag_new.status, SensorStatus::NewValue);
        assert_eq!(mag_new.mag[0], 100.0 / 16.0);

        // stale, new, stale
        for (ts, status) in [(200u64, 1u8), (300, 2), (400, 1)] {
            let before_mag = cache.mag();
            let before_env = cache.env();
            cache.publish(&frame(ts, status, status));

            if status == 2 {
                assert_eq!(cache.mag().timestamp_ns, cache.imu().timestamp_ns);
                assert_eq!(cache.mag().mag[0], ts as f64 / 16.0);
                assert_eq!(cache.env().temperature, ts as f64 * 0.01);
            } else {
                assert_eq!(cache.mag().mag, before_mag.mag);
                assert_eq!(cache.mag().timestamp_ns, before_mag.timestamp_ns);
                assert_eq!(cache.env().temperature, before_env.temperature);
                assert_eq!(cache.env().pressure, before_env.pressure);
                assert_eq!(cache.env().timestamp_ns, before_env.timestamp_ns);
            }
        }
        assert_ne!(cache.mag().timestamp_ns, mag_new.timestamp_ns);
        assert_ne!(cache.env().timestamp_ns, env_new.timestamp_ns);
    }

    #[test]
    fn test_stale_status_lands_on_its_own_sample() {
        let cache = SampleCache::new();
        cache.publish(&frame(100, 2, 2));

        cache.publish(&frame(200, 1, 0));

        // The stale codes go to the magnetometer and environment samples;
        // the IMU validity comes from its own flag only.
        assert_eq!(cache.mag().status, SensorStatus::OldValue);
        assert_eq!(cache.env().status, SensorStatus::NotPresent);
        assert!(cache.imu().valid);
        assert_eq!(cache.imu().timestamp_ns, frame(200, 1, 0).imu.timestamp_ns);
    }

    #[test]
    fn test_cam_temp_keeps_readings_when_invalid() {
        let cache = SampleCache::new();
        cache.publish(&frame(100, 2, 2));
        let valid = cache.cam_temp();
        assert!(valid.valid);

        let mut raw: RawSensorData = sample_raw();
        raw.timestamp = 200;
        raw.cam_temp_right = TEMP_NOT_VALID;
        cache.publish(&SensorFrame::from_raw(&raw, EnvScale::Current));

        let after = cache.cam_temp();
        assert!(!after.valid);
        assert_eq!(after.temp_left, valid.temp_left);
        assert_eq!(after.temp_right, valid.temp_right);
        assert_eq!(after.timestamp_ns, valid.timestamp_ns);
    }

    #[test]
    fn test_example_frame_updates_imu_and_mag_only() {
        let cache = SampleCache::new();
        cache.publish(&frame(100, 2, 2));
        let env_before = cache.env();
        let cam_before = cache.cam_temp();

        let mut raw = sample_raw();
        raw.timestamp = 500;
        raw.imu_not_valid = 0;
        raw.mag_status = 2;
        raw.env_status = 1;
        raw.mag = [64, 32, 16];
        raw.env_temp = 9999;
        cache.publish(&SensorFrame::from_raw(&raw, EnvScale::Current));

        let snap = cache.snapshot();
        assert!(snap.imu.valid);
        assert_eq!(snap.imu.timestamp_ns, snap.mag.timestamp_ns);
        assert_eq!(snap.mag.mag, [4.0, 2.0, 1.0]);
        assert_eq!(snap.env.temperature, env_before.temperature);
        assert_eq!(snap.env.timestamp_ns, env_before.timestamp_ns);
        assert_eq!(snap.cam_temp.temp_left, cam_before.temp_left);
        assert_eq!(snap.cam_temp.timestamp_ns, cam_before.timestamp_ns);
        assert_eq!(cache.frame_count(), 2);
    }

    #[test]
    fn test_clear_forgets_samples() {
        let cache = SampleCache::new();
        cache.publish(&frame(100, 2, 2));
        cache.publish(&frame(200, 2, 2));
        assert_eq!(cache.frame_count(), 2);

        cache.clear();
        assert_eq!(cache.frame_count(), 0);
        assert_eq!(cache.snapshot(), SampleCache::new().snapshot());
        assert!(!cache.imu().valid);

        cache.publish(&frame(300, 2, 2));
        assert_eq!(cache.frame_count(), 1);
        assert_eq!(cache.imu().timestamp_ns, frame(300, 2, 2).imu.timestamp_ns);
    }

    #[test]
    fn test_concurrent_snapshots_are_not_torn() {
        let cache = Arc::new(SampleCache::new());
        let writer_cache = cache.clone();

        let writer = std::thread::spawn(move || {
            for ts in 1..=20_000u64 {
                writer_cache.publish(&frame(ts, 2, 2));
            }
        });

        let mut checked = 0;
        while checked < 20_000 {
            let snap = cache.snapshot();
            assert_eq!(snap.imu.timestamp_ns, snap.mag.timestamp_ns);
            assert_eq!(snap.imu.timestamp_ns, snap.env.timestamp_ns);
            assert_eq!(snap.imu.timestamp_ns, snap.cam_temp.timestamp_ns);
            checked += 1;
        }

        writer.join().unwrap();
        assert_eq!(cache.frame_count(), 20_000);
    }
}
