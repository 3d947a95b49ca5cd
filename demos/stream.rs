//! Poll the latest sensor samples and print them to stdout.
//!
//! Usage: cargo run --example stream [serial]
//! Press Ctrl+C to stop.

use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let serial = std::env::args().nth(1).and_then(|s| s.parse::<u32>().ok());

    let mut sensors = zed_sensors::SensorCapture::new();
    if let Err(e) = sensors.open(serial) {
        eprintln!("Failed to open device: {}", e);
        std::process::exit(1);
    }
    if !sensors.is_initialized() {
        eprintln!("Device opened but the sensor stream could not be enabled");
        std::process::exit(1);
    }

    println!("SN:       {:?}", sensors.serial_number());
    println!("Model:    {:?}", sensors.model());
    if let Some(fw) = sensors.firmware_version() {
        println!("Firmware: {}", fw);
    }
    println!();

    let cache = sensors.cache();
    let start = Instant::now();
    let mut last_count = 0;
    let mut last_report = Instant::now();

    loop {
        std::thread::sleep(Duration::from_millis(100));
        let snap = cache.snapshot();

        println!(
            "ts={:<14} acc=[{:+.3}, {:+.3}, {:+.3}] g  gyro=[{:+.2}, {:+.2}, {:+.2}] dps  imu={:.1}C",
            snap.imu.timestamp_ns,
            snap.imu.accel[0], snap.imu.accel[1], snap.imu.accel[2],
            snap.imu.gyro[0], snap.imu.gyro[1], snap.imu.gyro[2],
            snap.imu.temperature,
        );
        if snap.mag.status.is_new() {
            println!(
                "    mag=[{:+.1}, {:+.1}, {:+.1}] uT",
                snap.mag.mag[0], snap.mag.mag[1], snap.mag.mag[2]
            );
        }
        if snap.env.status.is_new() {
            println!(
                "    env={:.2}C {:.2}hPa {:.1}%RH",
                snap.env.temperature, snap.env.pressure, snap.env.humidity
            );
        }
        if snap.cam_temp.valid {
            println!(
                "    cam L={:.2}C R={:.2}C",
                snap.cam_temp.temp_left, snap.cam_temp.temp_right
            );
        }

        // Report rate every 3 seconds
        let now = Instant::now();
        if now.duration_since(last_report) >= Duration::from_secs(3) {
            let count = cache.frame_count();
            let hz = (count - last_count) as f64 / now.duration_since(last_report).as_secs_f64();
            println!(
                "--- {} frames in {:.1}s ({:.1} Hz) ---",
                count,
                start.elapsed().as_secs_f64(),
                hz
            );
            last_count = count;
            last_report = now;
        }
    }
}
