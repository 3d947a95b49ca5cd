//! List all connected ZED sensor interfaces.

fn main() {
    env_logger::init();

    let mut sensors = zed_sensors::SensorCapture::new();
    match sensors.enumerate_devices() {
        Ok(count) => {
            println!("Found {} sensor device(s):", count);
            for (i, dev) in sensors.devices().enumerate() {
                println!(
                    "  [{}] SN={}  Model={:?}  PID={:04x}  FW={}  Path={}",
                    i,
                    dev.serial_number,
                    dev.model(),
                    dev.product_id,
                    dev.firmware,
                    dev.path
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
