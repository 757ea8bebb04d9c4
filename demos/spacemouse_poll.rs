use std::time::Duration;

use hidapi::HidApi;
use spacenav_hid::backends::hid::open_matching_devices;
use spacenav_hid::{Config, Device, DeviceRegistry, RawReportEvent};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).expect("load config"),
        None => Config::default(),
    };
    let mut registry = DeviceRegistry::from_config(&config).expect("valid config");

    let api = HidApi::new().expect("init hidapi");
    let matchers = config.device_matchers().expect("valid matchers");
    let mut devices = open_matching_devices(&api, &matchers);
    devices.retain(|d| match registry.connect(d.id(), d.description(), d) {
        Ok(_) => {
            println!("- {}", d.description());
            true
        }
        Err(e) => {
            eprintln!("skipping {}: {e}", d.description());
            false
        }
    });
    if devices.is_empty() {
        eprintln!("no SpaceMouse found");
        return;
    }

    loop {
        for dev in devices.iter_mut() {
            for report in dev.poll() {
                registry.apply_report(dev.id(), &RawReportEvent::hid(&report));
            }
        }
        // LED on for whichever device took over
        registry.flush_leds(&mut devices);
        if let Some((id, reader)) = registry.current() {
            let t = reader.read_vector3("translation");
            let r = reader.read_vector3("rotation");
            println!(
                "{id}: t=({:+.2} {:+.2} {:+.2}) r=({:+.2} {:+.2} {:+.2}) b1={} b2={}",
                t.x,
                t.y,
                t.z,
                r.x,
                r.y,
                r.z,
                reader.read_button("button1"),
                reader.read_button("button2")
            );
        }
        // Sleep a touch to avoid pegging the CPU in the demo
        std::thread::sleep(Duration::from_millis(10));
    }
}
