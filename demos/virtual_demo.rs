use spacenav_hid::backends::virtual_input::VirtualSpaceMouse;
use spacenav_hid::{Device, DeviceRegistry, RawReportEvent};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut registry = DeviceRegistry::new();
    let mut mouse = VirtualSpaceMouse::new("virtual:demo");
    let reader = registry
        .connect(mouse.id(), mouse.description(), &mouse)
        .expect("virtual SpaceNavigator is recognized");

    println!("Layout for {}:", reader.layout().display_name());
    for c in reader.layout().controls() {
        println!(
            "  {:<16} byte {:>2} bit {} size {:>2} {:?}",
            c.name(),
            c.byte_offset,
            c.bit_offset,
            c.control.size_in_bits,
            c.control.kind
        );
    }

    // Reports arrive independently; the merged state keeps all of them.
    mouse.set_translation(175, -350, 0);
    mouse.set_rotation(0, 0, 350);
    mouse.set_buttons(true, false);

    for report in mouse.poll() {
        let outcome = registry.apply_report(mouse.id(), &RawReportEvent::hid(&report));
        println!("report {:02x?} -> {:?}", report, outcome);
    }

    let Some(snap) = reader.snapshot() else {
        return;
    };
    let t = snap.vector3("translation");
    let r = snap.vector3("rotation");
    println!("translation = ({:.3}, {:.3}, {:.3})", t.x, t.y, t.z);
    println!("rotation    = ({:.3}, {:.3}, {:.3})", r.x, r.y, r.z);
    println!("button1 = {}, button2 = {}", snap.button("button1"), snap.button("button2"));

    registry.disconnect(mouse.id());
    let mut devices = [mouse];
    registry.flush_leds(&mut devices);
    println!("LED writes: {:02x?}", devices[0].written_reports());
    println!("after disconnect: {:?}", reader.phase());
}
