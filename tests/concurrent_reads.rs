use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use spacenav_hid::backends::virtual_input::SPACE_NAVIGATOR_DESCRIPTOR;
use spacenav_hid::descriptor;
use spacenav_hid::{DescriptorSource, LayoutBuilder, RawReportEvent, StateMergeEngine};

const READERS: usize = 4;
const WRITES: usize = 20_000;

#[test]
fn readers_never_observe_half_applied_reports() {
    let elements = descriptor::parse(DescriptorSource::Binary(SPACE_NAVIGATOR_DESCRIPTOR)).unwrap();
    let layout = Arc::new(LayoutBuilder::new("SpaceNavigator").build(&elements).unwrap());
    let mut engine = StateMergeEngine::new(layout);
    let done = AtomicBool::new(false);

    let zeros = [1u8, 0, 0, 0, 0, 0, 0];
    let ones = [1u8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

    thread::scope(|s| {
        let mut readers = Vec::new();
        for _ in 0..READERS {
            let reader = engine.reader();
            let done = &done;
            readers.push(s.spawn(move || {
                let mut reads = 0u64;
                loop {
                    let x = reader.read_raw("translation/x");
                    assert!(matches!(x, Some(0) | Some(-1)), "torn read: {x:?}");
                    reads += 1;
                    if done.load(Ordering::Acquire) {
                        return reads;
                    }
                }
            }));
        }

        for i in 0..WRITES {
            let report = if i % 2 == 0 { &ones[..] } else { &zeros[..] };
            assert!(engine.apply_report(&RawReportEvent::hid(report)).is_applied());
        }
        done.store(true, Ordering::Release);

        for r in readers {
            assert!(r.join().unwrap() > 0);
        }
    });
    assert_eq!(engine.reader().reports_applied(), WRITES as u64);
}
