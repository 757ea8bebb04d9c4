use std::sync::Arc;

use proptest::prelude::*;

use spacenav_hid::descriptor::{ElementFlags, ReportElementDescriptor, ReportType, UsagePage};
use spacenav_hid::layout::make_unique_name;
use spacenav_hid::number::{int_to_normalized_float, uint_to_normalized_float};
use spacenav_hid::{usage, LayoutBuilder, RawReportEvent, StateMergeEngine};

fn axis(usage: u16, report_id: u8, offset: u32) -> ReportElementDescriptor {
    ReportElementDescriptor {
        usage_page: UsagePage::GENERIC_DESKTOP,
        usage,
        report_id,
        report_type: ReportType::Input,
        report_offset_in_bits: offset,
        report_size_in_bits: 16,
        logical_min: -350,
        logical_max: 350,
        flags: ElementFlags(ElementFlags::VARIABLE),
        ..Default::default()
    }
}

/// Three reports of three 16-bit axes each.
fn engine() -> StateMergeEngine {
    let mut elements = Vec::new();
    let usages = [
        [usage::X, usage::Y, usage::Z],
        [usage::RX, usage::RY, usage::RZ],
        [usage::VX, usage::VY, usage::VZ],
    ];
    for (i, group) in usages.iter().enumerate() {
        for (j, &u) in group.iter().enumerate() {
            elements.push(axis(u, i as u8 + 1, j as u32 * 16));
        }
    }
    let layout = LayoutBuilder::new("props").build(&elements).unwrap();
    StateMergeEngine::new(Arc::new(layout))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn normalized_values_stay_in_unit_range(v in any::<i32>(), a in any::<i32>(), b in any::<i32>()) {
        let (min, max) = (a.min(b) as i64, a.max(b) as i64);
        let n = int_to_normalized_float(v as i64, min, max);
        prop_assert!((0.0..=1.0).contains(&n));
    }

    #[test]
    fn clamping_is_exact_at_and_past_bounds(min in 0u32..1000, span in 1u32..100_000, past in 0u64..1000) {
        let min = min as u64;
        let max = min + span as u64;
        prop_assert_eq!(uint_to_normalized_float(max + past, min, max), 1.0);
        prop_assert_eq!(uint_to_normalized_float(min.saturating_sub(past), min, max), 0.0);
        prop_assert_eq!(int_to_normalized_float(-(past as i64), 0, span as i64), 0.0);
    }

    #[test]
    fn normalization_is_monotonic(a in 0i64..=1023, b in 0i64..=1023) {
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assert!(int_to_normalized_float(lo, 0, 1023) <= int_to_normalized_float(hi, 0, 1023));
    }

    #[test]
    fn merge_touches_only_the_reports_own_slot(
        reports in prop::collection::vec((1u8..=3, prop::collection::vec(any::<u8>(), 0..12)), 1..20),
    ) {
        let mut engine = engine();
        let slot = engine.layout().geometry().report_size as usize;
        let mut expected = engine.reader().snapshot().unwrap().into_bytes().to_vec();

        for (id, body) in &reports {
            let mut data = vec![*id];
            data.extend_from_slice(body);
            engine.apply_report(&RawReportEvent::hid(&data));

            let start = (*id as usize - 1) * slot;
            let len = body.len().min(6);
            expected[start..start + len].copy_from_slice(&body[..len]);
        }

        let actual = engine.reader().snapshot().unwrap().into_bytes();
        prop_assert_eq!(&*actual, &expected[..]);
        // the reserved byte at the end of every slot is never written
        for i in 0..3 {
            prop_assert_eq!(actual[i * slot + slot - 1], 0);
        }
    }

    #[test]
    fn unknown_reports_leave_the_state_identical(id in 4u8..=255, body in prop::collection::vec(any::<u8>(), 0..16)) {
        let mut engine = engine();
        engine.apply_report(&RawReportEvent::hid(&[1, 1, 2, 3, 4, 5, 6]));
        let before = engine.reader().snapshot().unwrap().into_bytes();

        let mut data = vec![id];
        data.extend_from_slice(&body);
        engine.apply_report(&RawReportEvent::hid(&data));
        prop_assert_eq!(engine.reader().snapshot().unwrap().into_bytes(), before);
    }

    #[test]
    fn unique_names_never_collide(bases in prop::collection::vec("[a-cA-C]{1,2}[0-9]{0,2}", 1..30)) {
        let mut names: Vec<String> = Vec::new();
        for base in &bases {
            let name = make_unique_name(base, names.iter().map(String::as_str));
            prop_assert!(!names.iter().any(|n| n.eq_ignore_ascii_case(&name)));
            names.push(name);
        }
    }
}
