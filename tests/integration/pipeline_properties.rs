//! Property-based tests for script splitting and image alignment

use crate::integration::MockPort;
use proptest::prelude::*;
use reelgen::pipeline::images::generate_image_sets;
use reelgen::pipeline::{FanOutOptions, Script};
use std::time::Duration;

fn paragraph_text() -> impl Strategy<Value = String> {
    "[a-z]{1,12}( [a-z]{1,12}){0,4}"
}

/// Parsing keeps exactly the non-blank lines, trimmed, in order.
#[test]
fn script_parse_keeps_non_blank_lines_in_order() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &prop::collection::vec(
                prop_oneof![paragraph_text(), Just(String::new()), Just("   ".to_string())],
                0..12,
            ),
            |lines| {
                let text = lines
                    .iter()
                    .map(|l| format!("  {}\t", l))
                    .collect::<Vec<_>>()
                    .join("\n");
                let script = Script::parse(&text);
                let expected: Vec<String> = lines
                    .iter()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect();
                prop_assert_eq!(script.paragraphs(), expected.as_slice());
                prop_assert_eq!(script.is_empty(), expected.is_empty());
                Ok(())
            },
        )
        .unwrap();
}

/// Image sets line up with paragraphs whatever order the calls resolve in.
#[test]
fn image_sets_align_with_paragraphs_under_random_delays() {
    let mut runner = proptest::test_runner::TestRunner::new(proptest::test_runner::Config {
        cases: 48,
        ..Default::default()
    });

    runner
        .run(
            &prop::collection::vec((0u64..500, 1usize..4), 1..8),
            |plan| {
                let paragraphs: Vec<String> =
                    (0..plan.len()).map(|i| format!("paragraph {}", i)).collect();
                let refs: Vec<&str> = paragraphs.iter().map(String::as_str).collect();

                let mut port = MockPort::new(&refs).with_images_per_paragraph(plan[0].1);
                for (paragraph, (delay_ms, _)) in paragraphs.iter().zip(&plan) {
                    port = port.with_image_delay(paragraph, Duration::from_millis(*delay_ms));
                }
                let script = Script::parse(&paragraphs.join("\n"));

                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .start_paused(true)
                    .build()
                    .unwrap();
                let sets = rt
                    .block_on(generate_image_sets(
                        &port,
                        &script,
                        FanOutOptions::default(),
                        |_| {},
                    ))
                    .unwrap();

                prop_assert_eq!(sets.len(), paragraphs.len());
                for (i, set) in sets.iter().enumerate() {
                    prop_assert_eq!(set.paragraph_index, i);
                    prop_assert_eq!(&set.paragraph, &paragraphs[i]);
                    prop_assert_eq!(&set.images[0], &MockPort::image_for(&paragraphs[i], 0));
                }
                Ok(())
            },
        )
        .unwrap();
}
