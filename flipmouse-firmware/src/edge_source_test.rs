extern crate std;

use embassy_futures::{block_on, select::select, yield_now};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use std::vec::Vec;

use super::*;
use crate::switch_test_stub::Pin;

fn drain<M: RawMutex>(raw: &RawEdges<M>) -> Vec<VbEdge> {
    raw.take().collect()
}

#[test]
fn latest_direction_wins() {
    let raw = RawEdges::<NoopRawMutex>::new();
    raw.set_press(3);
    raw.set_release(3);
    raw.set_press(1);
    raw.set_release(9);

    assert_eq!(
        drain(&raw),
        [VbEdge::press(1), VbEdge::release(3), VbEdge::release(9)]
    );
    assert!(raw.is_empty());

    raw.set_release(3);
    raw.set_press(3);
    assert_eq!(drain(&raw), [VbEdge::press(3)]);
}

#[test]
fn invalid_vb_ignored() {
    let raw = RawEdges::<NoopRawMutex>::new();
    raw.set_press(32);
    raw.set_press(0x7f);
    assert!(raw.is_empty());
}

#[test]
fn discard() {
    let raw = RawEdges::<NoopRawMutex>::new();
    raw.set_press(31);
    raw.discard();
    assert!(raw.is_empty());
    assert!(drain(&raw).is_empty());
}

#[test]
fn take_one_at_a_time() {
    let raw = RawEdges::<NoopRawMutex>::new();
    assert_eq!(raw.take_one(), None);
    raw.set_release(31);
    raw.set_release(2);
    raw.set_press(7);

    assert_eq!(raw.take_one(), Some(VbEdge::press(7)));
    assert_eq!(raw.take_one(), Some(VbEdge::release(2)));
    raw.set_press(2);
    assert_eq!(raw.take_one(), Some(VbEdge::press(2)));
    assert_eq!(raw.take_one(), Some(VbEdge::release(31)));
    assert_eq!(raw.take_one(), None);
    assert!(raw.is_empty());
}

#[test]
fn wait_returns_when_pending() {
    let raw = RawEdges::<NoopRawMutex>::new();
    block_on(async {
        raw.set_press(4);
        raw.wait().await;
        assert_eq!(drain(&raw), [VbEdge::press(4)]);
    });
}

#[test]
fn level_edges_report_changes_only() {
    let raw = RawEdges::<NoopRawMutex>::new();
    let mut levels = LevelEdges::new();

    assert!(!levels.update(&raw, 2, false));
    assert!(levels.update(&raw, 2, true));
    assert!(!levels.update(&raw, 2, true));
    assert!(levels.is_active(2));
    assert_eq!(drain(&raw), [VbEdge::press(2)]);

    assert!(levels.update(&raw, 2, false));
    assert_eq!(drain(&raw), [VbEdge::release(2)]);
    assert!(!levels.update(&raw, 40, true));
}

#[test]
fn threshold_hysteresis() {
    let raw = RawEdges::<NoopRawMutex>::new();
    let mut levels = LevelEdges::new();
    let sip = ThresholdInput {
        vb: 0,
        threshold: 400,
        hysteresis: 20,
        above: false,
    };

    sip.sample(&mut levels, &raw, 500);
    assert!(raw.is_empty());
    sip.sample(&mut levels, &raw, 399);
    assert_eq!(drain(&raw), [VbEdge::press(0)]);
    sip.sample(&mut levels, &raw, 410);
    assert!(raw.is_empty());
    sip.sample(&mut levels, &raw, 421);
    assert_eq!(drain(&raw), [VbEdge::release(0)]);

    let puff = ThresholdInput {
        vb: 1,
        threshold: 600,
        hysteresis: 20,
        above: true,
    };
    assert!(puff.is_active(601, false));
    assert!(!puff.is_active(600, false));
    assert!(puff.is_active(590, true));
    assert!(!puff.is_active(580, true));
}

#[test]
fn button_pins() {
    let raw = RawEdges::<NoopRawMutex>::new();
    let p1 = Pin::new(1);
    let p2 = Pin::new(2);
    let mut buttons = ButtonPins::new(&raw, [p1.clone(), p2.clone()], [0, 5]);

    block_on(async {
        select(buttons.run(), async {
            yield_now().await;
            assert!(raw.is_empty());

            p2.press();
            for _ in 0..5 {
                yield_now().await;
            }
            assert_eq!(drain(&raw), [VbEdge::press(5)]);

            p1.press();
            p2.release();
            for _ in 0..5 {
                yield_now().await;
            }
            assert_eq!(drain(&raw), [VbEdge::press(0), VbEdge::release(5)]);
        })
        .await;
    });
}
