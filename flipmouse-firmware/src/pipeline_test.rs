extern crate std;

use embassy_futures::{block_on, select::select, yield_now};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use flipmouse_common::keycodes::key_range::{BASIC_A, BASIC_B};
use std::vec::Vec;

use super::*;
use crate::{
    action::{HidCommand, HidPhase, HidReport},
    debouncer::{Debouncer, TimerState},
    dispatcher::{Dispatcher, HidExecutor},
    hid::{HidOutputs, HidRouting, ReportQueue},
    slot::SlotConfig,
    time_driver_test_stub::{advance_millis, set_time},
    VB_MAX,
};

type Core = VbCore<NoopRawMutex>;
type Queue = ReportQueue<NoopRawMutex, 8>;

async fn settle() {
    for _ in 0..20 {
        yield_now().await;
    }
}

fn drain_edges(core: &Core, kind: ChainKind) -> Vec<VbEdge> {
    let mut edges = Vec::new();
    while let Some(e) = core.stable().queue(kind).try_receive() {
        edges.push(e);
    }
    edges
}

fn drain(queue: &Queue) -> Vec<Vec<u8>> {
    let mut reports = Vec::new();
    while let Some(r) = queue.try_receive() {
        reports.push(r.to_vec());
    }
    reports
}

#[test]
fn debounced_press_reaches_usb() {
    set_time(5_000_000);
    let core = Core::new();
    let usb = Queue::new();
    let ble = Queue::new();
    let routing = HidRouting::new(true, false);
    let mut debouncer = Debouncer::new(&core);
    let mut hid = Dispatcher::new(
        &core,
        HidExecutor::new(HidOutputs::new(&usb, &ble, &routing)),
    );

    block_on(async {
        core.set_timings(5, Timings::new(50, 0, 0)).unwrap();
        core.bind(5, Directions::PRESS, Action::hid(HidCommand::KeyPress(BASIC_A)), false)
            .await
            .unwrap();

        select(debouncer.run(), select(hid.run(), async {
            core.notify_raw_edge(5, Direction::Press);
            settle().await;
            advance_millis(30);
            settle().await;
            assert!(usb.is_empty());

            advance_millis(30);
            settle().await;
            let reports = drain(&usb);
            assert_eq!(reports.len(), 1);
            assert_eq!(&reports[0][..3], &[6, 0, 16]);

            core.notify_raw_edge(5, Direction::Release);
            settle().await;
            advance_millis(60);
            settle().await;
            let reports = drain(&usb);
            assert_eq!(reports.len(), 1);
            assert_eq!(&reports[0][..3], &[6, 0, 0]);
        }))
        .await;
    });
    assert!(ble.is_empty());
    assert_eq!(hid.executor().emitted(), 2);
}

#[test]
fn short_press_only_releases() {
    set_time(1_000_000);
    let core = Core::new();
    let mut debouncer = Debouncer::new(&core);

    block_on(async {
        select(debouncer.run(), async {
            core.notify_raw_edge(2, Direction::Press);
            settle().await;
            advance_millis(8);
            core.notify_raw_edge(2, Direction::Release);
            settle().await;
            advance_millis(100);
            settle().await;
        })
        .await;
    });
    assert_eq!(drain_edges(&core, ChainKind::Hid), [VbEdge::release(2)]);
    assert_eq!(drain_edges(&core, ChainKind::General), [VbEdge::release(2)]);
    assert_eq!(debouncer.state(2), TimerState::Idle);
    assert!(!core.is_pressed(2));
}

#[test]
fn reconfiguring_emits_nothing() {
    set_time(1_000_000);
    let core = Core::new();
    let usb = Queue::new();
    let ble = Queue::new();
    let routing = HidRouting::new(true, true);
    let mut debouncer = Debouncer::new(&core);
    let mut hid = Dispatcher::new(
        &core,
        HidExecutor::new(HidOutputs::new(&usb, &ble, &routing)),
    );

    block_on(async {
        core.bind(1, Directions::BOTH, Action::hid(HidCommand::MouseWheel(-1)), false)
            .await
            .unwrap();
        core.set_stability(Stability::Reconfiguring);

        select(debouncer.run(), select(hid.run(), async {
            core.notify_raw_edge(1, Direction::Press);
            settle().await;
            for _ in 0..10 {
                advance_millis(20);
                settle().await;
            }
            core.stable().publish(VbEdge::press(1));
            settle().await;
        }))
        .await;
    });
    assert!(usb.is_empty());
    assert!(ble.is_empty());
}

#[test]
fn bind_adds_auto_release() {
    let core = Core::new();
    block_on(async {
        core.bind(5, Directions::PRESS, Action::hid(HidCommand::KeyPress(BASIC_B)), false)
            .await
            .unwrap();
        core.bind(6, Directions::BOTH, Action::hid(HidCommand::KeyToggle(BASIC_B)), false)
            .await
            .unwrap();
        core.bind(7, Directions::PRESS, Action::hid(HidCommand::MouseClick(1)), false)
            .await
            .unwrap();

        let hid = core.registry().hid().bulk_get().await.unwrap();
        let release: Vec<_> = hid.matching(5, Direction::Release).collect();
        assert_eq!(release.len(), 1);
        assert_eq!(
            release[0].action,
            Action::Hid(HidReport {
                command: HidCommand::KeyRelease(BASIC_B),
                phase: HidPhase::AutoRelease,
            })
        );
        assert_eq!(hid.matching(6, Direction::Release).count(), 1);
        assert!(!hid.contains(7, Direction::Release));
        assert_eq!(hid.len(), 4);
    });
}

#[test]
fn replace_moves_vb_between_chains() {
    let core = Core::new();
    block_on(async {
        core.bind(5, Directions::PRESS, Action::hid(HidCommand::KeyPress(BASIC_A)), false)
            .await
            .unwrap();
        core.bind(5, Directions::PRESS, Action::run_macro("KP KEY_B").unwrap(), true)
            .await
            .unwrap();

        let registry = core.registry();
        assert!(!registry.hid().is_active(5));
        assert!(registry.hid().bulk_get().await.unwrap().is_empty());
        assert!(registry.general().is_set(5, Direction::Press));
        assert!(!registry.is_bound(5, Direction::Release));
    });
}

#[test]
fn unbind() {
    let core = Core::new();
    block_on(async {
        assert_eq!(core.unbind(7).await, Err(RegistryError::NotFound));
        assert_eq!(core.unbind(40).await, Err(RegistryError::OutOfRange(40)));

        core.bind(7, Directions::RELEASE, Action::Calibrate, false)
            .await
            .unwrap();
        core.unbind(7).await.unwrap();
        assert!(!core.registry().is_active(7));
        assert_eq!(core.unbind(7).await, Err(RegistryError::NotFound));
    });
}

#[test]
fn reverse_text() {
    let core = Core::new();
    block_on(async {
        assert_eq!(core.get_reverse_text(3).await, Ok(None));
        core.bind_with_source(3, Directions::PRESS, Action::Calibrate, "AT CA", false)
            .await
            .unwrap();
        assert_eq!(
            core.get_reverse_text(3).await.unwrap().as_deref(),
            Some("AT CA")
        );

        let long = [b'x'; 300];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(
            core.bind_with_source(4, Directions::PRESS, Action::Calibrate, long, false)
                .await,
            Err(RegistryError::OutOfMemory)
        );
        assert!(!core.registry().is_active(4));
    });
}

#[test]
fn singleshot_queue_full() {
    let core = Core::new();
    for _ in 0..SINGLESHOT_QUEUE_SIZE {
        core.trigger_singleshot(Action::Calibrate).unwrap();
    }
    assert_eq!(
        core.trigger_singleshot(Action::Calibrate),
        Err(RegistryError::Busy)
    );
    core.trigger_singleshot(Action::hid(HidCommand::ReleaseAll))
        .unwrap();
    assert_eq!(core.singleshot(ChainKind::Hid).len(), 1);
    assert_eq!(
        core.singleshot(ChainKind::General).len(),
        SINGLESHOT_QUEUE_SIZE
    );
}

#[test]
fn stable_level_tracks_edges() {
    let core = Core::new();
    core.stable().publish(VbEdge::press(31));
    assert!(core.is_pressed(31));
    assert_eq!(core.stable().level(31), Direction::Press);
    core.stable().publish(VbEdge::release(31));
    assert!(!core.is_pressed(31));
    assert!(!core.is_pressed(32));
    assert_eq!(drain_edges(&core, ChainKind::Hid).len(), 2);
}

#[test]
fn release_survives_full_queue() {
    let core = Core::new();
    for vb in 0..EDGE_QUEUE_SIZE as u8 {
        core.stable().publish(VbEdge::press(vb));
    }
    core.stable().publish(VbEdge::release(0));
    core.stable().publish(VbEdge::press(20));
    core.stable().publish(VbEdge::release(20));
    assert_eq!(core.stable().queue(ChainKind::Hid).len(), EDGE_QUEUE_SIZE + 2);

    let edges = drain_edges(&core, ChainKind::Hid);
    assert_eq!(edges.len(), EDGE_QUEUE_SIZE + 2);
    assert_eq!(edges[..2], [VbEdge::press(0), VbEdge::press(1)]);
    assert_eq!(
        edges[EDGE_QUEUE_SIZE..],
        [VbEdge::release(0), VbEdge::release(20)]
    );
    assert_eq!(drain_edges(&core, ChainKind::General), edges);
    assert!(!core.is_pressed(0));

    core.stable().publish(VbEdge::press(5));
    assert_eq!(drain_edges(&core, ChainKind::Hid), [VbEdge::press(5)]);
}

#[test]
fn reload_drops_raw_edge_not_yet_debounced() {
    set_time(1_000_000);
    let core = Core::new();
    let mut debouncer = Debouncer::new(&core);

    block_on(async {
        select(debouncer.run(), async {
            core.notify_raw_edge(1, Direction::Press);
            core.reload(SlotConfig::default()).await.unwrap();
            settle().await;
            advance_millis(60);
            settle().await;
        })
        .await;
    });
    assert!(drain_edges(&core, ChainKind::Hid).is_empty());
    assert!(!core.is_pressed(1));
}

#[test]
fn reload_cancels_armed_timer() {
    set_time(1_000_000);
    let core = Core::new();
    let mut debouncer = Debouncer::new(&core);

    block_on(async {
        select(debouncer.run(), async {
            core.notify_raw_edge(1, Direction::Press);
            settle().await;
            core.reload(SlotConfig::default()).await.unwrap();
            advance_millis(60);
            settle().await;
            assert!(drain_edges(&core, ChainKind::Hid).is_empty());

            core.notify_raw_edge(2, Direction::Press);
            settle().await;
            advance_millis(60);
            settle().await;
        })
        .await;
    });
    assert_eq!(debouncer.state(1), TimerState::Idle);
    assert_eq!(drain_edges(&core, ChainKind::Hid), [VbEdge::press(2)]);
    assert!(!core.is_pressed(1));
}

#[test]
fn reload_drops_undispatched_edges() {
    let core = Core::new();
    core.stable().publish(VbEdge::press(3));
    core.stable().publish(VbEdge::release(3));
    block_on(core.reload(SlotConfig::default())).unwrap();
    assert!(core.stable().queue(ChainKind::Hid).is_empty());
    assert!(core.stable().queue(ChainKind::General).is_empty());
}

#[test]
fn every_vb_holds_a_key() {
    let core = Core::new();
    block_on(async {
        for vb in 0..VB_MAX as u8 {
            core.bind(vb, Directions::PRESS, Action::hid(HidCommand::KeyPress(BASIC_A)), false)
                .await
                .unwrap();
        }
        let hid = core.registry().hid().bulk_get().await.unwrap();
        assert_eq!(hid.len(), 2 * VB_MAX);
        assert!(core.registry().hid().is_set(31, Direction::Release));
    });
}
