extern crate std;

use embassy_futures::{
    block_on,
    select::{select, Either},
    yield_now,
};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use flipmouse_common::keycodes::key_range::{BASIC_A, BASIC_B};
use std::{string::String, vec::Vec};

use super::*;
use crate::{
    action::{Action, HidCommand},
    config::Timings,
    registry::Binding,
    time_driver_test_stub::advance_millis,
};

type Core = VbCore<NoopRawMutex>;

#[derive(Debug, PartialEq, Eq)]
enum RamError {
    Missing,
}

#[derive(Default)]
struct RamStore {
    slots: Vec<(String, SlotConfig)>,
}
impl SlotStore for RamStore {
    type Error = RamError;

    async fn load_bindings(&mut self, slot: &str) -> Result<SlotConfig, RamError> {
        self.slots
            .iter()
            .find(|(n, _)| n == slot)
            .map(|(_, c)| c.clone())
            .ok_or(RamError::Missing)
    }

    async fn store_bindings(&mut self, slot: &str, config: &SlotConfig) -> Result<(), RamError> {
        self.slots.retain(|(n, _)| n != slot);
        self.slots.push((slot.into(), config.clone()));
        Ok(())
    }
}

fn key(vb: u8, dirs: Directions, code: u8) -> Binding {
    Binding::new(vb, dirs, Action::hid(HidCommand::KeyPress(code)))
}

fn general(vb: u8, dirs: Directions) -> Binding {
    Binding::new(vb, dirs, Action::Calibrate)
}

#[test]
fn save_and_load() {
    let core = Core::new();
    let mut store = RamStore::default();
    block_on(async {
        core.bind_with_source(
            1,
            Directions::PRESS,
            Action::hid(HidCommand::KeyPress(BASIC_A)),
            "AT KP KEY_A",
            false,
        )
        .await
        .unwrap();
        core.bind(2, Directions::BOTH, Action::run_macro("MX 5").unwrap(), false)
            .await
            .unwrap();
        core.set_timings(2, Timings::new(80, 0, 0)).unwrap();
        core.save_slot(&mut store, "mouse").await.unwrap();
        let saved = core.snapshot().await.unwrap();
        assert_eq!(saved.hid.len(), 2);
        assert_eq!(saved.general.len(), 1);

        core.unbind(1).await.unwrap();
        core.unbind(2).await.unwrap();
        core.set_timings(2, Timings::UNSET).unwrap();
        assert!(!core.registry().is_active(1));

        core.load_slot(&mut store, "mouse").await.unwrap();
        assert_eq!(core.snapshot().await.unwrap(), saved);
        assert!(core.registry().hid().is_set(1, Direction::Release));
        assert!(core.registry().general().is_set(2, Direction::Press));
        assert_eq!(core.config().with(|c| c.debounce_ms(2, Direction::Press)), 80);
        assert_eq!(
            core.get_reverse_text(1).await.unwrap().as_deref(),
            Some("AT KP KEY_A")
        );
    });
    assert!(core.config().is_stable());
}

#[test]
fn missing_slot_changes_nothing() {
    let core = Core::new();
    let mut store = RamStore::default();
    block_on(async {
        core.bind(4, Directions::RELEASE, Action::Calibrate, false)
            .await
            .unwrap();
        assert_eq!(
            core.load_slot(&mut store, "none").await,
            Err(SlotError::Store(RamError::Missing))
        );
        assert!(core.registry().general().is_set(4, Direction::Release));
    });
    assert!(core.config().is_stable());
}

#[test]
fn overlap_is_kept_in_hid_chain() {
    let core = Core::new();
    let hid = [key(3, Directions::PRESS, BASIC_B)].into_iter().collect();
    let general = [general(3, Directions::BOTH), general(3, Directions::PRESS)]
        .into_iter()
        .collect();
    block_on(async {
        core.reload(SlotConfig {
            hid,
            general,
            timings: DebounceConfig::new(),
        })
        .await
        .unwrap();
        let snapshot = core.snapshot().await.unwrap();
        assert_eq!(snapshot.general.len(), 1);
        assert!(snapshot.general.contains(3, Direction::Release));
        assert!(!snapshot.general.contains(3, Direction::Press));
        assert!(!core.registry().general().is_set(3, Direction::Press));
        assert!(core.registry().hid().is_set(3, Direction::Press));
    });
}

#[test]
fn wrong_chain_bindings_dropped() {
    let core = Core::new();
    let hid = [general(1, Directions::PRESS), key(2, Directions::PRESS, BASIC_A)]
        .into_iter()
        .collect();
    let general = [key(5, Directions::RELEASE, BASIC_A)].into_iter().collect();
    block_on(async {
        core.reload(SlotConfig {
            hid,
            general,
            timings: DebounceConfig::new(),
        })
        .await
        .unwrap();
        let snapshot = core.snapshot().await.unwrap();
        assert_eq!(snapshot.hid.len(), 1);
        assert!(snapshot.hid.contains(2, Direction::Press));
        assert!(snapshot.general.is_empty());
    });
}

#[test]
fn failed_reload_stays_reconfiguring() {
    let core = Core::new();
    block_on(async {
        let guard = core.registry().hid().lock().await.unwrap();
        let result = select(core.reload(SlotConfig::default()), async {
            yield_now().await;
            advance_millis(25);
            core::future::pending::<()>().await;
        })
        .await;
        assert!(matches!(result, Either::First(Err(RegistryError::Busy))));
        assert!(!core.config().is_stable());
        drop(guard);

        core.reload(SlotConfig::default()).await.unwrap();
        assert!(core.config().is_stable());
    });
}
