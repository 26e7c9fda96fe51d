use core::{
    cell::RefCell,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
};

use embassy_sync::{
    blocking_mutex::{raw::RawMutex, Mutex},
    signal::Signal,
};
use flipmouse_common::globals::{
    self, DEADTIME_DEFAULT_MS, DEBOUNCE_DEADTIME, DEBOUNCE_PRESS, DEBOUNCE_RELEASE,
};

use crate::{
    registry::RegistryError,
    vb::{self, Direction, VbId},
    VB_MAX,
};

/// Debounce and deadtime values in milliseconds; zero means "not configured".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timings {
    pub press_ms: u16,
    pub release_ms: u16,
    pub deadtime_ms: u16,
}
impl Timings {
    pub const UNSET: Self = Self {
        press_ms: 0,
        release_ms: 0,
        deadtime_ms: 0,
    };

    pub const fn new(press_ms: u16, release_ms: u16, deadtime_ms: u16) -> Self {
        Self {
            press_ms,
            release_ms,
            deadtime_ms,
        }
    }

    /// Set one value by its global config id. Returns false for an unknown id.
    pub fn set(&mut self, id: u16, ms: u16) -> bool {
        match id {
            DEBOUNCE_PRESS => self.press_ms = ms,
            DEBOUNCE_RELEASE => self.release_ms = ms,
            DEBOUNCE_DEADTIME => self.deadtime_ms = ms,
            _ => return false,
        }
        true
    }

    fn for_direction(&self, dir: Direction) -> u16 {
        match dir {
            Direction::Press => self.press_ms,
            Direction::Release => self.release_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceConfig {
    pub global: Timings,
    pub per_vb: [Timings; VB_MAX],
}
impl Default for DebounceConfig {
    fn default() -> Self {
        Self::new()
    }
}
impl DebounceConfig {
    pub const fn new() -> Self {
        Self {
            global: Timings::UNSET,
            per_vb: [Timings::UNSET; VB_MAX],
        }
    }

    /// Resolved debounce time for a transition of `vb` in direction `dir`.
    pub fn debounce_ms(&self, vb: VbId, dir: Direction) -> u16 {
        let per_vb = self
            .per_vb
            .get(vb as usize)
            .map_or(0, |t| t.for_direction(dir));
        globals::resolve_debounce_ms(per_vb, self.global.for_direction(dir))
    }

    pub fn deadtime_ms(&self, vb: VbId) -> u16 {
        match self.per_vb.get(vb as usize) {
            Some(t) if t.deadtime_ms != 0 => t.deadtime_ms,
            _ if self.global.deadtime_ms != 0 => self.global.deadtime_ms,
            _ => DEADTIME_DEFAULT_MS,
        }
    }

    /// True if a release anti-tremor time is set for `vb`, either directly or globally.
    pub fn release_time_configured(&self, vb: VbId) -> bool {
        self.global.release_ms != 0
            || self
                .per_vb
                .get(vb as usize)
                .is_some_and(|t| t.release_ms != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stability {
    Stable,
    Reconfiguring,
}

/// The current debounce configuration and the stability gate. While the gate is
/// [`Stability::Reconfiguring`] nothing is debounced or dispatched.
pub struct ConfigSurface<M: RawMutex> {
    config: Mutex<M, RefCell<DebounceConfig>>,
    stable: AtomicBool,
    stable_signal: Signal<M, ()>,
    epoch: AtomicU32,
}
impl<M: RawMutex> Default for ConfigSurface<M> {
    fn default() -> Self {
        Self::new()
    }
}
impl<M: RawMutex> ConfigSurface<M> {
    pub const fn new() -> Self {
        Self {
            config: Mutex::new(RefCell::new(DebounceConfig::new())),
            stable: AtomicBool::new(true),
            stable_signal: Signal::new(),
            epoch: AtomicU32::new(0),
        }
    }

    pub fn stability(&self) -> Stability {
        if self.is_stable() {
            Stability::Stable
        } else {
            Stability::Reconfiguring
        }
    }

    pub fn is_stable(&self) -> bool {
        self.stable.load(Ordering::Acquire)
    }

    /// Counts the times the gate was set to [`Stability::Reconfiguring`]. Work started under an
    /// older epoch belongs to a replaced configuration.
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn set_stability(&self, stability: Stability) {
        let stable = matches!(stability, Stability::Stable);
        if !stable {
            self.epoch.fetch_add(1, Ordering::AcqRel);
        }
        if self.stable.swap(stable, Ordering::AcqRel) != stable {
            debug!("configuration {:?}", stability);
        }
        if stable {
            self.stable_signal.signal(());
        } else {
            self.stable_signal.reset();
        }
    }

    pub async fn wait_stable(&self) {
        while !self.is_stable() {
            self.stable_signal.wait().await;
        }
    }

    /// Run `f` against the current configuration.
    pub fn with<R>(&self, f: impl FnOnce(&DebounceConfig) -> R) -> R {
        self.config.lock(|c| f(&c.borrow()))
    }

    pub fn snapshot(&self) -> DebounceConfig {
        self.with(|c| c.clone())
    }

    /// Replace the whole timing record.
    pub fn install(&self, config: &DebounceConfig) {
        self.config.lock(|c| c.borrow_mut().clone_from(config));
    }

    pub fn set_global_timings(&self, timings: Timings) {
        self.config.lock(|c| c.borrow_mut().global = timings);
    }

    pub fn set_timings(&self, vb: VbId, timings: Timings) -> Result<(), RegistryError> {
        if !vb::is_valid(vb) {
            error!("timings for invalid vb {}", vb);
            return Err(RegistryError::OutOfRange(vb));
        }
        self.config
            .lock(|c| c.borrow_mut().per_vb[vb as usize] = timings);
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod test;
