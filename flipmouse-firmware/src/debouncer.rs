use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use flipmouse_common::globals::{is_immediate, RECONFIG_POLL_MS};

use crate::{
    pipeline::VbCore,
    vb::{self, Direction, VbEdge, VbId},
    VB_MAX,
};

/// Debounce timer state of one virtual button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerState {
    Idle,
    ArmedPress(Instant),
    ArmedRelease(Instant),
    Deadtime(Instant),
    /// A deadline could not be represented. The next raw edge re-arms.
    Error,
}
impl TimerState {
    fn deadline(&self) -> Option<Instant> {
        match *self {
            Self::ArmedPress(at) | Self::ArmedRelease(at) | Self::Deadtime(at) => Some(at),
            Self::Idle | Self::Error => None,
        }
    }
}

#[derive(Clone, Copy)]
struct Slot {
    state: TimerState,
    /// Raw edge seen while the timer could not be re-armed; armed once it ends.
    pending: Option<Direction>,
}
impl Slot {
    const IDLE: Self = Self {
        state: TimerState::Idle,
        pending: None,
    };
}

/// Turns raw edges into stable edges. One loop owns a timer slot per virtual button and sleeps
/// until the nearest deadline or the next raw edge.
pub struct Debouncer<'c, M: RawMutex> {
    core: &'c VbCore<M>,
    slots: [Slot; VB_MAX],
    epoch: u32,
}
impl<'c, M: RawMutex> Debouncer<'c, M> {
    pub fn new(core: &'c VbCore<M>) -> Self {
        Self {
            core,
            slots: [Slot::IDLE; VB_MAX],
            epoch: core.config().epoch(),
        }
    }

    pub fn state(&self, vb: VbId) -> TimerState {
        self.slots
            .get(vb as usize)
            .map_or(TimerState::Idle, |s| s.state)
    }

    pub async fn run(&mut self) -> ! {
        let core = self.core;
        loop {
            let config = core.config();
            if !config.is_stable() {
                self.cancel_all();
                self.epoch = config.epoch();
                core.raw().discard();
                let _ = with_timeout(
                    Duration::from_millis(RECONFIG_POLL_MS),
                    config.wait_stable(),
                )
                .await;
                continue;
            }

            match self.next_deadline() {
                Some(at) => {
                    select(core.raw().wait(), Timer::at(at)).await;
                }
                None => core.raw().wait().await,
            }

            if !config.is_stable() {
                continue;
            }
            self.sync_epoch();
            let now = Instant::now();
            self.expire(now);
            for edge in core.raw().take() {
                self.raw_edge(edge.vb(), edge.direction(), now);
            }
        }
    }

    /// Drop every running timer without publishing anything.
    pub fn cancel_all(&mut self) {
        if self.slots.iter().any(|s| s.state != TimerState::Idle) {
            debug!("cancel all debounce timers");
        }
        self.slots = [Slot::IDLE; VB_MAX];
    }

    /// Cancel every timer if the configuration was replaced since the last pass, even when
    /// the gate was closed too briefly to be seen.
    pub fn sync_epoch(&mut self) {
        let epoch = self.core.config().epoch();
        if epoch != self.epoch {
            self.epoch = epoch;
            self.cancel_all();
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().filter_map(|s| s.state.deadline()).min()
    }

    /// Handle one raw edge observed at `now`.
    pub fn raw_edge(&mut self, vb: VbId, dir: Direction, now: Instant) {
        if !vb::is_valid(vb) {
            error!("raw edge for invalid vb {}", vb);
            return;
        }
        let i = vb as usize;
        match (self.slots[i].state, dir) {
            (TimerState::Idle | TimerState::Error, _) => self.arm(vb, dir, now),
            (TimerState::ArmedPress(_), Direction::Press) => {}
            (TimerState::ArmedPress(_), Direction::Release) => {
                // the press was never confirmed; release anyway so nothing sticks
                self.slots[i] = Slot::IDLE;
                self.publish(vb, Direction::Release);
            }
            (TimerState::ArmedRelease(_), Direction::Release) => {
                self.slots[i].pending = None;
            }
            (TimerState::ArmedRelease(_), Direction::Press) => {
                if self
                    .core
                    .config()
                    .with(|c| c.release_time_configured(vb))
                {
                    self.slots[i] = Slot::IDLE;
                } else {
                    self.slots[i].pending = Some(Direction::Press);
                }
            }
            (TimerState::Deadtime(_), _) => {
                self.slots[i].pending = Some(dir);
            }
        }
    }

    /// Fire every deadline at or before `now`.
    pub fn expire(&mut self, now: Instant) {
        for i in 0..VB_MAX {
            let vb = i as VbId;
            match self.slots[i].state {
                TimerState::ArmedPress(at) if at <= now => self.confirm(vb, Direction::Press, now),
                TimerState::ArmedRelease(at) if at <= now => {
                    self.confirm(vb, Direction::Release, now)
                }
                TimerState::Deadtime(at) if at <= now => {
                    self.slots[i].state = TimerState::Idle;
                    self.arm_pending(vb, now);
                }
                _ => {}
            }
        }
    }

    fn confirm(&mut self, vb: VbId, dir: Direction, now: Instant) {
        self.publish(vb, dir);
        let deadtime = self.core.config().with(|c| c.deadtime_ms(vb));
        let slot = &mut self.slots[vb as usize];
        if deadtime == 0 {
            slot.state = TimerState::Idle;
            self.arm_pending(vb, now);
        } else {
            slot.state = match now.checked_add(Duration::from_millis(deadtime as u64)) {
                Some(at) => TimerState::Deadtime(at),
                None => {
                    error!("deadtime overflow for vb {}", vb);
                    TimerState::Error
                }
            };
        }
    }

    fn arm_pending(&mut self, vb: VbId, now: Instant) {
        if let Some(dir) = self.slots[vb as usize].pending.take() {
            self.arm(vb, dir, now);
        }
    }

    fn arm(&mut self, vb: VbId, dir: Direction, now: Instant) {
        let i = vb as usize;
        self.slots[i] = Slot::IDLE;
        if self.core.stable().level(vb) == dir {
            return;
        }
        let ms = self.core.config().with(|c| c.debounce_ms(vb, dir));
        if is_immediate(ms) {
            self.publish(vb, dir);
            return;
        }
        self.slots[i].state = match now.checked_add(Duration::from_millis(ms as u64)) {
            Some(at) if dir.is_press() => TimerState::ArmedPress(at),
            Some(at) => TimerState::ArmedRelease(at),
            None => {
                error!("debounce deadline overflow for vb {}", vb);
                TimerState::Error
            }
        };
    }

    fn publish(&self, vb: VbId, dir: Direction) {
        self.core.stable().publish(VbEdge::new(vb, dir));
    }
}

#[cfg(test)]
#[path = "debouncer_test.rs"]
mod test;
