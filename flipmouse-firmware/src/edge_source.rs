use core::{pin::pin, sync::atomic::Ordering};

use embassy_futures::select::select_slice;
use embassy_sync::{blocking_mutex::raw::RawMutex, signal::Signal};
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;
use portable_atomic::AtomicU64;

use crate::{
    vb::{self, vb_bit, Direction, VbEdge, VbId},
    VB_MAX,
};

/// Raw, undebounced edges waiting for the debouncer. Low 32 bits hold pending presses and high 32
/// bits pending releases; a newer edge for a VB replaces the opposite one still waiting.
pub struct RawEdges<M: RawMutex> {
    pending: AtomicU64,
    signal: Signal<M, ()>,
}
impl<M: RawMutex> Default for RawEdges<M> {
    fn default() -> Self {
        Self::new()
    }
}
impl<M: RawMutex> RawEdges<M> {
    pub const fn new() -> Self {
        Self {
            pending: AtomicU64::new(0),
            signal: Signal::new(),
        }
    }

    /// Record a raw edge. Safe to call from interrupt context.
    pub fn notify(&self, vb: VbId, dir: Direction) {
        if !vb::is_valid(vb) {
            error!("raw edge for invalid vb {}", vb);
            return;
        }
        let bit = vb_bit(vb) as u64;
        let (set, clear) = match dir {
            Direction::Press => (bit, bit << 32),
            Direction::Release => (bit << 32, bit),
        };
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some((v & !clear) | set)
            });
        self.signal.signal(());
    }

    pub fn set_press(&self, vb: VbId) {
        self.notify(vb, Direction::Press);
    }

    pub fn set_release(&self, vb: VbId) {
        self.notify(vb, Direction::Release);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0
    }

    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Acquire).count_ones() as usize
    }

    /// Take every pending edge, presses first in VB order.
    pub fn take(&self) -> PendingEdges {
        PendingEdges(self.pending.swap(0, Ordering::AcqRel))
    }

    /// Take the lowest pending edge, presses before releases.
    pub fn take_one(&self) -> Option<VbEdge> {
        let prev = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (v != 0).then(|| v & (v - 1))
            })
            .ok()?;
        PendingEdges(prev & prev.wrapping_neg()).next()
    }

    /// Drop pending edges; used while the configuration is being rebuilt.
    pub fn discard(&self) {
        if self.pending.swap(0, Ordering::AcqRel) != 0 {
            debug!("discarded raw edges");
        }
        self.signal.reset();
    }

    pub async fn wait(&self) {
        if self.is_empty() {
            self.signal.wait().await;
        } else {
            self.signal.reset();
        }
    }
}

pub struct PendingEdges(u64);
impl Iterator for PendingEdges {
    type Item = VbEdge;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            return None;
        }
        let i = self.0.trailing_zeros();
        self.0 &= !(1 << i);
        Some(if i < 32 {
            VbEdge::press(i as u8)
        } else {
            VbEdge::release((i - 32) as u8)
        })
    }
}

/// Converts periodically sampled levels into edges; only changes are forwarded.
pub struct LevelEdges {
    levels: u32,
}
impl Default for LevelEdges {
    fn default() -> Self {
        Self::new()
    }
}
impl LevelEdges {
    pub const fn new() -> Self {
        Self { levels: 0 }
    }

    pub fn update<M: RawMutex>(&mut self, raw: &RawEdges<M>, vb: VbId, active: bool) -> bool {
        if !vb::is_valid(vb) {
            error!("level for invalid vb {}", vb);
            return false;
        }
        let bit = vb_bit(vb);
        if (self.levels & bit != 0) == active {
            return false;
        }
        if active {
            self.levels |= bit;
            raw.set_press(vb);
        } else {
            self.levels &= !bit;
            raw.set_release(vb);
        }
        true
    }

    pub fn is_active(&self, vb: VbId) -> bool {
        vb::is_valid(vb) && self.levels & vb_bit(vb) != 0
    }
}

/// Maps an analog reading (pressure, stick deflection) to a VB with hysteresis.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdInput {
    pub vb: VbId,
    pub threshold: i32,
    pub hysteresis: i32,
    /// Active when the value rises above the threshold; otherwise when it falls below.
    pub above: bool,
}
impl ThresholdInput {
    pub fn is_active(&self, value: i32, was_active: bool) -> bool {
        let limit = if was_active {
            if self.above {
                self.threshold - self.hysteresis
            } else {
                self.threshold + self.hysteresis
            }
        } else {
            self.threshold
        };
        if self.above {
            value > limit
        } else {
            value < limit
        }
    }

    pub fn sample<M: RawMutex>(&self, levels: &mut LevelEdges, raw: &RawEdges<M>, value: i32) {
        let active = self.is_active(value, levels.is_active(self.vb));
        levels.update(raw, self.vb, active);
    }
}

/// Active low button inputs, each mapped to a VB.
pub struct ButtonPins<'c, M: RawMutex, I: InputPin + Wait, const N: usize> {
    raw: &'c RawEdges<M>,
    pins: [I; N],
    vbs: [VbId; N],
    levels: LevelEdges,
}
impl<'c, M: RawMutex, I: InputPin + Wait, const N: usize> ButtonPins<'c, M, I, N> {
    pub fn new(raw: &'c RawEdges<M>, pins: [I; N], vbs: [VbId; N]) -> Self {
        debug_assert!(N <= VB_MAX);
        Self {
            raw,
            pins,
            vbs,
            levels: LevelEdges::new(),
        }
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.sample();
            self.wait_for_change().await;
        }
    }

    pub fn sample(&mut self) {
        for (pin, vb) in self.pins.iter_mut().zip(self.vbs.iter()) {
            if let Ok(low) = pin.is_low() {
                self.levels.update(self.raw, *vb, low);
            }
        }
    }

    async fn wait_for_change(&mut self) {
        if N == 0 {
            return core::future::pending().await;
        }
        let mut futs = self.pins.each_mut().map(|pin| pin.wait_for_any_edge());
        let _ = select_slice(pin!(futs.as_mut_slice())).await;
    }
}

#[cfg(test)]
#[path = "edge_source_test.rs"]
mod test;
