use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Channel};

use crate::{
    action::Action,
    config::{ConfigSurface, Stability, Timings},
    edge_source::RawEdges,
    registry::{Binding, ChainKind, Registry, RegistryError, SourceText},
    vb::{self, vb_bit, Direction, Directions, VbEdge, VbId},
};

pub const EDGE_QUEUE_SIZE: usize = 16;
pub const SINGLESHOT_QUEUE_SIZE: usize = 4;

pub type SingleshotQueue<M> = Channel<M, Action, SINGLESHOT_QUEUE_SIZE>;

/// Fired edges waiting for one dispatcher. Edges are queued in order; once the queue is full
/// they coalesce per VB in an overflow bitmap (latest direction wins) until the dispatcher has
/// drained it, so a release is never lost.
pub struct EdgeLane<M: RawMutex> {
    queue: Channel<M, VbEdge, EDGE_QUEUE_SIZE>,
    overflow: RawEdges<M>,
}
impl<M: RawMutex> Default for EdgeLane<M> {
    fn default() -> Self {
        Self::new()
    }
}
impl<M: RawMutex> EdgeLane<M> {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            overflow: RawEdges::new(),
        }
    }

    pub fn push(&self, edge: VbEdge) {
        if self.overflow.is_empty() && self.queue.try_send(edge).is_ok() {
            return;
        }
        debug!("edge queue full, coalescing {:?}", edge);
        self.overflow.notify(edge.vb(), edge.direction());
    }

    pub fn try_receive(&self) -> Option<VbEdge> {
        match self.queue.try_receive() {
            Ok(edge) => Some(edge),
            Err(_) => self.overflow.take_one(),
        }
    }

    pub async fn receive(&self) -> VbEdge {
        match self.try_receive() {
            Some(edge) => edge,
            None => self.queue.receive().await,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len() + self.overflow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.overflow.is_empty()
    }

    fn discard(&self) {
        while self.queue.try_receive().is_ok() {}
        self.overflow.discard();
    }
}

/// Debounced button levels and the per chain lanes of fired edges. Only the debouncer
/// publishes here.
pub struct StableEdges<M: RawMutex> {
    level: AtomicU32,
    hid: EdgeLane<M>,
    general: EdgeLane<M>,
}
impl<M: RawMutex> Default for StableEdges<M> {
    fn default() -> Self {
        Self::new()
    }
}
impl<M: RawMutex> StableEdges<M> {
    pub const fn new() -> Self {
        Self {
            level: AtomicU32::new(0),
            hid: EdgeLane::new(),
            general: EdgeLane::new(),
        }
    }

    pub fn publish(&self, edge: VbEdge) {
        let bit = vb_bit(edge.vb());
        if edge.is_press() {
            self.level.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.level.fetch_and(!bit, Ordering::AcqRel);
        }
        debug!("stable {:?}", edge);
        self.hid.push(edge);
        self.general.push(edge);
    }

    /// The debounced level of `vb`.
    pub fn is_pressed(&self, vb: VbId) -> bool {
        vb::is_valid(vb) && self.level.load(Ordering::Acquire) & vb_bit(vb) != 0
    }

    pub fn level(&self, vb: VbId) -> Direction {
        if self.is_pressed(vb) {
            Direction::Press
        } else {
            Direction::Release
        }
    }

    pub fn queue(&self, kind: ChainKind) -> &EdgeLane<M> {
        match kind {
            ChainKind::Hid => &self.hid,
            ChainKind::General => &self.general,
        }
    }

    /// Drop every fired edge not yet dispatched. Levels are kept.
    pub fn discard(&self) {
        self.hid.discard();
        self.general.discard();
    }
}

/// Everything shared between edge sources, the debouncer, the dispatchers and the command
/// front door.
pub struct VbCore<M: RawMutex> {
    raw: RawEdges<M>,
    stable: StableEdges<M>,
    registry: Registry<M>,
    config: ConfigSurface<M>,
    hid_singleshot: SingleshotQueue<M>,
    general_singleshot: SingleshotQueue<M>,
}
impl<M: RawMutex> Default for VbCore<M> {
    fn default() -> Self {
        Self::new()
    }
}
impl<M: RawMutex> VbCore<M> {
    pub const fn new() -> Self {
        Self {
            raw: RawEdges::new(),
            stable: StableEdges::new(),
            registry: Registry::new(),
            config: ConfigSurface::new(),
            hid_singleshot: Channel::new(),
            general_singleshot: Channel::new(),
        }
    }

    pub fn raw(&self) -> &RawEdges<M> {
        &self.raw
    }

    pub fn stable(&self) -> &StableEdges<M> {
        &self.stable
    }

    pub fn registry(&self) -> &Registry<M> {
        &self.registry
    }

    pub fn config(&self) -> &ConfigSurface<M> {
        &self.config
    }

    pub fn singleshot(&self, kind: ChainKind) -> &SingleshotQueue<M> {
        match kind {
            ChainKind::Hid => &self.hid_singleshot,
            ChainKind::General => &self.general_singleshot,
        }
    }

    /// Bind `action` to `directions` of `vb`. A HID command that holds something down, bound to
    /// press only, also gets the matching release bound to the release direction.
    pub async fn bind(
        &self,
        vb: VbId,
        directions: Directions,
        action: Action,
        replace: bool,
    ) -> Result<(), RegistryError> {
        self.add_binding(Binding::new(vb, directions, action), replace)
            .await
    }

    /// Like [`Self::bind`] but keeps `source` so the binding can be saved as text.
    pub async fn bind_with_source(
        &self,
        vb: VbId,
        directions: Directions,
        action: Action,
        source: &str,
        replace: bool,
    ) -> Result<(), RegistryError> {
        let binding = Binding::new(vb, directions, action)
            .with_source(source)
            .map_err(|_| RegistryError::OutOfMemory)?;
        self.add_binding(binding, replace).await
    }

    async fn add_binding(&self, binding: Binding, replace: bool) -> Result<(), RegistryError> {
        let release = match &binding.action {
            Action::Hid(report) if binding.directions == Directions::PRESS => report
                .auto_release()
                .map(|r| Binding::new(binding.vb, Directions::RELEASE, Action::Hid(r))),
            _ => None,
        };
        match release {
            Some(release) => self.registry.add_all(&[binding, release], replace).await,
            None => self.registry.add(binding, replace).await,
        }
    }

    pub async fn unbind(&self, vb: VbId) -> Result<(), RegistryError> {
        self.registry.delete(vb).await
    }

    /// Queue `action` on the dispatcher that owns its kind; it runs without consulting any
    /// binding.
    pub fn trigger_singleshot(&self, action: Action) -> Result<(), RegistryError> {
        self.singleshot(action.chain())
            .try_send(action)
            .map_err(|_| {
                warn!("singleshot queue full");
                RegistryError::Busy
            })
    }

    pub async fn get_reverse_text(&self, vb: VbId) -> Result<Option<SourceText>, RegistryError> {
        self.registry.reverse_text(vb).await
    }

    pub fn notify_raw_edge(&self, vb: VbId, dir: Direction) {
        self.raw.notify(vb, dir);
    }

    /// Open or close the stability gate. Entering [`Stability::Reconfiguring`] starts a new
    /// configuration epoch: fired edges not yet dispatched are dropped and the debouncer
    /// cancels its timers on its next pass. Raw edges seen before either transition are
    /// dropped.
    pub fn set_stability(&self, stability: Stability) {
        self.config.set_stability(stability);
        if stability == Stability::Reconfiguring {
            self.stable.discard();
        }
        self.raw.discard();
    }

    pub fn is_pressed(&self, vb: VbId) -> bool {
        self.stable.is_pressed(vb)
    }

    pub fn set_timings(&self, vb: VbId, timings: Timings) -> Result<(), RegistryError> {
        self.config.set_timings(vb, timings)
    }

    pub fn set_global_timings(&self, timings: Timings) {
        self.config.set_global_timings(timings);
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod test;
