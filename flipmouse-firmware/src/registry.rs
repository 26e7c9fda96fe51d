use core::sync::atomic::{AtomicU8, Ordering};

use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    mutex::{Mutex, MutexGuard},
};
use embassy_time::{with_timeout, Duration};
use flipmouse_common::globals::{CHAIN_CAPACITY, CHAIN_LOCK_TIMEOUT_MS, SOURCE_TEXT_MAX};

use crate::{
    action::{Action, PayloadTooLong},
    vb::{self, Direction, Directions, VbId},
    VB_MAX,
};

pub type SourceText = heapless::String<SOURCE_TEXT_MAX>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    OutOfRange(VbId),
    /// A binding has no direction to react to.
    NoDirection,
    OutOfMemory,
    NotFound,
    AlreadyEmpty,
    /// A chain lock could not be acquired in time or the configuration is being replaced.
    /// Retry later.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChainKind {
    Hid,
    General,
}

/// An action bound to one or both directions of a virtual button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub vb: VbId,
    pub directions: Directions,
    pub action: Action,
    /// The command text this binding was created from; used to save the slot.
    pub source: Option<SourceText>,
}
impl Binding {
    pub fn new(vb: VbId, directions: Directions, action: Action) -> Self {
        Self {
            vb,
            directions,
            action,
            source: None,
        }
    }

    pub fn with_source(mut self, text: &str) -> Result<Self, PayloadTooLong> {
        let mut source = SourceText::new();
        source.push_str(text).map_err(|_| PayloadTooLong)?;
        self.source = Some(source);
        Ok(self)
    }

    pub fn matches(&self, vb: VbId, dir: Direction) -> bool {
        self.vb == vb && self.directions.contains(dir)
    }
}

/// The bindings of one chain in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Chain(heapless::Vec<Binding, CHAIN_CAPACITY>);
impl Chain {
    pub const fn new() -> Self {
        Self(heapless::Vec::new())
    }

    pub fn push(&mut self, binding: Binding) -> Result<(), RegistryError> {
        self.0.push(binding).map_err(|_| RegistryError::OutOfMemory)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.0.iter()
    }

    pub fn matching(&self, vb: VbId, dir: Direction) -> impl Iterator<Item = &Binding> {
        self.0.iter().filter(move |b| b.matches(vb, dir))
    }

    pub fn contains(&self, vb: VbId, dir: Direction) -> bool {
        self.matching(vb, dir).next().is_some()
    }

    fn count_vb(&self, vb: VbId) -> usize {
        self.0.iter().filter(|b| b.vb == vb).count()
    }

    /// Remove every binding for `vb`. Returns true if anything was removed.
    fn remove_vb(&mut self, vb: VbId) -> bool {
        let len = self.0.len();
        self.0.retain(|b| b.vb != vb);
        len != self.0.len()
    }

    /// Remove `dirs` from the bindings of `vb`, dropping bindings left with no direction.
    fn narrow(&mut self, vb: VbId, dirs: Directions) -> bool {
        let mut changed = false;
        for b in self.0.iter_mut().filter(|b| b.vb == vb) {
            if b.directions.intersects(dirs) {
                b.directions = b.directions.without(dirs);
                changed = true;
            }
        }
        self.0.retain(|b| !b.directions.is_empty());
        changed
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}
impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Binding;
    type IntoIter = core::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
impl FromIterator<Binding> for Chain {
    /// Bindings beyond the chain capacity are dropped.
    fn from_iter<T: IntoIterator<Item = Binding>>(iter: T) -> Self {
        let mut chain = Chain::new();
        for b in iter {
            if chain.push(b).is_err() {
                warn!("chain full");
                break;
            }
        }
        chain
    }
}

const MASK_SIZE: usize = VB_MAX / 4;

/// Which (vb, direction) pairs have at least one binding. Byte `vb / 4` holds the four press
/// bits in its low nibble and the four release bits in its high nibble. Readable without the
/// chain lock.
pub struct ActiveVbMask([AtomicU8; MASK_SIZE]);
impl Default for ActiveVbMask {
    fn default() -> Self {
        Self::new()
    }
}
impl ActiveVbMask {
    pub const fn new() -> Self {
        Self([const { AtomicU8::new(0) }; MASK_SIZE])
    }

    #[inline]
    fn bit(vb: VbId, dir: Direction) -> u8 {
        let shift = (vb & 3) + if dir.is_press() { 0 } else { 4 };
        1 << shift
    }

    pub fn is_set(&self, vb: VbId, dir: Direction) -> bool {
        vb::is_valid(vb)
            && self.0[(vb >> 2) as usize].load(Ordering::Acquire) & Self::bit(vb, dir) != 0
    }

    pub fn is_active(&self, vb: VbId) -> bool {
        self.is_set(vb, Direction::Press) || self.is_set(vb, Direction::Release)
    }

    pub fn bytes(&self) -> [u8; MASK_SIZE] {
        core::array::from_fn(|i| self.0[i].load(Ordering::Acquire))
    }

    fn rebuild(&self, chain: &Chain) {
        let mut bytes = [0u8; MASK_SIZE];
        for b in chain {
            for dir in b.directions.iter() {
                bytes[(b.vb >> 2) as usize] |= Self::bit(b.vb, dir);
            }
        }
        for (m, v) in self.0.iter().zip(bytes) {
            m.store(v, Ordering::Release);
        }
    }
}

/// One chain behind its lock, plus its active mask.
pub struct ChainHandle<M: RawMutex> {
    kind: ChainKind,
    bindings: Mutex<M, Chain>,
    mask: ActiveVbMask,
}
impl<M: RawMutex> ChainHandle<M> {
    pub const fn new(kind: ChainKind) -> Self {
        Self {
            kind,
            bindings: Mutex::new(Chain::new()),
            mask: ActiveVbMask::new(),
        }
    }

    pub fn kind(&self) -> ChainKind {
        self.kind
    }

    pub fn mask(&self) -> &ActiveVbMask {
        &self.mask
    }

    /// Lock the chain, waiting at most the chain lock timeout.
    pub async fn lock(&self) -> Result<MutexGuard<'_, M, Chain>, RegistryError> {
        with_timeout(
            Duration::from_millis(CHAIN_LOCK_TIMEOUT_MS),
            self.bindings.lock(),
        )
        .await
        .map_err(|_| {
            warn!("{:?} chain lock timeout", self.kind);
            RegistryError::Busy
        })
    }

    pub fn is_active(&self, vb: VbId) -> bool {
        self.mask.is_active(vb)
    }

    pub fn is_set(&self, vb: VbId, dir: Direction) -> bool {
        self.mask.is_set(vb, dir)
    }

    pub async fn delete(&self, vb: VbId) -> Result<(), RegistryError> {
        check_vb(vb)?;
        let mut chain = self.lock().await?;
        if chain.remove_vb(vb) {
            self.mask.rebuild(&chain);
            Ok(())
        } else {
            Err(RegistryError::NotFound)
        }
    }

    pub async fn clear_all(&self) -> Result<(), RegistryError> {
        let mut chain = self.lock().await?;
        self.clear_locked(&mut chain)
    }

    fn clear_locked(&self, chain: &mut Chain) -> Result<(), RegistryError> {
        if chain.is_empty() {
            return Err(RegistryError::AlreadyEmpty);
        }
        chain.clear();
        self.mask.rebuild(chain);
        Ok(())
    }

    pub async fn bulk_get(&self) -> Result<Chain, RegistryError> {
        Ok(self.lock().await?.clone())
    }

    /// Replace the whole chain. Bindings with an invalid VB, no direction or an action that
    /// belongs in the other chain are dropped.
    pub async fn bulk_set(&self, incoming: Chain) -> Result<(), RegistryError> {
        let mut chain = self.lock().await?;
        let _ = self.clear_locked(&mut chain);
        for b in incoming.0 {
            if !vb::is_valid(b.vb) || b.directions.is_empty() || b.action.chain() != self.kind {
                error!("dropping binding for vb {} on {:?} chain", b.vb, self.kind);
                continue;
            }
            chain.push(b)?;
        }
        self.mask.rebuild(&chain);
        Ok(())
    }

    pub async fn reverse_text(&self, vb: VbId) -> Result<Option<SourceText>, RegistryError> {
        check_vb(vb)?;
        let chain = self.lock().await?;
        let text = chain
            .iter()
            .filter(|b| b.vb == vb)
            .find_map(|b| b.source.clone());
        Ok(text)
    }
}

fn check_vb(vb: VbId) -> Result<(), RegistryError> {
    if vb::is_valid(vb) {
        Ok(())
    } else {
        error!("invalid vb {}", vb);
        Err(RegistryError::OutOfRange(vb))
    }
}

/// The HID and general command chains. When both chain locks are needed the HID lock is
/// taken first.
pub struct Registry<M: RawMutex> {
    hid: ChainHandle<M>,
    general: ChainHandle<M>,
}
impl<M: RawMutex> Default for Registry<M> {
    fn default() -> Self {
        Self::new()
    }
}
impl<M: RawMutex> Registry<M> {
    pub const fn new() -> Self {
        Self {
            hid: ChainHandle::new(ChainKind::Hid),
            general: ChainHandle::new(ChainKind::General),
        }
    }

    pub fn chain(&self, kind: ChainKind) -> &ChainHandle<M> {
        match kind {
            ChainKind::Hid => &self.hid,
            ChainKind::General => &self.general,
        }
    }

    pub fn hid(&self) -> &ChainHandle<M> {
        &self.hid
    }

    pub fn general(&self) -> &ChainHandle<M> {
        &self.general
    }

    pub async fn add(&self, binding: Binding, replace: bool) -> Result<(), RegistryError> {
        self.add_all(core::slice::from_ref(&binding), replace).await
    }

    /// Add bindings for one VB to the chain their action belongs in. Either all are added or,
    /// on error, nothing changes.
    ///
    /// The directions they bind are removed from the other chain. With `replace` every
    /// existing binding of the VB is deleted from both chains first.
    pub async fn add_all(&self, bindings: &[Binding], replace: bool) -> Result<(), RegistryError> {
        let Some(first) = bindings.first() else {
            return Ok(());
        };
        let vb = first.vb;
        let kind = first.action.chain();
        let mut dirs = Directions::NONE;
        for b in bindings {
            check_vb(b.vb)?;
            if b.vb != vb || b.action.chain() != kind {
                error!("mixed bindings for vb {}", vb);
                return Err(RegistryError::OutOfRange(b.vb));
            }
            if b.directions.is_empty() {
                return Err(RegistryError::NoDirection);
            }
            dirs = dirs.union(b.directions);
        }

        let mut hid = self.hid.lock().await?;
        let mut general = self.general.lock().await?;
        let (own, own_handle, other, other_handle) = match kind {
            ChainKind::Hid => (&mut *hid, &self.hid, &mut *general, &self.general),
            ChainKind::General => (&mut *general, &self.general, &mut *hid, &self.hid),
        };

        let kept = own.len() - if replace { own.count_vb(vb) } else { 0 };
        if kept + bindings.len() > CHAIN_CAPACITY {
            warn!("{:?} chain full", kind);
            return Err(RegistryError::OutOfMemory);
        }

        let other_changed = if replace {
            own.remove_vb(vb);
            other.remove_vb(vb)
        } else {
            other.narrow(vb, dirs)
        };
        for b in bindings {
            own.push(b.clone())?;
        }
        own_handle.mask.rebuild(own);
        if other_changed {
            other_handle.mask.rebuild(other);
        }
        Ok(())
    }

    /// Delete every binding of `vb` from both chains.
    pub async fn delete(&self, vb: VbId) -> Result<(), RegistryError> {
        check_vb(vb)?;
        let mut hid = self.hid.lock().await?;
        let mut general = self.general.lock().await?;
        let hid_removed = hid.remove_vb(vb);
        let general_removed = general.remove_vb(vb);
        if hid_removed {
            self.hid.mask.rebuild(&hid);
        }
        if general_removed {
            self.general.mask.rebuild(&general);
        }
        if hid_removed || general_removed {
            Ok(())
        } else {
            Err(RegistryError::NotFound)
        }
    }

    /// The saved command text of the first binding of `vb`, searching the HID chain first.
    pub async fn reverse_text(&self, vb: VbId) -> Result<Option<SourceText>, RegistryError> {
        if let Some(text) = self.hid.reverse_text(vb).await? {
            return Ok(Some(text));
        }
        self.general.reverse_text(vb).await
    }

    pub fn is_active(&self, vb: VbId) -> bool {
        self.hid.is_active(vb) || self.general.is_active(vb)
    }

    pub fn is_bound(&self, vb: VbId, dir: Direction) -> bool {
        self.hid.is_set(vb, dir) || self.general.is_set(vb, dir)
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod test;
