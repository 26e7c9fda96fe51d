use core::future::Future;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::{
    config::{DebounceConfig, Stability},
    pipeline::VbCore,
    registry::{Chain, RegistryError},
    vb::{Direction, Directions},
};

/// Everything a configuration slot holds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlotConfig {
    pub hid: Chain,
    pub general: Chain,
    pub timings: DebounceConfig,
}

/// Persistent storage for slots. An empty slot name refers to the first stored slot.
pub trait SlotStore {
    type Error;

    fn load_bindings(&mut self, slot: &str)
        -> impl Future<Output = Result<SlotConfig, Self::Error>>;

    fn store_bindings(
        &mut self,
        slot: &str,
        config: &SlotConfig,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotError<E> {
    Registry(RegistryError),
    Store(E),
}
impl<E> From<RegistryError> for SlotError<E> {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl<M: RawMutex> VbCore<M> {
    /// Replace both chains and the timings. Nothing is debounced or dispatched until the new
    /// configuration is completely installed. If installing fails the gate stays
    /// [`Stability::Reconfiguring`] and the call can be retried.
    ///
    /// A (vb, direction) bound in both chains of `slot` is kept in the HID chain only.
    pub async fn reload(&self, slot: SlotConfig) -> Result<(), RegistryError> {
        self.set_stability(Stability::Reconfiguring);

        let SlotConfig {
            hid,
            general,
            timings,
        } = slot;
        let general: Chain = general
            .iter()
            .filter_map(|b| {
                let taken = [Direction::Press, Direction::Release]
                    .into_iter()
                    .filter(|d| hid.contains(b.vb, *d))
                    .fold(Directions::NONE, |acc, d| acc.union(d.into()));
                let mut b = b.clone();
                b.directions = b.directions.without(taken);
                if b.directions.is_empty() {
                    warn!("vb {} bound in both chains", b.vb);
                    None
                } else {
                    Some(b)
                }
            })
            .collect();

        let registry = self.registry();
        registry.hid().bulk_set(hid).await?;
        registry.general().bulk_set(general).await?;
        self.config().install(&timings);

        self.set_stability(Stability::Stable);
        info!("configuration reloaded");
        Ok(())
    }

    /// Copy the current chains and timings.
    pub async fn snapshot(&self) -> Result<SlotConfig, RegistryError> {
        let registry = self.registry();
        let hid = registry.hid().lock().await?;
        let general = registry.general().lock().await?;
        Ok(SlotConfig {
            hid: hid.clone(),
            general: general.clone(),
            timings: self.config().snapshot(),
        })
    }

    pub async fn load_slot<S: SlotStore>(
        &self,
        store: &mut S,
        slot: &str,
    ) -> Result<(), SlotError<S::Error>> {
        let config = store
            .load_bindings(slot)
            .await
            .map_err(SlotError::Store)?;
        Ok(self.reload(config).await?)
    }

    pub async fn save_slot<S: SlotStore>(
        &self,
        store: &mut S,
        slot: &str,
    ) -> Result<(), SlotError<S::Error>> {
        let config = self.snapshot().await?;
        store
            .store_bindings(slot, &config)
            .await
            .map_err(SlotError::Store)
    }
}

#[cfg(test)]
#[path = "slot_test.rs"]
mod test;
