use core::future::Future;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::{
    action::{Action, SlotToken},
    hid::{HidOutputs, HidReports},
    pipeline::VbCore,
    registry::ChainKind,
    vb::VbEdge,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrError {
    NotFound,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExecError {
    QueueFull,
    Ir(IrError),
    /// The action belongs to the other dispatcher.
    Unsupported,
}

/// Entry points of the services general actions are forwarded to. Each call only hands the
/// request over; implementations do their own failure handling and must not block for long.
pub trait Collaborators {
    fn run_macro(&self, text: &str);
    fn send_ir(&self, name: &str) -> Result<(), IrError>;
    /// Called with the general chain locked, so a slot change must be queued rather than
    /// reloading the bindings straight away.
    fn request_slot_change(&self, token: SlotToken<'_>);
    fn calibrate(&self);
    fn mqtt_publish(&self, topic_payload: &str);
    fn http_get(&self, url: &str);
}

/// Runs the actions of one chain.
pub trait ActionExecutor {
    const CHAIN: ChainKind;

    fn execute(&mut self, action: &Action) -> impl Future<Output = Result<(), ExecError>>;
}

/// Owns the HID report buffers; the only code that mutates them.
pub struct HidExecutor<'c, M: RawMutex, const N: usize> {
    reports: HidReports,
    outputs: HidOutputs<'c, M, N>,
    emitted: usize,
}
impl<'c, M: RawMutex, const N: usize> HidExecutor<'c, M, N> {
    pub fn new(outputs: HidOutputs<'c, M, N>) -> Self {
        Self {
            reports: HidReports::new(),
            outputs,
            emitted: 0,
        }
    }

    pub fn reports(&self) -> &HidReports {
        &self.reports
    }

    /// Number of reports accepted by a transport queue.
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}
impl<M: RawMutex, const N: usize> ActionExecutor for HidExecutor<'_, M, N> {
    const CHAIN: ChainKind = ChainKind::Hid;

    async fn execute(&mut self, action: &Action) -> Result<(), ExecError> {
        let Action::Hid(report) = action else {
            return Err(ExecError::Unsupported);
        };
        let mut result = Ok(());
        for bytes in self.reports.apply(report.command) {
            match self.outputs.transmit(&bytes).await {
                Ok(n) => self.emitted += n,
                Err(_) => result = Err(ExecError::QueueFull),
            }
        }
        debug!("{:?} emitted {}", report, self.emitted);
        result
    }
}

pub struct GeneralExecutor<'c, C: Collaborators + ?Sized> {
    collaborators: &'c C,
}
impl<'c, C: Collaborators + ?Sized> GeneralExecutor<'c, C> {
    pub fn new(collaborators: &'c C) -> Self {
        Self { collaborators }
    }
}
impl<C: Collaborators + ?Sized> ActionExecutor for GeneralExecutor<'_, C> {
    const CHAIN: ChainKind = ChainKind::General;

    async fn execute(&mut self, action: &Action) -> Result<(), ExecError> {
        let c = self.collaborators;
        match action {
            Action::Hid(_) => return Err(ExecError::Unsupported),
            Action::Macro(text) => c.run_macro(text),
            Action::ConfigChange(token) => c.request_slot_change(SlotToken::parse(token)),
            Action::Calibrate => c.calibrate(),
            Action::SendIr(name) => c.send_ir(name).map_err(ExecError::Ir)?,
            Action::MqttPublish(topic_payload) => c.mqtt_publish(topic_payload),
            Action::RestCall(url) => c.http_get(url),
        }
        Ok(())
    }
}

/// Walks one chain for every stable edge and runs the matching actions.
pub struct Dispatcher<'c, M: RawMutex, E: ActionExecutor> {
    core: &'c VbCore<M>,
    executor: E,
}
impl<'c, M: RawMutex, E: ActionExecutor> Dispatcher<'c, M, E> {
    pub fn new(core: &'c VbCore<M>, executor: E) -> Self {
        Self { core, executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub async fn run(&mut self) -> ! {
        let core = self.core;
        let edges = core.stable().queue(E::CHAIN);
        let singleshot = core.singleshot(E::CHAIN);
        loop {
            match select(edges.receive(), singleshot.receive()).await {
                Either::First(edge) => {
                    self.dispatch(edge).await;
                }
                Either::Second(action) => self.singleshot(&action).await,
            }
        }
    }

    /// Run every action bound to `edge`. Returns the number that succeeded. An edge whose
    /// configuration is replaced while waiting for the chain lock is dropped.
    pub async fn dispatch(&mut self, edge: VbEdge) -> usize {
        let core = self.core;
        let (vb, dir) = (edge.vb(), edge.direction());
        let epoch = core.config().epoch();
        if !core.config().is_stable() {
            debug!("reconfiguring; ignored {:?}", edge);
            return 0;
        }
        let chain = core.registry().chain(E::CHAIN);
        if !chain.is_set(vb, dir) {
            return 0;
        }
        let Ok(bindings) = chain.lock().await else {
            warn!("skipped {:?}", edge);
            return 0;
        };
        if !core.config().is_stable() || core.config().epoch() != epoch {
            debug!("configuration replaced; ignored {:?}", edge);
            return 0;
        }

        let mut done = 0;
        for b in bindings.matching(vb, dir) {
            match self.executor.execute(&b.action).await {
                Ok(()) => done += 1,
                Err(e) => warn!("{:?} action failed {:?}", edge, e),
            }
        }
        done
    }

    pub async fn singleshot(&mut self, action: &Action) {
        if let Err(e) = self.executor.execute(action).await {
            warn!("singleshot failed {:?}", e);
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod test;
