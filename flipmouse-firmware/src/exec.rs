use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;
use static_cell::StaticCell;

use crate::{
    debouncer::Debouncer,
    dispatcher::{Collaborators, Dispatcher, GeneralExecutor, HidExecutor},
    edge_source::ButtonPins,
    hid::{HidOutputs, HidRouting, ReportQueue},
    pipeline::VbCore,
    slot::{SlotConfig, SlotStore},
    vb::VbId,
};

// How many HID reports each transport can hold before the HID dispatcher waits
pub const REPORT_BUFFER_SIZE: usize = 16;

pub type DeviceCore = VbCore<CriticalSectionRawMutex>;
pub type DeviceReportQueue = ReportQueue<CriticalSectionRawMutex, REPORT_BUFFER_SIZE>;

static CORE: StaticCell<DeviceCore> = StaticCell::new();
static USB_REPORTS: StaticCell<DeviceReportQueue> = StaticCell::new();
static BLE_REPORTS: StaticCell<DeviceReportQueue> = StaticCell::new();
static ROUTING: StaticCell<HidRouting> = StaticCell::new();

#[embassy_executor::task]
async fn debouncer_task(core: &'static DeviceCore) {
    Debouncer::new(core).run().await;
}

#[embassy_executor::task]
async fn general_task(core: &'static DeviceCore, collaborators: &'static dyn Collaborators) {
    Dispatcher::new(core, GeneralExecutor::new(collaborators))
        .run()
        .await;
}

pub struct DeviceBuilder<I: InputPin + Wait, S: SlotStore, const N: usize> {
    pins: [I; N],
    vbs: [VbId; N],
    store: S,
    slot: &'static str,
    collaborators: &'static dyn Collaborators,
    usb: bool,
    ble: bool,
}

impl<I: InputPin + Wait, S: SlotStore, const N: usize> DeviceBuilder<I, S, N> {
    /// `pins[i]` drives virtual button `vbs[i]`; a low pin is a pressed button.
    pub fn new(
        pins: [I; N],
        vbs: [VbId; N],
        store: S,
        collaborators: &'static dyn Collaborators,
    ) -> Self {
        Self {
            pins,
            vbs,
            store,
            slot: "",
            collaborators,
            usb: true,
            ble: false,
        }
    }

    /// The slot loaded at start up. Defaults to the first stored slot.
    pub fn slot(mut self, value: &'static str) -> Self {
        self.slot = value;
        self
    }

    pub fn usb(mut self, value: bool) -> Self {
        self.usb = value;
        self
    }

    pub fn ble(mut self, value: bool) -> Self {
        self.ble = value;
        self
    }

    pub fn build(self) -> Device<I, S, N> {
        let core: &'static DeviceCore = CORE.init(DeviceCore::new());
        let usb_reports: &'static DeviceReportQueue = USB_REPORTS.init(DeviceReportQueue::new());
        let ble_reports: &'static DeviceReportQueue = BLE_REPORTS.init(DeviceReportQueue::new());
        let routing: &'static HidRouting = ROUTING.init(HidRouting::new(self.usb, self.ble));

        Device {
            builder: self,
            core,
            usb_reports,
            ble_reports,
            routing,
        }
    }
}

/// The running virtual button pipeline. The application drains the report queues into its USB
/// and BLE HID classes and drives the command front door through [`Device::core`].
pub struct Device<I: InputPin + Wait, S: SlotStore, const N: usize> {
    builder: DeviceBuilder<I, S, N>,
    core: &'static DeviceCore,
    usb_reports: &'static DeviceReportQueue,
    ble_reports: &'static DeviceReportQueue,
    routing: &'static HidRouting,
}

impl<I: InputPin + Wait, S: SlotStore, const N: usize> Device<I, S, N> {
    pub fn core(&self) -> &'static DeviceCore {
        self.core
    }

    pub fn usb_reports(&self) -> &'static DeviceReportQueue {
        self.usb_reports
    }

    pub fn ble_reports(&self) -> &'static DeviceReportQueue {
        self.ble_reports
    }

    pub fn routing(&self) -> &'static HidRouting {
        self.routing
    }

    pub async fn run(self, spawner: Spawner) -> ! {
        let Self {
            builder,
            core,
            usb_reports,
            ble_reports,
            routing,
        } = self;
        let DeviceBuilder {
            pins,
            vbs,
            mut store,
            slot,
            collaborators,
            ..
        } = builder;

        if core.load_slot(&mut store, slot).await.is_err() {
            warn!("slot {} not loaded; starting empty", slot);
            if core.reload(SlotConfig::default()).await.is_err() {
                error!("unable to start with an empty slot");
            }
        }

        if spawner.spawn(debouncer_task(core)).is_err() {
            error!("debouncer task not spawned");
        }
        if spawner.spawn(general_task(core, collaborators)).is_err() {
            error!("general dispatcher task not spawned");
        }

        let mut buttons = ButtonPins::new(core.raw(), pins, vbs);
        let mut hid = Dispatcher::new(
            core,
            HidExecutor::new(HidOutputs::new(usb_reports, ble_reports, routing)),
        );

        select(buttons.run(), hid.run()).await;
        unreachable!()
    }
}
