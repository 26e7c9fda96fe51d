use core::sync::atomic::{AtomicU8, Ordering};

use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Channel};
use embassy_time::{with_timeout, Duration};
use flipmouse_common::{
    globals::REPORT_ENQUEUE_TIMEOUT_MS,
    keycodes::{
        joystick::{AXIS_CENTER, AXIS_COUNT, AXIS_MAX, BUTTON_MAX, HAT_CENTER},
        key_range::{is_modifier, MODIFIER_MIN},
        report_id,
    },
};

use crate::{action::HidCommand, add_key_bit, del_key_bit, KEY_BITS_SIZE};

pub const KEYBOARD_REPORT_SIZE: usize = KEY_BITS_SIZE + 2;
pub const MOUSE_REPORT_SIZE: usize = 6;
pub const JOYSTICK_REPORT_SIZE: usize = 2 + 4 + AXIS_COUNT as usize * 2;
pub const REPORT_MAX: usize = KEYBOARD_REPORT_SIZE;

const JOYSTICK_AXES: usize = 5;
const JOYSTICK_HAT: usize = JOYSTICK_REPORT_SIZE - 1;

pub type ReportBytes = heapless::Vec<u8, REPORT_MAX>;

/// Reports produced by one command, in send order.
pub type Reports = heapless::Vec<ReportBytes, 4>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sink {
    Usb,
    Ble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull;

/// Bounded queue of reports waiting for a transport.
pub struct ReportQueue<M: RawMutex, const N: usize>(Channel<M, ReportBytes, N>);
impl<M: RawMutex, const N: usize> Default for ReportQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
impl<M: RawMutex, const N: usize> ReportQueue<M, N> {
    pub const fn new() -> Self {
        Self(Channel::new())
    }

    pub async fn enqueue(&self, report: &[u8]) -> Result<(), QueueFull> {
        let bytes = ReportBytes::from_slice(report).map_err(|_| QueueFull)?;
        with_timeout(
            Duration::from_millis(REPORT_ENQUEUE_TIMEOUT_MS),
            self.0.send(bytes),
        )
        .await
        .map_err(|_| QueueFull)
    }

    pub async fn receive(&self) -> ReportBytes {
        self.0.receive().await
    }

    pub fn try_receive(&self) -> Option<ReportBytes> {
        self.0.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which transports receive HID reports.
pub struct HidRouting(AtomicU8);
impl Default for HidRouting {
    fn default() -> Self {
        Self::new(true, false)
    }
}
impl HidRouting {
    const USB: u8 = 1;
    const BLE: u8 = 2;

    pub const fn new(usb: bool, ble: bool) -> Self {
        Self(AtomicU8::new(
            if usb { Self::USB } else { 0 } | if ble { Self::BLE } else { 0 },
        ))
    }

    fn flag(sink: Sink) -> u8 {
        match sink {
            Sink::Usb => Self::USB,
            Sink::Ble => Self::BLE,
        }
    }

    pub fn set(&self, sink: Sink, enabled: bool) {
        let flag = Self::flag(sink);
        if enabled {
            self.0.fetch_or(flag, Ordering::Relaxed);
        } else {
            self.0.fetch_and(!flag, Ordering::Relaxed);
        }
    }

    pub fn is_enabled(&self, sink: Sink) -> bool {
        self.0.load(Ordering::Relaxed) & Self::flag(sink) != 0
    }
}

/// The transport queues and the routing flag.
pub struct HidOutputs<'c, M: RawMutex, const N: usize> {
    usb: &'c ReportQueue<M, N>,
    ble: &'c ReportQueue<M, N>,
    routing: &'c HidRouting,
}
impl<'c, M: RawMutex, const N: usize> HidOutputs<'c, M, N> {
    pub fn new(
        usb: &'c ReportQueue<M, N>,
        ble: &'c ReportQueue<M, N>,
        routing: &'c HidRouting,
    ) -> Self {
        Self { usb, ble, routing }
    }

    /// Send `report` to every enabled sink. A full queue on one sink does not stop delivery to
    /// the other. Returns the number of sinks that accepted it.
    pub async fn transmit(&self, report: &[u8]) -> Result<usize, QueueFull> {
        let mut sent = 0;
        let mut result = Ok(());
        for (sink, queue) in [(Sink::Usb, self.usb), (Sink::Ble, self.ble)] {
            if !self.routing.is_enabled(sink) {
                continue;
            }
            match queue.enqueue(report).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!("{:?} report queue full", sink);
                    result = Err(e);
                }
            }
        }
        result.map(|_| sent)
    }
}

/// The keyboard, mouse and joystick report buffers.
pub struct HidReports {
    keyboard: [u8; KEYBOARD_REPORT_SIZE],
    mouse: [u8; MOUSE_REPORT_SIZE],
    joystick: [u8; JOYSTICK_REPORT_SIZE],
}
impl Default for HidReports {
    fn default() -> Self {
        Self::new()
    }
}
impl HidReports {
    pub fn new() -> Self {
        let mut reports = Self {
            keyboard: [0; KEYBOARD_REPORT_SIZE],
            mouse: [0; MOUSE_REPORT_SIZE],
            joystick: [0; JOYSTICK_REPORT_SIZE],
        };
        reports.clear();
        reports
    }

    pub fn keyboard(&self) -> &[u8] {
        &self.keyboard
    }

    pub fn mouse(&self) -> &[u8] {
        &self.mouse
    }

    pub fn joystick(&self) -> &[u8] {
        &self.joystick
    }

    pub fn clear(&mut self) {
        self.keyboard = [0; KEYBOARD_REPORT_SIZE];
        self.keyboard[0] = report_id::KEYBOARD;
        self.mouse = [0; MOUSE_REPORT_SIZE];
        self.mouse[0] = report_id::MOUSE;
        self.joystick = [0; JOYSTICK_REPORT_SIZE];
        self.joystick[0] = report_id::JOYSTICK;
        for axis in 0..AXIS_COUNT {
            self.set_axis(axis, AXIS_CENTER);
        }
        self.joystick[JOYSTICK_HAT] = HAT_CENTER;
    }

    /// Apply `cmd` and return the reports it produces.
    pub fn apply(&mut self, cmd: HidCommand) -> Reports {
        let mut out = Reports::new();
        match cmd {
            HidCommand::KeyPress(key) => {
                if !self.add_key(key) {
                    self.remove_key(key);
                    push(&mut out, &self.keyboard);
                    self.add_key(key);
                }
                push(&mut out, &self.keyboard);
            }
            HidCommand::KeyRelease(key) => {
                self.remove_key(key);
                push(&mut out, &self.keyboard);
            }
            HidCommand::KeyToggle(key) => {
                if self.is_key_down(key) {
                    self.remove_key(key);
                } else {
                    self.add_key(key);
                }
                push(&mut out, &self.keyboard);
            }
            HidCommand::MouseHold(mask) => {
                self.mouse[1] |= mask;
                push(&mut out, &self.mouse);
            }
            HidCommand::MouseRelease(mask) => {
                self.mouse[1] &= !mask;
                push(&mut out, &self.mouse);
            }
            HidCommand::MouseToggle(mask) => {
                self.mouse[1] ^= mask;
                push(&mut out, &self.mouse);
            }
            HidCommand::MouseClick(mask) => self.click(&mut out, mask),
            HidCommand::MouseDoubleClick(mask) => {
                self.click(&mut out, mask);
                self.click(&mut out, mask);
            }
            HidCommand::MouseMove { x, y } => {
                push(
                    &mut out,
                    &[report_id::MOUSE, self.mouse[1], x as u8, y as u8, 0, 0],
                );
            }
            HidCommand::MouseWheel(n) => {
                push(
                    &mut out,
                    &[report_id::MOUSE, self.mouse[1], 0, 0, n as u8, 0],
                );
            }
            HidCommand::JoystickButton(n) => {
                if self.set_joystick_button(n, true) {
                    push(&mut out, &self.joystick);
                }
            }
            HidCommand::JoystickButtonRelease(n) => {
                if self.set_joystick_button(n, false) {
                    push(&mut out, &self.joystick);
                }
            }
            HidCommand::JoystickAxis { axis, value } => {
                if axis < AXIS_COUNT {
                    self.set_axis(axis, value.min(AXIS_MAX));
                    push(&mut out, &self.joystick);
                } else {
                    warn!("invalid joystick axis {}", axis);
                }
            }
            HidCommand::JoystickHat(angle) => {
                self.joystick[JOYSTICK_HAT] = match angle {
                    0..=359 => (((angle + 22) / 45) % 8) as u8,
                    -1 => HAT_CENTER,
                    _ => {
                        warn!("invalid hat angle {}", angle);
                        HAT_CENTER
                    }
                };
                push(&mut out, &self.joystick);
            }
            HidCommand::ReleaseAll => {
                self.clear();
                push(&mut out, &self.keyboard);
                push(&mut out, &self.mouse);
                push(&mut out, &self.joystick);
            }
        }
        out
    }

    fn click(&mut self, out: &mut Reports, mask: u8) {
        let held = self.mouse[1];
        push(out, &[report_id::MOUSE, held | mask, 0, 0, 0, 0]);
        self.mouse[1] = held & !mask;
        push(out, &self.mouse);
    }

    pub fn is_key_down(&self, key: u8) -> bool {
        if is_modifier(key) {
            self.keyboard[1] & (1 << (key - MODIFIER_MIN)) != 0
        } else {
            let i = 2 + (key >> 3) as usize;
            self.keyboard[i] & (1 << (key & 7)) != 0
        }
    }

    fn add_key(&mut self, key: u8) -> bool {
        if is_modifier(key) {
            self.keyboard[1] |= 1 << (key - MODIFIER_MIN);
            return true;
        }
        if key > 3 {
            add_key_bit(&mut self.keyboard[2..], key)
        } else {
            true
        }
    }

    fn remove_key(&mut self, key: u8) {
        if is_modifier(key) {
            self.keyboard[1] &= !(1 << (key - MODIFIER_MIN));
            return;
        }
        if key > 3 {
            del_key_bit(&mut self.keyboard[2..], key);
        }
    }

    fn set_joystick_button(&mut self, n: u8, down: bool) -> bool {
        if n == 0 || n > BUTTON_MAX {
            warn!("invalid joystick button {}", n);
            return false;
        }
        let mut buttons = u32::from_le_bytes([
            self.joystick[1],
            self.joystick[2],
            self.joystick[3],
            self.joystick[4],
        ]);
        let bit = 1 << (n - 1);
        if down {
            buttons |= bit;
        } else {
            buttons &= !bit;
        }
        self.joystick[1..5].copy_from_slice(&buttons.to_le_bytes());
        true
    }

    fn set_axis(&mut self, axis: u8, value: u16) {
        let i = JOYSTICK_AXES + axis as usize * 2;
        self.joystick[i..i + 2].copy_from_slice(&value.to_le_bytes());
    }
}

fn push(out: &mut Reports, report: &[u8]) {
    let Ok(bytes) = ReportBytes::from_slice(report) else {
        error!("report too long {}", report.len());
        return;
    };
    if out.push(bytes).is_err() {
        error!("too many reports");
    }
}

#[cfg(test)]
#[path = "hid_test.rs"]
mod test;
