use flipmouse_common::globals::PAYLOAD_MAX;

use crate::registry::ChainKind;

/// Text carried by a non HID action: macro text, slot name, IR command, topic/payload or url.
pub type Payload = heapless::String<PAYLOAD_MAX>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PayloadTooLong;

pub fn payload(text: &str) -> Result<Payload, PayloadTooLong> {
    let mut p = Payload::new();
    p.push_str(text).map_err(|_| PayloadTooLong)?;
    Ok(p)
}

/// A mutation of one of the HID report buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidCommand {
    KeyPress(u8),
    KeyRelease(u8),
    KeyToggle(u8),
    MouseHold(u8),
    MouseRelease(u8),
    MouseToggle(u8),
    MouseClick(u8),
    MouseDoubleClick(u8),
    MouseMove { x: i8, y: i8 },
    MouseWheel(i8),
    /// Joystick buttons are numbered from 1.
    JoystickButton(u8),
    JoystickButtonRelease(u8),
    JoystickAxis { axis: u8, value: u16 },
    /// Angle in degrees; -1 centres the hat.
    JoystickHat(i16),
    ReleaseAll,
}
impl HidCommand {
    /// The command that undoes a held press, installed on the release direction when a command
    /// is bound to press only.
    pub fn release_counterpart(&self) -> Option<HidCommand> {
        match *self {
            Self::KeyPress(k) => Some(Self::KeyRelease(k)),
            Self::MouseHold(m) => Some(Self::MouseRelease(m)),
            Self::JoystickButton(n) => Some(Self::JoystickButtonRelease(n)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidPhase {
    Press,
    AutoRelease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidReport {
    pub command: HidCommand,
    pub phase: HidPhase,
}
impl HidReport {
    pub fn new(command: HidCommand) -> Self {
        Self {
            command,
            phase: HidPhase::Press,
        }
    }

    pub fn auto_release(&self) -> Option<Self> {
        self.command.release_counterpart().map(|command| Self {
            command,
            phase: HidPhase::AutoRelease,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Hid(HidReport),
    Macro(Payload),
    /// Slot name or navigation token, see [`SlotToken::parse`].
    ConfigChange(Payload),
    Calibrate,
    SendIr(Payload),
    MqttPublish(Payload),
    RestCall(Payload),
}
impl Action {
    pub fn hid(command: HidCommand) -> Self {
        Self::Hid(HidReport::new(command))
    }

    pub fn run_macro(text: &str) -> Result<Self, PayloadTooLong> {
        Ok(Self::Macro(payload(text)?))
    }

    pub fn config_change(token: &str) -> Result<Self, PayloadTooLong> {
        Ok(Self::ConfigChange(payload(token)?))
    }

    pub fn send_ir(name: &str) -> Result<Self, PayloadTooLong> {
        Ok(Self::SendIr(payload(name)?))
    }

    pub fn mqtt_publish(topic_payload: &str) -> Result<Self, PayloadTooLong> {
        Ok(Self::MqttPublish(payload(topic_payload)?))
    }

    pub fn rest_call(url: &str) -> Result<Self, PayloadTooLong> {
        Ok(Self::RestCall(payload(url)?))
    }

    /// The chain a binding for this action belongs in.
    pub fn chain(&self) -> ChainKind {
        match self {
            Self::Hid(_) => ChainKind::Hid,
            _ => ChainKind::General,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Action {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Hid(r) => defmt::write!(fmt, "Hid({:?})", r),
            Self::Macro(t) => defmt::write!(fmt, "Macro({=str})", t.as_str()),
            Self::ConfigChange(t) => defmt::write!(fmt, "ConfigChange({=str})", t.as_str()),
            Self::Calibrate => defmt::write!(fmt, "Calibrate"),
            Self::SendIr(t) => defmt::write!(fmt, "SendIr({=str})", t.as_str()),
            Self::MqttPublish(t) => defmt::write!(fmt, "MqttPublish({=str})", t.as_str()),
            Self::RestCall(t) => defmt::write!(fmt, "RestCall({=str})", t.as_str()),
        }
    }
}

/// Target of a slot change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotToken<'a> {
    Named(&'a str),
    Next,
    Prev,
    Default,
    Update,
    RestoreFactory,
}
impl<'a> SlotToken<'a> {
    pub fn parse(token: &'a str) -> Self {
        const TOKENS: [(&str, SlotToken<'static>); 5] = [
            ("NEXT", SlotToken::Next),
            ("PREV", SlotToken::Prev),
            ("DEFAULT", SlotToken::Default),
            ("UPDATE", SlotToken::Update),
            ("RESTORE_FACTORY", SlotToken::RestoreFactory),
        ];
        let trimmed = token.trim();
        TOKENS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
            .map_or(SlotToken::Named(trimmed), |(_, t)| *t)
    }
}

#[cfg(test)]
#[path = "action_test.rs"]
mod test;
