/// Number of virtual buttons. Raw and stable bitmaps are one `u32` wide per direction.
pub const VB_MAX: u8 = 32;

/// Virtual button id used for actions that are not bound to a button and run straight away.
pub const VB_SINGLESHOT: u8 = 0x7f;

/// Bit 7 of an encoded virtual button marks the release direction.
pub const VB_RELEASE_FLAG: u8 = 0x80;

pub const DEBOUNCE_PRESS: u16 = 0;
pub const DEBOUNCE_RELEASE: u16 = 1;
pub const DEBOUNCE_DEADTIME: u16 = 2;

/// Used when neither a per button nor a global debounce time is configured.
pub const DEBOUNCE_FALLBACK_MS: u16 = 50;

/// Debounce times at or below this are published without arming a timer.
pub const DEBOUNCE_MIN_MS: u16 = 10;

pub const DEADTIME_DEFAULT_MS: u16 = 0;

/// How long the debouncer sleeps between checks of the stability gate while reconfiguring.
pub const RECONFIG_POLL_MS: u64 = 10;

/// Bounded wait for a command chain lock.
pub const CHAIN_LOCK_TIMEOUT_MS: u64 = 20;

/// Bounded wait for room in a transport report queue.
pub const REPORT_ENQUEUE_TIMEOUT_MS: u64 = 5;

/// Maximum number of bindings one command chain can hold. A press only HID binding also
/// installs its auto release, so every VB may hold one of those.
pub const CHAIN_CAPACITY: usize = 2 * VB_MAX as usize;

/// Maximum length of an action payload (macro text, slot name, IR command, topic, url).
pub const PAYLOAD_MAX: usize = 64;

/// Maximum length of the command text kept with a binding for saving.
pub const SOURCE_TEXT_MAX: usize = 64;

/// Returns the resolved debounce time: the per button value, else the global value, else
/// [`DEBOUNCE_FALLBACK_MS`].
///
/// ```
/// use flipmouse_common::globals::{resolve_debounce_ms, DEBOUNCE_FALLBACK_MS};
///
/// assert_eq!(resolve_debounce_ms(30, 80), 30);
/// assert_eq!(resolve_debounce_ms(0, 80), 80);
/// assert_eq!(resolve_debounce_ms(0, 0), DEBOUNCE_FALLBACK_MS);
/// ```
pub const fn resolve_debounce_ms(per_vb: u16, global: u16) -> u16 {
    if per_vb != 0 {
        per_vb
    } else if global != 0 {
        global
    } else {
        DEBOUNCE_FALLBACK_MS
    }
}

/// True if `ms` is short enough to skip the debounce timer.
pub const fn is_immediate(ms: u16) -> bool {
    ms <= DEBOUNCE_MIN_MS
}

#[cfg(test)]
#[path = "globals_test.rs"]
mod test;
