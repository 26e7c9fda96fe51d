#![no_std]

#[macro_use]
mod macros;

pub mod action;
pub mod config;
pub mod debouncer;
pub mod dispatcher;
pub mod edge_source;
pub mod exec;
pub mod hid;
pub mod pipeline;
pub mod registry;
pub mod slot;
pub mod vb;

#[cfg(any(test, feature = "test-utils"))]
pub mod switch_test_stub;
#[cfg(any(test, feature = "test-utils"))]
pub mod time_driver_test_stub;

/// Number of virtual buttons.
pub const VB_MAX: usize = flipmouse_common::globals::VB_MAX as usize;

pub(crate) const KEY_BITS_SIZE: usize = 32;

fn add_bit<const SIZE: usize>(bits: &mut [u8], n: u8) -> bool {
    let i = (n >> 3) as usize;
    if i >= SIZE || i >= bits.len() {
        crate::error!("invalid bit! {}", n);
        return false;
    }
    let bp = 1 << (n & 7);
    let old = bits[i];
    bits[i] |= bp;
    old & bp == 0
}

fn del_bit<const SIZE: usize>(bits: &mut [u8], n: u8) -> bool {
    let i = (n >> 3) as usize;
    if i >= SIZE || i >= bits.len() {
        crate::error!("invalid bit! {}", n);
        return false;
    }
    let bp = 1 << (n & 7);
    let old = bits[i];
    bits[i] &= !bp;
    old & bp != 0
}

fn add_key_bit(keys_down: &mut [u8], kc: u8) -> bool {
    add_bit::<KEY_BITS_SIZE>(keys_down, kc)
}

fn del_key_bit(keys_down: &mut [u8], kc: u8) -> bool {
    del_bit::<KEY_BITS_SIZE>(keys_down, kc)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod test;
