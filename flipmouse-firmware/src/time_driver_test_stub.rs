extern crate std;

use core::{cell::Cell, task::Waker};
use embassy_time_driver::Driver;

/// A manually advanced clock. Time only moves when a test calls [`set_time`] or
/// [`advance_millis`]; every timer poll re-wakes its task so that a busy polling `block_on`
/// notices expired deadlines.
struct TestTimeDriver;

impl Driver for TestTimeDriver {
    fn now(&self) -> u64 {
        NOW.get()
    }

    fn schedule_wake(&self, _at: u64, waker: &Waker) {
        waker.wake_by_ref();
    }
}

std::thread_local! {
    static NOW: Cell<u64> = const {Cell::new(0)};
}

embassy_time_driver::time_driver_impl!(static TIME_DRIVER: TestTimeDriver = TestTimeDriver);

pub fn set_time(t: u64) {
    NOW.set(t);
}

pub fn now() -> u64 {
    NOW.get()
}

pub fn advance_millis(ms: u64) {
    NOW.set(NOW.get() + ms * 1000);
}
