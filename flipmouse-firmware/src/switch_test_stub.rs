extern crate std;

use embassy_sync::{blocking_mutex::raw::NoopRawMutex, signal::Signal};
use embedded_hal::digital::{Error, ErrorType, InputPin, OutputPin};
use embedded_hal_async::digital::Wait;
use std::rc::Rc;
use std::sync::Mutex;

#[derive(Debug)]
pub struct TestError;

/// A simulated switch input. Pins are pulled up, so an untouched pin reads high and a pressed
/// switch reads low.
#[derive(Clone)]
pub struct Pin(Rc<PinShared>);
impl core::fmt::Debug for Pin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pin")
            .field("n", &self.0.n)
            .field("is_high", &self.0.is_high())
            .finish()
    }
}
impl Pin {
    pub fn new(n: u8) -> Self {
        Self(Rc::new(PinShared {
            n,
            is_high: Mutex::new(true),
            signal: Signal::new(),
        }))
    }

    pub fn num(&self) -> u8 {
        self.0.n
    }

    pub fn press(&self) {
        let _ = self.clone().set_low();
    }

    pub fn release(&self) {
        let _ = self.clone().set_high();
    }

    fn set(&self, is_high: bool) {
        let mut state = self.0.lock();
        if *state != is_high {
            *state = is_high;
            drop(state);
            self.0.signal.signal(is_high);
        }
    }
}

struct PinShared {
    n: u8,
    is_high: Mutex<bool>,
    signal: Signal<NoopRawMutex, bool>,
}
impl PinShared {
    fn is_high(&self) -> bool {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, bool> {
        self.is_high.lock().unwrap()
    }
}

impl Error for TestError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl ErrorType for Pin {
    type Error = TestError;
}

impl InputPin for Pin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.is_high())
    }
}

impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

impl Wait for Pin {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        while !self.0.is_high() {
            self.0.signal.wait().await;
        }
        Ok(())
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        while self.0.is_high() {
            self.0.signal.wait().await;
        }
        Ok(())
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        self.wait_for_low().await?;
        self.wait_for_high().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        self.wait_for_high().await?;
        self.wait_for_low().await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        self.0.signal.wait().await;
        Ok(())
    }
}
