//! # Output capability
//!
//! The scheduler only ever switches outputs on or off. Boards hand it anything that can do
//! that: a GPIO wrapped in [gpio::Pin], a relay driver, or a fake in tests.

pub mod gpio;

/// A digital output the scheduler is allowed to drive.
pub trait Output {
    /// Switch the output. `true` energizes the load.
    fn set_state(&mut self, on: bool);
}

impl<T: Output + ?Sized> Output for &mut T {
    fn set_state(&mut self, on: bool) {
        (**self).set_state(on)
    }
}
