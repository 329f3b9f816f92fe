use embedded_hal::digital::v2::{OutputPin, PinState};

use super::Output;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Assert,
    Deassert,
}

impl From<bool> for State {
    fn from(other: bool) -> State {
        match other {
            true => State::Assert,
            false => State::Deassert,
        }
    }
}

/// Electrical polarity of a heater switch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Polarity {
    /// Pin high energizes the load.
    ActiveHigh,
    /// Pin low energizes the load (e.g. open-drain optocoupler input).
    ActiveLow,
}

impl State {
    fn level(self, polarity: Polarity) -> PinState {
        match (self, polarity) {
            (State::Assert, Polarity::ActiveHigh) | (State::Deassert, Polarity::ActiveLow) => {
                PinState::High
            }
            (State::Assert, Polarity::ActiveLow) | (State::Deassert, Polarity::ActiveHigh) => {
                PinState::Low
            }
        }
    }
}

/// Heater switch driven through an embedded-hal output pin.
pub struct Pin<P> {
    pin: P,
    polarity: Polarity,
}

impl<P: OutputPin> Pin<P> {
    /// Wrap a pin and drive it to the de-energized level right away.
    ///
    /// # Args
    /// * `pin` - Output pin switching the load.
    /// * `polarity` - Level that energizes the load.
    pub fn new(pin: P, polarity: Polarity) -> Self {
        let mut pin = Self { pin, polarity };
        pin.set(State::Deassert);
        pin
    }

    pub fn set(&mut self, state: State) {
        if OutputPin::set_state(&mut self.pin, state.level(self.polarity)).is_err() {
            log::warn!("Heater pin write failed");
        }
    }

    /// Release the wrapped pin.
    pub fn free(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> Output for Pin<P> {
    fn set_state(&mut self, on: bool) {
        self.set(on.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[derive(Default)]
    struct Level(Option<PinState>);

    impl OutputPin for Level {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0 = Some(PinState::Low);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0 = Some(PinState::High);
            Ok(())
        }
    }

    #[test]
    fn starts_deenergized() {
        let pin = Pin::new(Level::default(), Polarity::ActiveHigh);
        assert_eq!(pin.free().0, Some(PinState::Low));
        let pin = Pin::new(Level::default(), Polarity::ActiveLow);
        assert_eq!(pin.free().0, Some(PinState::High));
    }

    #[test]
    fn active_low_inverts() {
        let mut pin = Pin::new(Level::default(), Polarity::ActiveLow);
        pin.set_state(true);
        assert_eq!(pin.free().0, Some(PinState::Low));
    }
}
