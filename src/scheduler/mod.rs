//! # Heater actuation scheduler
//!
//! Fixed-period software PWM for up to `N` heater outputs sharing one supply phase.
//!
//! Every channel has a duty cycle in percent. The on-pulses of all channels are packed
//! back to back around the period (phase stacking), so channels do not all switch on at the
//! same edge. Duty changes between 1% and 99% are deferred to the next period boundary.
//! Full on and off take effect immediately.
//!
//! Each channel carries an on-time after which it is forced off, whatever its duty. Boards
//! use it as a communication-loss shut-off. [Scheduler::derate] trades duty for on-time
//! while a thermal limit is exceeded.
//!
//! Time is passed in explicitly as a millisecond [Instant]. Outputs are only written from
//! [Scheduler::tick].

use heapless::Vec;

use crate::hardware::Output;
use crate::Error;

mod channel;
mod settings;

use channel::HeaterChannel;
pub use channel::OnTime;
pub use settings::Settings;

/// Millisecond timestamp.
pub type Instant = fugit::TimerInstantU32<1000>;

pub struct Scheduler<O, const N: usize> {
    channels: Vec<HeaterChannel<O>, N>,
    settings: Settings,
}

impl<O: Output, const N: usize> Scheduler<O, N> {
    /// Create a scheduler without channels.
    ///
    /// # Args
    /// * `settings` - PWM period and derate cap. The period must not be zero.
    pub fn new(settings: Settings) -> Result<Self, Error> {
        if *settings.period == 0 {
            return Err(Error::Period);
        }
        Ok(Self {
            channels: Vec::new(),
            settings,
        })
    }

    /// Bind the next free channel to `output`. The channel starts off.
    ///
    /// # Returns
    /// The channel index, or [Error::Capacity] if all `N` slots are taken.
    pub fn add_channel(&mut self, output: O) -> Result<usize, Error> {
        let index = self.channels.len();
        self.channels
            .push(HeaterChannel::new(output))
            .map_err(|_| {
                log::warn!("No free heater channel slot (capacity {})", N);
                Error::Capacity
            })?;
        Ok(index)
    }

    /// Advance to `now` and drive all outputs.
    ///
    /// Expired on-times force their channels off first. Pending duties are committed by the
    /// first tick in a later period than the one they were requested in. Call at a cadence
    /// much finer than the period.
    pub fn tick(&mut self, now: Instant) {
        let period = *self.settings.period;
        let index = self.period_index(now);

        let mut changed = false;
        for channel in self.channels.iter_mut() {
            changed |= channel.update(now, index);
        }
        if changed {
            self.repack();
        }

        for channel in self.channels.iter_mut() {
            channel.drive(now, period);
        }
    }

    /// Request a duty cycle for one channel.
    ///
    /// * `0` switches off now and cancels any pending duty.
    /// * `100` switches fully on now for `duration` ms. `duration <= 0` means no shut-off.
    /// * Anything in between is applied at the next period boundary. The shut-off timer
    ///   of `duration` ms starts now. With `duration <= 0` the request lapses at the next
    ///   tick.
    ///
    /// Requests for an unknown channel or above 100% are ignored.
    pub fn set_percent(&mut self, ch: usize, percent: u8, duration: i32, now: Instant) {
        if self.request(ch, percent, duration, now) {
            self.repack();
        }
    }

    /// Switch one channel fully on for `duration` ms.
    pub fn turn_on(&mut self, ch: usize, duration: i32, now: Instant) {
        self.set_percent(ch, 100, duration, now)
    }

    /// Switch one channel off.
    pub fn turn_off(&mut self, ch: usize) {
        self.set_percent(ch, 0, 0, Instant::from_ticks(0))
    }

    pub fn turn_off_all(&mut self) {
        let mut changed = false;
        for channel in self.channels.iter_mut() {
            changed |= channel.off();
        }
        if changed {
            self.repack();
        }
    }

    pub fn turn_on_all(&mut self, duration: i32, now: Instant) {
        let duration = Self::limit(duration);
        let mut changed = false;
        for channel in self.channels.iter_mut() {
            changed |= channel.full(now, duration);
        }
        if changed {
            self.repack();
        }
    }

    /// Lower every active duty by one percent and stretch its remaining on-time by
    /// `old / new`, keeping the delivered energy roughly constant.
    ///
    /// The stretched on-time is capped at [Settings::max_timeout]. A channel without
    /// shut-off (fully on with `duration <= 0`) is given the cap, so after derating it
    /// switches off `max_timeout` ms later unless it is turned on again. Channels at 1%
    /// switch off. Pending duties are kept.
    pub fn derate(&mut self, now: Instant) {
        let cap = *self.settings.max_timeout;
        let mut changed = false;
        for channel in self.channels.iter_mut().filter(|c| c.duty() > 0) {
            changed |= channel.derate(now, cap);
        }
        if changed {
            log::debug!("Derated active heater channels");
            self.repack();
        }
    }

    /// Current duty cycle in percent. `0` for an unknown channel.
    pub fn get_percent(&self, ch: usize) -> u8 {
        self.channels.get(ch).map_or(0, |c| c.duty())
    }

    /// Output state written by the last tick.
    pub fn is_on(&self, ch: usize) -> bool {
        self.channels.get(ch).is_some_and(|c| c.is_on())
    }

    /// Duty waiting for the next period boundary.
    pub fn pending(&self, ch: usize) -> Option<u8> {
        self.channels.get(ch).and_then(|c| c.pending())
    }

    /// Start of the channel's pulse within the period, in ms.
    pub fn phase_offset(&self, ch: usize) -> Option<u32> {
        self.channels.get(ch).map(|c| c.phase())
    }

    /// Time left before the channel's shut-off.
    pub fn on_time(&self, ch: usize, now: Instant) -> Option<OnTime> {
        self.channels.get(ch).map(|c| c.on_time(now))
    }

    /// Number of allocated channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Hand the outputs back, e.g. to switch them off through the HAL on shutdown.
    pub fn release(self) -> impl Iterator<Item = O> {
        self.channels.into_iter().map(HeaterChannel::free)
    }

    fn period_index(&self, now: Instant) -> u32 {
        now.ticks() / *self.settings.period
    }

    fn limit(duration: i32) -> Option<u32> {
        (duration > 0).then_some(duration as u32)
    }

    /// Apply a request to one channel. Returns whether its duty changed.
    fn request(&mut self, ch: usize, percent: u8, duration: i32, now: Instant) -> bool {
        if percent > 100 {
            log::warn!("Ignoring {}% request for channel {}", percent, ch);
            return false;
        }
        let index = self.period_index(now);
        let Some(channel) = self.channels.get_mut(ch) else {
            log::warn!("Ignoring request for unknown channel {}", ch);
            return false;
        };
        match percent {
            0 => channel.off(),
            100 => channel.full(now, Self::limit(duration)),
            p => {
                channel.defer(p, now, duration.max(0) as u32, index);
                false
            }
        }
    }

    /// Pack the active pulses back to back around the period, in channel order.
    fn repack(&mut self) {
        let period = *self.settings.period;
        let mut offset = 0;
        for (i, channel) in self.channels.iter_mut().enumerate() {
            channel.set_phase(offset);
            log::trace!("Channel {}: {}% at {} ms", i, channel.duty(), offset);
            offset += channel.span(period);
            if offset >= period {
                offset -= period;
            }
        }
        log::debug!("Repacked {} channels, end offset {} ms", self.channels.len(), offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use miniconf::Leaf;

    struct Fake(Cell<bool>);

    impl Output for &Fake {
        fn set_state(&mut self, on: bool) {
            self.0.set(on)
        }
    }

    fn at(ms: u32) -> Instant {
        Instant::from_ticks(ms)
    }

    #[test]
    fn zero_period() {
        let settings = Settings {
            period: Leaf(0),
            ..Default::default()
        };
        assert!(matches!(
            Scheduler::<&Fake, 2>::new(settings),
            Err(Error::Period)
        ));
    }

    #[test]
    fn capacity() {
        let outputs = [Fake(Cell::new(false)), Fake(Cell::new(false)), Fake(Cell::new(false))];
        let mut s = Scheduler::<_, 2>::new(Settings::default()).unwrap();
        assert!(s.is_empty());
        assert_eq!(s.add_channel(&outputs[0]), Ok(0));
        assert_eq!(s.add_channel(&outputs[1]), Ok(1));
        assert_eq!(s.add_channel(&outputs[2]), Err(Error::Capacity));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn bad_requests_are_ignored() {
        let fake = Fake(Cell::new(false));
        let mut s = Scheduler::<_, 1>::new(Settings::default()).unwrap();
        s.add_channel(&fake).unwrap();
        s.set_percent(0, 101, 1000, at(0));
        s.set_percent(3, 100, 1000, at(0));
        s.turn_off(9);
        assert_eq!(s.get_percent(0), 0);
        assert_eq!(s.pending(0), None);
        assert_eq!(s.get_percent(3), 0);
        assert_eq!(s.phase_offset(3), None);
        assert!(!s.is_on(3));
    }

    #[test]
    fn repack_stacks_and_wraps() {
        let fakes = [
            Fake(Cell::new(false)),
            Fake(Cell::new(false)),
            Fake(Cell::new(false)),
            Fake(Cell::new(false)),
        ];
        let mut s = Scheduler::<_, 4>::new(Settings::default()).unwrap();
        for f in fakes.iter() {
            s.add_channel(f).unwrap();
        }
        for (ch, p) in [(0, 60), (1, 30), (2, 25), (3, 10)] {
            s.set_percent(ch, p, 10_000, at(100));
        }
        s.tick(at(100));
        s.tick(at(1000));
        let phases: [Option<u32>; 4] = core::array::from_fn(|ch| s.phase_offset(ch));
        assert_eq!(phases, [Some(0), Some(600), Some(900), Some(150)]);
    }

    #[test]
    fn release_returns_outputs() {
        let fake = Fake(Cell::new(false));
        let mut s = Scheduler::<_, 1>::new(Settings::default()).unwrap();
        s.add_channel(&fake).unwrap();
        let mut outputs = s.release();
        assert!(outputs.next().is_some_and(|o| core::ptr::eq(o, &fake)));
        assert!(outputs.next().is_none());
    }
}
