use super::Instant;
use crate::hardware::Output;

/// Time left before a channel's safety shut-off.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OnTime {
    /// No shut-off.
    Indefinite,
    /// Milliseconds until the channel is forced off. `0` once expired.
    Remaining(u32),
}

/// Safety shut-off bookkeeping: the channel is forced off `duration` after `begin`.
#[derive(Copy, Clone, Debug)]
struct Deadline {
    begin: Instant,
    duration: Option<u32>,
}

impl Deadline {
    const EXPIRED: Self = Self {
        begin: Instant::from_ticks(0),
        duration: Some(0),
    };

    fn elapsed(&self, now: Instant) -> u32 {
        now.ticks().wrapping_sub(self.begin.ticks())
    }

    fn remaining(&self, now: Instant) -> OnTime {
        match self.duration {
            None => OnTime::Indefinite,
            Some(d) => OnTime::Remaining(d.saturating_sub(self.elapsed(now))),
        }
    }
}

/// Duty requested during period `period`, committed by the first tick of a later period.
#[derive(Copy, Clone, Debug)]
struct Pending {
    duty: u8,
    period: u32,
}

pub(super) struct HeaterChannel<O> {
    output: O,
    duty: u8,
    pending: Option<Pending>,
    phase: u32,
    deadline: Deadline,
    on: bool,
}

impl<O: Output> HeaterChannel<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            duty: 0,
            pending: None,
            phase: 0,
            deadline: Deadline::EXPIRED,
            on: false,
        }
    }

    pub fn free(self) -> O {
        self.output
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn pending(&self) -> Option<u8> {
        self.pending.map(|p| p.duty)
    }

    pub fn phase(&self) -> u32 {
        self.phase
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn on_time(&self, now: Instant) -> OnTime {
        self.deadline.remaining(now)
    }

    /// Set the duty cycle. Returns whether it changed, i.e. whether phases need repacking.
    fn set_duty(&mut self, duty: u8) -> bool {
        let changed = self.duty != duty;
        self.duty = duty;
        changed
    }

    /// Length of the on-pulse within one period.
    pub fn span(&self, period: u32) -> u32 {
        (u64::from(self.duty) * u64::from(period) / 100) as u32
    }

    pub fn set_phase(&mut self, phase: u32) {
        self.phase = phase;
    }

    /// Immediate off. Cancels any pending duty.
    pub fn off(&mut self) -> bool {
        self.pending = None;
        self.deadline = Deadline::EXPIRED;
        self.set_duty(0)
    }

    /// Immediate full on. Cancels any pending duty.
    pub fn full(&mut self, now: Instant, duration: Option<u32>) -> bool {
        self.pending = None;
        self.deadline = Deadline {
            begin: now,
            duration,
        };
        self.set_duty(100)
    }

    /// Request a duty for the next period boundary. The shut-off timer starts now.
    ///
    /// `period` is the index of the period containing `now`.
    pub fn defer(&mut self, duty: u8, now: Instant, duration: u32, period: u32) {
        self.pending = Some(Pending { duty, period });
        self.deadline = Deadline {
            begin: now,
            duration: Some(duration),
        };
    }

    /// Enforce the shut-off and, once a new period has begun, commit the pending duty.
    ///
    /// `period` is the index of the period containing `now`.
    pub fn update(&mut self, now: Instant, period: u32) -> bool {
        let mut changed = false;
        if self.deadline.remaining(now) == OnTime::Remaining(0) {
            changed |= self.set_duty(0);
            self.pending = None;
        }
        if let Some(pending) = self.pending.filter(|p| p.period != period) {
            log::debug!("Committing duty {}% (was {}%)", pending.duty, self.duty);
            self.pending = None;
            changed |= self.set_duty(pending.duty);
        }
        changed
    }

    /// Trade one percent of duty for proportionally more on-time, capped at `cap`.
    ///
    /// An indefinite on-time is treated as `cap`. At 1% or below the channel goes off.
    pub fn derate(&mut self, now: Instant, cap: u32) -> bool {
        if self.duty > 1 {
            let duty = self.duty - 1;
            let remaining = match self.deadline.remaining(now) {
                OnTime::Indefinite => cap,
                OnTime::Remaining(r) => r,
            };
            let extended = u64::from(remaining) * u64::from(self.duty) / u64::from(duty);
            self.deadline = Deadline {
                begin: now,
                duration: Some(extended.min(u64::from(cap)) as u32),
            };
            self.set_duty(duty)
        } else {
            self.deadline = Deadline::EXPIRED;
            self.set_duty(0)
        }
    }

    /// Realize the current decision on the output.
    pub fn drive(&mut self, now: Instant, period: u32) {
        let span = u64::from(self.span(period));
        let period = u64::from(period);
        let position = (u64::from(now.ticks()) % period + period - u64::from(self.phase)) % period;
        self.on = self.duty != 0 && position < span;
        self.output.set_state(self.on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

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
    fn new_channel_is_expired_and_off() {
        let fake = Fake(Cell::new(true));
        let mut ch = HeaterChannel::new(&fake);
        assert_eq!(ch.on_time(at(5)), OnTime::Remaining(0));
        ch.drive(at(5), 1000);
        assert!(!fake.0.get());
    }

    #[test]
    fn pulse_follows_phase() {
        let fake = Fake(Cell::new(false));
        let mut ch = HeaterChannel::new(&fake);
        ch.full(at(0), None);
        ch.defer(25, at(0), 10_000, 0);
        ch.update(at(1000), 1);
        ch.set_phase(900);
        assert_eq!(ch.span(1000), 250);
        for (t, on) in [(899, false), (900, true), (1149, true), (1150, false), (1900, true)] {
            ch.drive(at(t), 1000);
            assert_eq!(fake.0.get(), on, "t = {}", t);
        }
    }

    #[test]
    fn shutoff_survives_tick_wraparound() {
        let fake = Fake(Cell::new(false));
        let mut ch = HeaterChannel::new(&fake);
        ch.full(at(u32::MAX - 10), Some(20));
        assert!(!ch.update(at(4), 0));
        assert_eq!(ch.on_time(at(4)), OnTime::Remaining(5));
        assert!(ch.update(at(9), 0));
        assert_eq!(ch.duty(), 0);
    }

    #[test]
    fn pending_waits_for_a_later_period() {
        let fake = Fake(Cell::new(false));
        let mut ch = HeaterChannel::new(&fake);
        ch.defer(30, at(3200), 10_000, 3);
        assert!(!ch.update(at(3500), 3));
        assert_eq!(ch.pending(), Some(30));
        assert!(ch.update(at(4000), 4));
        assert_eq!((ch.duty(), ch.pending()), (30, None));
    }

    #[test]
    fn derate_at_one_percent_turns_off() {
        let fake = Fake(Cell::new(false));
        let mut ch = HeaterChannel::new(&fake);
        ch.defer(1, at(0), 5000, 0);
        ch.update(at(1000), 1);
        assert_eq!(ch.duty(), 1);
        assert!(ch.derate(at(1500), 60_000));
        assert_eq!(ch.duty(), 0);
        assert_eq!(ch.on_time(at(1500)), OnTime::Remaining(0));
    }
}
