use num_traits::Float;

use super::{window, ChannelReading, CycleWindow, Half, Sample};

/// One completely written buffer half.
///
/// Samples are interleaved: sample `i` of channel `ch` sits at `i * channels + ch`.
/// All reducers return a neutral `0` for a channel index outside the frame.
pub struct Frame<'a, T> {
    samples: &'a mut [T],
    channels: usize,
    half: Half,
}

impl<'a, T: Sample> Frame<'a, T> {
    pub(crate) fn new(samples: &'a mut [T], channels: usize, half: Half) -> Self {
        Self {
            samples,
            channels,
            half,
        }
    }

    /// The buffer half this frame was read from.
    pub fn half(&self) -> Half {
        self.half
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples per channel.
    pub fn samples(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Raw interleaved samples.
    pub fn as_slice(&self) -> &[T] {
        self.samples
    }

    /// Samples of one channel, oldest first.
    pub fn channel(&self, ch: usize) -> Option<impl Iterator<Item = T> + '_> {
        (ch < self.channels).then(|| {
            self.samples
                .iter()
                .skip(ch)
                .step_by(self.channels)
                .copied()
        })
    }

    fn at(&self, ch: usize, i: usize) -> i64 {
        self.samples
            .get(i * self.channels + ch)
            .map_or(0, |&x| x.into())
    }

    fn wide(&self, ch: usize) -> Option<impl Iterator<Item = i64> + '_> {
        self.channel(ch).map(|c| c.map(Into::into))
    }

    /// Integer (truncating) mean of one channel.
    pub fn mean(&self, ch: usize) -> i64 {
        self.mean_in(ch, &CycleWindow::new(0, self.samples()))
    }

    /// Integer (truncating) mean of the absolute sample values.
    pub fn abs_mean(&self, ch: usize) -> i64 {
        match self.wide(ch) {
            Some(c) if self.samples() > 0 => c.map(i64::abs).sum::<i64>() / self.samples() as i64,
            _ => 0,
        }
    }

    /// Root mean square `sqrt(sum(x²) / N)` of one channel.
    pub fn rms(&self, ch: usize) -> f64 {
        self.rms_in(ch, &CycleWindow::new(0, self.samples()))
    }

    /// Largest sample of one channel. Never below zero.
    pub fn peak(&self, ch: usize) -> T {
        self.channel(ch)
            .map_or(T::zero(), |c| c.fold(T::zero(), |max, x| max.max(x)))
    }

    /// Mean computed as `sum >> shift`.
    ///
    /// Only exact if the frame holds `2^shift` samples per channel.
    pub fn mean_shift(&self, ch: usize, shift: u32) -> i64 {
        self.wide(ch)
            .map_or(0, |c| c.sum::<i64>().checked_shr(shift).unwrap_or(0))
    }

    /// Mean over the samples of `window`, clamped to the frame.
    pub fn mean_in(&self, ch: usize, window: &CycleWindow) -> i64 {
        let range = window.clamp(self.samples());
        if ch >= self.channels || range.is_empty() {
            return 0;
        }
        let n = range.len() as i64;
        range.map(|i| self.at(ch, i)).sum::<i64>() / n
    }

    /// Root mean square over the samples of `window`, clamped to the frame.
    pub fn rms_in(&self, ch: usize, window: &CycleWindow) -> f64 {
        let range = window.clamp(self.samples());
        if ch >= self.channels || range.is_empty() {
            return 0.;
        }
        let n = range.len() as f64;
        let sum: i128 = range
            .map(|i| {
                let x = self.at(ch, i) as i128;
                x * x
            })
            .sum();
        (sum as f64 / n).sqrt()
    }

    /// Locate a cycle-aligned window in one channel.
    ///
    /// See [CycleWindow] for the search rule and its limits.
    pub fn cycle_window(&self, ch: usize) -> CycleWindow {
        if ch >= self.channels {
            return CycleWindow::DEGENERATE;
        }
        window::search(self.samples(), |i| self.at(ch, i))
    }

    /// Add `offset` to every sample of one channel in place.
    ///
    /// Used to remove a calibrated DC bias before computing RMS. The converter range is
    /// narrower than the sample word, so no overflow handling is done.
    pub fn apply_offset(&mut self, offset: T, ch: usize) {
        if ch >= self.channels {
            return;
        }
        for x in self.samples.iter_mut().skip(ch).step_by(self.channels) {
            *x = x.wrapping_add(&offset);
        }
    }

    /// Run a cumulative moving average over one channel in place.
    ///
    /// Each sample is replaced by `cma += (x - cma) / (k + 1)`. Returns the final average,
    /// which seeds the next frame. An invalid channel returns `seed` untouched.
    pub fn cma(&mut self, ch: usize, seed: T, k: u32) -> T {
        if ch >= self.channels {
            return seed;
        }
        let div = i64::from(k) + 1;
        let mut cma: i64 = seed.into();
        for x in self.samples.iter_mut().skip(ch).step_by(self.channels) {
            let v: i64 = (*x).into();
            cma += (v - cma) / div;
            *x = num_traits::cast(cma).unwrap_or(*x);
        }
        num_traits::cast(cma).unwrap_or(seed)
    }

    /// Summarize one channel for reporting.
    pub fn reading(&self, ch: usize) -> Option<ChannelReading> {
        if ch >= self.channels {
            return None;
        }
        let window = self.cycle_window(ch);
        Some(ChannelReading {
            mean: self.mean(ch),
            abs_mean: self.abs_mean(ch),
            rms: self.rms(ch) as f32,
            peak: self.peak(ch).into(),
            cycle_rms: window
                .is_valid()
                .then(|| self.rms_in(ch, &window) as f32),
        })
    }
}
