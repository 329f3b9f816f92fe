use core::ops::Range;

/// Sample index range `begin..end` (end exclusive) spanning a whole number of waveform cycles.
///
/// Found by taking the first sample and the slope of the first two samples as reference and
/// scanning backward from the end of the frame for the last adjacent pair with the same
/// slope that straddles the reference value. Statistics over `begin..end` then cover an
/// integer number of cycles, which removes the bias of a partial cycle from RMS and mean.
///
/// # Note
/// The first straddling pair seen from the end is taken as is. On a noisy waveform a
/// noise-induced crossing close to the end may be picked instead of the true cycle
/// boundary, so the window is only as exact as the signal is clean.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CycleWindow {
    pub begin: usize,
    pub end: usize,
}

impl CycleWindow {
    /// Single-sample window returned when no matching point exists.
    pub const DEGENERATE: Self = Self { begin: 0, end: 1 };

    pub const fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a cycle boundary was found. RMS over an invalid window should not feed
    /// fault decisions.
    pub fn is_valid(&self) -> bool {
        self.len() > 1
    }

    /// Index range limited to a frame of `samples` samples.
    pub(super) fn clamp(&self, samples: usize) -> Range<usize> {
        let end = self.end.min(samples);
        self.begin.min(end)..end
    }
}

pub(super) fn search(samples: usize, sample: impl Fn(usize) -> i64) -> CycleWindow {
    if samples < 3 {
        return CycleWindow::DEGENERATE;
    }
    let reference = sample(0);
    let rising = reference < sample(1);

    // Pair (0, 1) is the reference itself.
    for i in (1..samples - 1).rev() {
        let (current, next) = (sample(i), sample(i + 1));
        let straddles = if rising {
            current <= reference && reference < next
        } else {
            current >= reference && reference > next
        };
        if straddles {
            return CycleWindow::new(0, i);
        }
    }
    CycleWindow::DEGENERATE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(s: &[i64]) -> CycleWindow {
        search(s.len(), |i| s[i])
    }

    #[test]
    fn triangle() {
        // Period of 4 samples, rising at 0.
        let s = [0, 1, 0, -1, 0, 1, 0, -1, 0, 1, 0];
        assert_eq!(run(&s), CycleWindow::new(0, 8));
    }

    #[test]
    fn falling_start() {
        let s = [2, 1, 0, 1, 2, 3, 2, 1, 0, 1, 2, 3, 2];
        // Falling through 2 at (6, 7).
        assert_eq!(run(&s), CycleWindow::new(0, 6));
    }

    #[test]
    fn ignores_opposite_slope() {
        // Only a falling crossing of the reference value exists after the start.
        let s = [0, 5, 9, 5, 0, -5, -9];
        assert_eq!(run(&s), CycleWindow::DEGENERATE);
    }

    #[test]
    fn flat_and_short() {
        assert!(!run(&[3, 3, 3, 3, 3]).is_valid());
        assert!(!run(&[1, 2]).is_valid());
        assert!(!run(&[]).is_valid());
    }

    #[test]
    fn clamp() {
        assert_eq!(CycleWindow::new(2, 9).clamp(5), 2..5);
        assert_eq!(CycleWindow::new(7, 9).clamp(5), 5..5);
        assert!(CycleWindow::new(4, 2).is_empty());
    }
}
