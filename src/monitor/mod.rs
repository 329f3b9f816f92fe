//! # Signal monitor
//!
//! Double-buffered acquisition. A background transfer engine (ADC + circular DMA) streams
//! interleaved samples into one buffer split in two halves:
//!
//! ```text
//! [ CH0{s0}, CH1{s0}, .. CHn{s0}, CH0{s1}, .. CHn{sM} | CH0{s0}, .. CHn{sM} ]
//!   <------------------- first half ----------------> <--- second half --->
//! ```
//!
//! The engine's completion interrupts flip a [TransferState]. The main loop calls
//! [Monitor::poll], which hands the half that just completed to a closure as a [Frame] while
//! the engine keeps writing the other half. A frame can not outlive the closure call.
//!
//! If the main loop falls behind by more than one half, only the most recent half is
//! delivered. Older data is dropped.

use core::marker::PhantomData;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU8, Ordering};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use num_traits::{PrimInt, Signed, WrappingAdd};
use strum::AsRefStr;

use crate::Error;

mod frame;
mod reading;
mod window;

pub use frame::Frame;
pub use reading::ChannelReading;
pub use window::CycleWindow;

/// Sample word written by the converter: `i16` for 12 bit converters, `i32` for 16 bit ones.
pub trait Sample: PrimInt + Signed + WrappingAdd + Into<i64> {}

impl<T: PrimInt + Signed + WrappingAdd + Into<i64>> Sample for T {}

/// Buffer half that has been completely written.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive, AsRefStr)]
#[repr(u8)]
pub enum Half {
    /// No transfer has completed yet.
    NotAvailable = 0,
    First = 1,
    Second = 2,
}

/// Completion flag shared between the transfer engine interrupts and the main loop.
///
/// Single writer (the completion interrupts), single reader ([Monitor::poll]). The flag is
/// one byte, so a plain atomic load/store is all the synchronization required.
pub struct TransferState(AtomicU8);

impl TransferState {
    pub const fn new() -> Self {
        Self(AtomicU8::new(Half::NotAvailable as u8))
    }

    /// Signal that the first half has been filled. Call from the half-transfer interrupt.
    pub fn half_complete(&self) {
        self.0.store(Half::First.into(), Ordering::Release);
    }

    /// Signal that the second half has been filled. Call from the transfer-complete interrupt.
    pub fn complete(&self) {
        self.0.store(Half::Second.into(), Ordering::Release);
    }

    /// The half that is currently stable.
    pub fn stable(&self) -> Half {
        Half::try_from(self.0.load(Ordering::Acquire)).unwrap_or(Half::NotAvailable)
    }
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}

/// Background transfer engine filling the sample buffer.
pub trait Acquisition<T> {
    /// Number of interleaved channels in one conversion sequence.
    fn channels(&self) -> usize;

    /// Start a continuous circular transfer of `len` samples into `buffer`.
    ///
    /// # Note
    /// The engine must call [TransferState::half_complete] after writing the first half and
    /// [TransferState::complete] after writing the second half, and must keep writing the
    /// halves strictly in that order. It must stop writing before the buffer borrow
    /// handed to [Monitor::new] ends.
    fn start(&mut self, buffer: *mut T, len: usize);
}

/// Double-buffer bookkeeping for one acquisition engine.
pub struct Monitor<'a, T> {
    buffer: NonNull<T>,
    len: usize,
    channels: usize,
    samples: usize,
    state: &'a TransferState,
    last: Half,
    _buffer: PhantomData<&'a mut [T]>,
}

impl<'a, T: Sample> Monitor<'a, T> {
    /// Take over the sample buffer and start the transfer engine.
    ///
    /// # Args
    /// * `acquisition` - Transfer engine. Its channel count fixes the frame geometry.
    /// * `buffer` - Sample storage. Both halves, so `2 * channels * samples` long.
    /// * `state` - Completion flag the engine's interrupts write to.
    pub fn new<A: Acquisition<T>>(
        acquisition: &mut A,
        buffer: &'a mut [T],
        state: &'a TransferState,
    ) -> Result<Self, Error> {
        let channels = acquisition.channels();
        let len = buffer.len();
        if channels == 0 || len == 0 || len % (2 * channels) != 0 {
            return Err(Error::Geometry);
        }
        let samples = len / (2 * channels);

        let buffer = NonNull::from(buffer).cast::<T>();
        acquisition.start(buffer.as_ptr(), len);
        log::info!(
            "Monitor started: {} channels, {} samples per half",
            channels,
            samples
        );

        Ok(Self {
            buffer,
            len,
            channels,
            samples,
            state,
            last: Half::NotAvailable,
            _buffer: PhantomData,
        })
    }

    /// Deliver a freshly completed half, if there is one.
    ///
    /// Calls `f` at most once per completion observed since the previous poll and returns
    /// its result. Returns `None` without calling `f` when nothing completed.
    pub fn poll<R>(&mut self, f: impl FnOnce(Frame<'_, T>) -> R) -> Option<R> {
        let stable = self.state.stable();
        if stable == self.last {
            return None;
        }
        self.last = stable;

        let offset = match stable {
            Half::First => 0,
            Half::Second => self.len / 2,
            Half::NotAvailable => return None,
        };
        log::trace!("{} half complete", stable.as_ref());

        // SAFETY: `buffer` is exclusively borrowed for `'a` and only shared with the
        // transfer engine. The engine is writing the half after `stable`, so the range
        // `offset..offset + len / 2` is not written while the frame exists. The frame
        // borrows `self` mutably, so no second frame can alias it.
        let samples = unsafe {
            core::slice::from_raw_parts_mut(self.buffer.as_ptr().add(offset), self.len / 2)
        };
        Some(f(Frame::new(samples, self.channels, stable)))
    }

    /// Interleaved channels per sample.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples per channel in one half.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// The half delivered by the last successful poll.
    pub fn last(&self) -> Half {
        self.last
    }
}
