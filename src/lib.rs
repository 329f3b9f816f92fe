#![no_std]

pub mod hardware;
pub mod monitor;
pub mod scheduler;

/// Errors raised while configuring the acquisition and actuation core.
///
/// Nothing in the periodic control path fails: bad indexes and missing data are answered
/// with neutral values instead. Only setup can go wrong.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// All channel slots of the scheduler are allocated.
    Capacity,
    /// Sample buffer length is not a non-zero multiple of two halves of interleaved channels.
    Geometry,
    /// PWM period of zero.
    Period,
}
