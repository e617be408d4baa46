//! Core System Infrastructure
//!
//! Hardware-independent pieces of the console: the SPSC byte rings, the
//! transport context that ties them to the radio stack, and its counters.

pub mod ring;
pub mod stats;
pub mod transport;
