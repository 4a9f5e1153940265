#![cfg_attr(not(feature = "std"), no_std)]
//! Entrain Core: no_std-ready DSP primitives for binaural synthesis.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use the `libm` math backend
//! - `fast-math`: polynomial sine in the oscillator hot path
//!
//! Modules
//! - [`dsp`]       : math backend, sine, phase wrap, one-pole coefficients
//! - [`smoothing`] : one-pole parameter smoother
//! - [`binaural`]  : carrier/beat ⇄ left/right tone math
//!
//! Design
//! - No heap allocations; pure sample-by-sample primitives
//! - Friendly to embedded / real-time targets

pub mod binaural;
pub mod dsp;
pub mod smoothing;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::binaural::BinauralPair;
    pub use crate::dsp::{kill_denormals, one_pole_coeff_ms, sine01, wrap_phase01, TAU};
    pub use crate::smoothing::SlewLimiter;
}
