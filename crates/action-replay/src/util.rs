//! Utility modules for recording and playback.
//!
//! This module provides cooperative cancellation and the recording clock
//! shared by capture-side sources.

pub mod cancel;
pub mod clock;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use clock::CaptureClock;
