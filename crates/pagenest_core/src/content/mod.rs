//! Content decoding boundary.
//!
//! All handling of unknown or legacy content shapes lives here; the rest of
//! the crate works with `PageDocument` only.

pub mod codec;
