//! Page trash lifecycle.

pub mod lifecycle;
