//! Page reference graph derived from block content.

pub mod backlinks;
