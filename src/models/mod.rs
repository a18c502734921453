//! Data models

pub mod classify;

pub use classify::*;
