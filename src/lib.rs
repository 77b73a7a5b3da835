//! Workspace placeholder crate.
//!
//! This crate exposes shared feature flags that map to the individual
//! workspace crates (`core-service` and the tracker providers). Host
//! applications can depend on `episync-workspace` and enable the documented
//! features without wiring each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "myanimelist", feature = "anilist"))]
pub use core_service;
