//! Data model shared by every layer of the library.
//!
//! Micrographs, filaments and coordinates are plain values; the sets that own
//! them hand out generational identifiers so that a coordinate can refer back
//! to the filament and micrograph it was derived from without borrowing them.

pub mod coordinate;
pub mod filament;
pub mod helix;
pub mod ids;
pub mod micrograph;
pub mod sets;
