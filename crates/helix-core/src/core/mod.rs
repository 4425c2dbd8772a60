//! # Core Module
//!
//! Data structures and algorithms that do not depend on any external program.
//!
//! - **Data Model** ([`models`]) - Micrographs, filaments, coordinates and their ordered sets
//! - **Segmentation** ([`segmentation`]) - Filament-to-coordinate segmentation along the helix axis
//! - **Alignment** ([`alignment`]) - Initial projection angle assignment for helical segments
//! - **File I/O** ([`io`]) - EMAN box files, STAR/Xmipp metadata and MRC headers

pub mod alignment;
pub mod io;
pub mod models;
pub mod segmentation;
