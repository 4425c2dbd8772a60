//! # helixkit Core Library
//!
//! Filament segmentation, initial angle assignment and helical symmetry search
//! orchestration for the helical-reconstruction steps of a cryo-EM pipeline.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Filament`, `Coordinate`
//!   and their sets), the segmentation and angle-assignment algorithms, and
//!   readers/writers for the small text formats exchanged with EM packages
//!   (EMAN `.box`, STAR and Xmipp `.xmd` metadata).
//!
//! - **[`engine`]: The Orchestration Layer.** Configuration builders, the error
//!   taxonomy, progress reporting, the [`engine::runner::JobRunner`] seam through
//!   which external programs (`xmipp_*`, `relion_*`, `e2helixboxer.py`) are invoked,
//!   and the argument builders for those programs.
//!
//! - **[`workflows`]: The Public API.** Complete procedures such as segmenting
//!   every filament picked on a set of micrographs, or searching and imposing the
//!   helical symmetry of a volume.

pub mod core;
pub mod engine;
pub mod workflows;
