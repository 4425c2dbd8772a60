//! # Engine Module
//!
//! Everything needed to drive the external EM programs from Rust: validated
//! configuration, the error taxonomy shared by the workflows, progress
//! reporting, the runner seam through which every external binary is
//! invoked, and the argument builders for the wrapped programs.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Builders for segmentation, helical search and angle assignment
//! - **Error Handling** ([`error`]) - [`EngineError`](error::EngineError), aggregating the lower-level errors
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Runner** ([`runner`]) - [`JobSpec`](runner::JobSpec) and the [`JobRunner`](runner::JobRunner) seam
//! - **Helical Symmetry** ([`helical`]) - Coarse/fine symmetry search and imposition with Xmipp
//! - **External Jobs** ([`jobs`]) - Argument builders for EMAN2 and Relion programs
//!
//! External programs are opaque collaborators: the engine assembles their
//! command lines and parses the small text files they leave behind, but never
//! interprets image data beyond header dimensions.

pub mod config;
pub mod error;
pub mod helical;
pub mod jobs;
pub mod progress;
pub mod runner;
