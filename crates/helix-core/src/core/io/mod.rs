//! Readers and writers for the small text formats exchanged with EM packages.
//!
//! Every format implements [`traits::EmFile`], which provides path-based helpers
//! on top of the reader/writer primitives.

pub mod box_file;
pub mod matching;
pub mod metadata;
pub mod mrc;
pub mod traits;
