mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_segment_config, build_symmetrize_config};
