use helixkit::engine::config as core_config;
use std::path::PathBuf;

pub struct SegmentAppConfig {
    pub core_config: core_config::SegmentationConfig,
    pub program_dir: Option<PathBuf>,
}

pub struct SymmetrizeAppConfig {
    pub core_config: core_config::HelicalSearchConfig,
    pub program_dir: Option<PathBuf>,
}
