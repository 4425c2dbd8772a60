use helixkit::engine::config::{
    CoordinateFormat, DEFAULT_HEIGHT_FRACTION, DEFAULT_ROT_RANGE, DEFAULT_THREADS, DEFAULT_Z_RANGE,
    DihedralMode, SearchRange,
};

pub struct DefaultsConfig {
    pub box_size: u32,
    pub overlap: f64,
    pub output_format: CoordinateFormat,
    pub height_fraction: f64,
    pub inner_radius: i32,
    pub outer_radius: i32,
    pub dihedral: DihedralMode,
    pub rot: SearchRange,
    pub z: SearchRange,
    pub threads: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            box_size: 100,
            overlap: 0.0,
            output_format: CoordinateFormat::Box,
            height_fraction: DEFAULT_HEIGHT_FRACTION,
            inner_radius: -1,
            outer_radius: -1,
            dihedral: DihedralMode::None,
            rot: DEFAULT_ROT_RANGE,
            z: DEFAULT_Z_RANGE,
            threads: DEFAULT_THREADS,
        }
    }
}
