use super::ids::{FilamentId, MicrographId};
use nalgebra::Point2;

/// A particle position on a micrograph, in whole pixels.
///
/// Coordinates produced by segmentation keep a back-reference to the filament
/// they were cut from; this is what later lets helical refinement group
/// segments into tubes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    pub position: Point2<i64>,
    pub micrograph_id: MicrographId,
    pub filament_id: Option<FilamentId>,
}

impl Coordinate {
    pub fn new(x: i64, y: i64, micrograph_id: MicrographId) -> Self {
        Self {
            position: Point2::new(x, y),
            micrograph_id,
            filament_id: None,
        }
    }

    pub fn with_filament(mut self, filament_id: FilamentId) -> Self {
        self.filament_id = Some(filament_id);
        self
    }

    #[inline]
    pub fn x(&self) -> i64 {
        self.position.x
    }

    #[inline]
    pub fn y(&self) -> i64 {
        self.position.y
    }
}
