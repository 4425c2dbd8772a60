use super::ids::MicrographId;
use nalgebra::{Point2, Unit, Vector2};

/// A line-segment annotation over a micrograph following the long axis of a
/// helical particle. Endpoints are in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Filament {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    pub micrograph_id: MicrographId,
}

impl Filament {
    pub fn new(start: Point2<f64>, end: Point2<f64>, micrograph_id: MicrographId) -> Self {
        Self {
            start,
            end,
            micrograph_id,
        }
    }

    pub fn from_endpoints(
        [x0, y0, x1, y1]: [f64; 4],
        micrograph_id: MicrographId,
    ) -> Self {
        Self::new(Point2::new(x0, y0), Point2::new(x1, y1), micrograph_id)
    }

    /// Endpoints as `[x0, y0, x1, y1]`.
    pub fn endpoints(&self) -> [f64; 4] {
        [self.start.x, self.start.y, self.end.x, self.end.y]
    }

    pub fn axis(&self) -> Vector2<f64> {
        self.end - self.start
    }

    pub fn length(&self) -> f64 {
        self.axis().norm()
    }

    /// Angle of the filament axis with the image X axis, in degrees.
    pub fn angle(&self) -> f64 {
        let axis = self.axis();
        axis.y.atan2(axis.x).to_degrees()
    }

    /// Unit vector from `start` to `end`, or `None` for a degenerate filament.
    pub fn direction(&self) -> Option<Unit<Vector2<f64>>> {
        Unit::try_new(self.axis(), f64::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    const TOLERANCE: f64 = 1e-9;

    fn mic_id() -> MicrographId {
        let mut map: SlotMap<MicrographId, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn length_is_euclidean_distance_between_endpoints() {
        let filament = Filament::from_endpoints([10.0, 20.0, 40.0, 60.0], mic_id());
        assert!((filament.length() - 50.0).abs() < TOLERANCE);
    }

    #[test]
    fn angle_is_measured_in_degrees_from_x_axis() {
        let id = mic_id();
        let horizontal = Filament::from_endpoints([0.0, 0.0, 10.0, 0.0], id);
        let diagonal = Filament::from_endpoints([0.0, 0.0, 10.0, 10.0], id);
        let downwards = Filament::from_endpoints([5.0, 5.0, 5.0, -5.0], id);

        assert!(horizontal.angle().abs() < TOLERANCE);
        assert!((diagonal.angle() - 45.0).abs() < TOLERANCE);
        assert!((downwards.angle() + 90.0).abs() < TOLERANCE);
    }

    #[test]
    fn direction_of_zero_length_filament_is_none() {
        let filament = Filament::from_endpoints([3.0, 3.0, 3.0, 3.0], mic_id());
        assert!(filament.direction().is_none());
    }

    #[test]
    fn endpoints_round_trip_through_constructor() {
        let filament = Filament::from_endpoints([1.0, 2.0, 3.0, 4.0], mic_id());
        assert_eq!(filament.endpoints(), [1.0, 2.0, 3.0, 4.0]);
    }
}
