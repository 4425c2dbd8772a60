//! Segmentation of filaments into evenly spaced particle coordinates.
//!
//! A filament is walked from its start endpoint towards its end endpoint in
//! steps of `box_size - overlap` pixels. Both endpoints are always emitted, so
//! the last interval is usually shorter than the step.

use super::models::coordinate::Coordinate;
use super::models::filament::Filament;
use super::models::ids::{FilamentId, MicrographId};
use super::models::sets::{SetOfCoordinates, SetOfFilaments};
use nalgebra::{Point2, Vector2};
use thiserror::Error;

/// Distance (px) under which an interior point is considered to coincide with
/// the end endpoint.
const ENDPOINT_TOLERANCE: f64 = 1e-9;

/// Upper bound on the coordinates produced for a single filament.
pub const MAX_SEGMENTS_PER_FILAMENT: usize = 1 << 24;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SegmentationError {
    #[error("Box size must be a positive number of pixels")]
    ZeroBoxSize,

    #[error("Overlap must be a finite, non-negative value (got {0})")]
    InvalidOverlap(f64),

    #[error("Sampling rate must be a finite, positive value (got {0})")]
    InvalidSamplingRate(f64),

    #[error(
        "Segmentation step must be positive: box size {box_size} px minus overlap {overlap_px:.3} px gives {step:.3} px"
    )]
    NonPositiveStep {
        box_size: u32,
        overlap_px: f64,
        step: f64,
    },

    #[error("Filament endpoints {endpoints:?} do not describe a finite axis")]
    InvalidFilament { endpoints: [f64; 4] },

    #[error(
        "Filament of length {length:.1} px with a {step:.3} px step exceeds {max} segments",
        max = MAX_SEGMENTS_PER_FILAMENT
    )]
    TooManySegments { length: f64, step: f64 },
}

/// Converts an overlap given in Angstroms to pixels.
pub fn overlap_angstrom_to_pixels(
    overlap_angstrom: f64,
    sampling_rate: f64,
) -> Result<f64, SegmentationError> {
    if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
        return Err(SegmentationError::InvalidSamplingRate(sampling_rate));
    }
    if !overlap_angstrom.is_finite() || overlap_angstrom < 0.0 {
        return Err(SegmentationError::InvalidOverlap(overlap_angstrom));
    }
    Ok(overlap_angstrom / sampling_rate)
}

/// Distance between consecutive segments, `box_size - overlap_px`.
///
/// # Errors
///
/// Rejects a zero box size, a negative or non-finite overlap, and any
/// combination leaving a step that is not strictly positive.
pub fn step_size(box_size: u32, overlap_px: f64) -> Result<f64, SegmentationError> {
    if box_size == 0 {
        return Err(SegmentationError::ZeroBoxSize);
    }
    if !overlap_px.is_finite() || overlap_px < 0.0 {
        return Err(SegmentationError::InvalidOverlap(overlap_px));
    }
    let step = f64::from(box_size) - overlap_px;
    if step <= 0.0 {
        return Err(SegmentationError::NonPositiveStep {
            box_size,
            overlap_px,
            step,
        });
    }
    Ok(step)
}

/// Lazily yields the coordinates of one filament.
///
/// The sequence is: the start endpoint, every point `k * step` along the axis
/// that lies strictly before the end endpoint (rounded to the nearest pixel),
/// and the end endpoint. A zero-length filament yields a single coordinate.
#[derive(Debug, Clone)]
pub struct FilamentSegments {
    start: Point2<f64>,
    end: Point2<f64>,
    stride: Vector2<f64>,
    micrograph_id: MicrographId,
    filament_id: FilamentId,
    next: usize,
    total: usize,
}

impl FilamentSegments {
    pub fn new(
        filament_id: FilamentId,
        filament: &Filament,
        box_size: u32,
        overlap_px: f64,
    ) -> Result<Self, SegmentationError> {
        let step = step_size(box_size, overlap_px)?;
        let endpoints = filament.endpoints();
        let length = filament.length();
        if !length.is_finite() || endpoints.iter().any(|v| !v.is_finite()) {
            return Err(SegmentationError::InvalidFilament { endpoints });
        }

        let (stride, total) = match filament.direction() {
            Some(direction) if length > ENDPOINT_TOLERANCE => {
                let too_many = SegmentationError::TooManySegments { length, step };
                let steps = (length / step).floor();
                if steps >= MAX_SEGMENTS_PER_FILAMENT as f64 {
                    return Err(too_many);
                }
                let mut interior = steps as usize;
                if interior > 0 && interior as f64 * step >= length - ENDPOINT_TOLERANCE {
                    interior -= 1;
                }
                let total = interior
                    .checked_add(2)
                    .filter(|&n| n <= MAX_SEGMENTS_PER_FILAMENT)
                    .ok_or(too_many)?;
                (direction.into_inner() * step, total)
            }
            _ => (Vector2::zeros(), 1),
        };

        Ok(Self {
            start: filament.start,
            end: filament.end,
            stride,
            micrograph_id: filament.micrograph_id,
            filament_id,
            next: 0,
            total,
        })
    }

    fn coordinate_at(&self, point: Point2<f64>) -> Coordinate {
        Coordinate::new(
            point.x.round() as i64,
            point.y.round() as i64,
            self.micrograph_id,
        )
        .with_filament(self.filament_id)
    }
}

impl Iterator for FilamentSegments {
    type Item = Coordinate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let point = if index == 0 {
            self.start
        } else if index == self.total - 1 {
            self.end
        } else {
            self.start + self.stride * index as f64
        };
        Some(self.coordinate_at(point))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FilamentSegments {}

/// Segments a single filament into coordinates stamped with `filament_id`.
pub fn segment(
    filament_id: FilamentId,
    filament: &Filament,
    box_size: u32,
    overlap_px: f64,
) -> Result<Vec<Coordinate>, SegmentationError> {
    Ok(FilamentSegments::new(filament_id, filament, box_size, overlap_px)?.collect())
}

/// Segments every filament of a set, in set order.
///
/// The step is validated before any filament is visited, so an invalid
/// combination is reported even for an empty set.
pub fn segment_set(
    filaments: &SetOfFilaments,
    box_size: u32,
    overlap_px: f64,
) -> Result<SetOfCoordinates, SegmentationError> {
    step_size(box_size, overlap_px)?;

    let mut coordinates = SetOfCoordinates::with_box_size(box_size);
    for (id, filament) in filaments.iter() {
        coordinates.extend(FilamentSegments::new(id, filament, box_size, overlap_px)?);
    }
    Ok(coordinates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::micrograph::Micrograph;
    use crate::core::models::sets::SetOfMicrographs;

    fn setup(endpoints: [f64; 4]) -> (SetOfFilaments, FilamentId, MicrographId) {
        let mut mics = SetOfMicrographs::new(1.0);
        let mic_id = mics.insert(Micrograph::new("mic.mrc"));
        let mut filaments = SetOfFilaments::new();
        let id = filaments.insert(Filament::from_endpoints(endpoints, mic_id));
        (filaments, id, mic_id)
    }

    fn xs(coords: &[Coordinate]) -> Vec<i64> {
        coords.iter().map(|c| c.x()).collect()
    }

    mod step_tests {
        use super::*;

        #[test]
        fn step_is_box_size_minus_overlap() {
            assert_eq!(step_size(100, 0.0), Ok(100.0));
            assert_eq!(step_size(250, 200.5), Ok(49.5));
        }

        #[test]
        fn overlap_equal_to_box_size_is_rejected() {
            assert!(matches!(
                step_size(100, 100.0),
                Err(SegmentationError::NonPositiveStep { box_size: 100, .. })
            ));
        }

        #[test]
        fn overlap_larger_than_box_size_is_rejected() {
            assert!(matches!(
                step_size(100, 150.0),
                Err(SegmentationError::NonPositiveStep { .. })
            ));
        }

        #[test]
        fn zero_box_and_invalid_overlap_are_rejected() {
            assert_eq!(step_size(0, 0.0), Err(SegmentationError::ZeroBoxSize));
            assert_eq!(
                step_size(100, -1.0),
                Err(SegmentationError::InvalidOverlap(-1.0))
            );
            assert!(matches!(
                step_size(100, f64::NAN),
                Err(SegmentationError::InvalidOverlap(_))
            ));
        }

        #[test]
        fn overlap_is_converted_from_angstrom_with_sampling_rate() {
            let px = overlap_angstrom_to_pixels(600.0, 2.5).unwrap();
            assert!((px - 240.0).abs() < 1e-12);
            assert_eq!(
                overlap_angstrom_to_pixels(10.0, 0.0),
                Err(SegmentationError::InvalidSamplingRate(0.0))
            );
        }
    }

    mod segment_tests {
        use super::*;

        #[test]
        fn aligned_filament_emits_every_step_and_endpoint_once() {
            let (filaments, id, _) = setup([0.0, 0.0, 1000.0, 0.0]);
            let coords = segment(id, filaments.get(id).unwrap(), 100, 0.0).unwrap();

            assert_eq!(
                xs(&coords),
                vec![0, 100, 200, 300, 400, 500, 600, 700, 800, 900, 1000]
            );
            assert!(coords.iter().all(|c| c.y() == 0));
        }

        #[test]
        fn unaligned_filament_always_ends_on_end_endpoint() {
            let (filaments, id, _) = setup([0.0, 0.0, 950.0, 0.0]);
            let coords = segment(id, filaments.get(id).unwrap(), 100, 0.0).unwrap();

            assert_eq!(
                xs(&coords),
                vec![0, 100, 200, 300, 400, 500, 600, 700, 800, 900, 950]
            );
        }

        #[test]
        fn filament_shorter_than_step_yields_only_endpoints() {
            let (filaments, id, _) = setup([10.0, 10.0, 40.0, 50.0]);
            let coords = segment(id, filaments.get(id).unwrap(), 100, 0.0).unwrap();

            assert_eq!(coords.len(), 2);
            assert_eq!((coords[0].x(), coords[0].y()), (10, 10));
            assert_eq!((coords[1].x(), coords[1].y()), (40, 50));
        }

        #[test]
        fn zero_length_filament_yields_single_coordinate() {
            let (filaments, id, _) = setup([7.0, 8.0, 7.0, 8.0]);
            let coords = segment(id, filaments.get(id).unwrap(), 100, 10.0).unwrap();

            assert_eq!(coords.len(), 1);
            assert_eq!((coords[0].x(), coords[0].y()), (7, 8));
        }

        #[test]
        fn overlap_shortens_the_step() {
            let (filaments, id, _) = setup([0.0, 0.0, 0.0, 300.0]);
            let coords = segment(id, filaments.get(id).unwrap(), 100, 25.0).unwrap();

            let ys: Vec<_> = coords.iter().map(|c| c.y()).collect();
            assert_eq!(ys, vec![0, 75, 150, 225, 300]);
        }

        #[test]
        fn reversed_filament_walks_from_start_to_end() {
            let (filaments, id, _) = setup([300.0, 0.0, 0.0, 0.0]);
            let coords = segment(id, filaments.get(id).unwrap(), 100, 0.0).unwrap();
            assert_eq!(xs(&coords), vec![300, 200, 100, 0]);
        }

        #[test]
        fn every_coordinate_refers_back_to_filament_and_micrograph() {
            let (filaments, id, mic_id) = setup([0.0, 0.0, 500.0, 500.0]);
            let coords = segment(id, filaments.get(id).unwrap(), 64, 14.0).unwrap();

            assert!(coords.iter().all(|c| c.filament_id == Some(id)));
            assert!(coords.iter().all(|c| c.micrograph_id == mic_id));
        }

        #[test]
        fn invalid_step_is_rejected_instead_of_looping() {
            let (filaments, id, _) = setup([0.0, 0.0, 1000.0, 0.0]);
            let result = segment(id, filaments.get(id).unwrap(), 100, 120.0);
            assert!(matches!(
                result,
                Err(SegmentationError::NonPositiveStep { .. })
            ));
        }

        #[test]
        fn non_finite_endpoints_are_rejected() {
            for endpoints in [
                [0.0, 0.0, f64::INFINITY, 0.0],
                [f64::NAN, 0.0, 100.0, 0.0],
                [0.0, f64::NEG_INFINITY, 0.0, 0.0],
                [0.0, 0.0, 0.0, f64::NAN],
            ] {
                let (filaments, id, _) = setup(endpoints);
                let result = FilamentSegments::new(id, filaments.get(id).unwrap(), 100, 0.0);
                assert!(
                    matches!(result, Err(SegmentationError::InvalidFilament { .. })),
                    "{endpoints:?}: {result:?}"
                );
            }
        }

        #[test]
        fn overflowing_axis_length_is_rejected() {
            for endpoints in [[0.0, 0.0, 1e300, 0.0], [-1e308, 0.0, 1e308, 0.0]] {
                let (filaments, id, _) = setup(endpoints);
                let result = segment(id, filaments.get(id).unwrap(), 100, 0.0);
                assert!(matches!(
                    result,
                    Err(SegmentationError::InvalidFilament { .. })
                ));
            }
        }

        #[test]
        fn huge_filament_reports_too_many_segments() {
            let (filaments, id, _) = setup([0.0, 0.0, 1e12, 0.0]);
            let result = FilamentSegments::new(id, filaments.get(id).unwrap(), 100, 0.0);
            assert!(matches!(
                result,
                Err(SegmentationError::TooManySegments { .. })
            ));

            let (filaments, id, _) = setup([0.0, 0.0, 1e150, 0.0]);
            let result = FilamentSegments::new(id, filaments.get(id).unwrap(), 1, 0.0);
            assert!(matches!(
                result,
                Err(SegmentationError::TooManySegments { .. })
            ));
        }

        #[test]
        fn segment_count_limit_is_inclusive_of_endpoints() {
            let step = 10.0;
            let length = step * (MAX_SEGMENTS_PER_FILAMENT - 1) as f64 - 1.0;
            let (filaments, id, _) = setup([0.0, 0.0, length, 0.0]);
            let segments =
                FilamentSegments::new(id, filaments.get(id).unwrap(), 10, 0.0).unwrap();
            assert_eq!(segments.len(), MAX_SEGMENTS_PER_FILAMENT);

            let (filaments, id, _) = setup([0.0, 0.0, length + step, 0.0]);
            assert!(FilamentSegments::new(id, filaments.get(id).unwrap(), 10, 0.0).is_err());
        }

        #[test]
        fn iterator_reports_exact_length() {
            let (filaments, id, _) = setup([0.0, 0.0, 1000.0, 0.0]);
            let mut segments =
                FilamentSegments::new(id, filaments.get(id).unwrap(), 100, 0.0).unwrap();
            assert_eq!(segments.len(), 11);
            segments.next();
            assert_eq!(segments.len(), 10);
        }
    }

    mod geometry_tests {
        use super::*;

        const ROUNDING: f64 = std::f64::consts::SQRT_2;

        #[test]
        fn rederived_length_and_angle_match_filament() {
            let (filaments, id, _) = setup([12.0, 34.0, 871.0, 402.0]);
            let filament = filaments.get(id).unwrap();
            let coords = segment(id, filament, 128, 40.0).unwrap();

            let first = coords.first().unwrap();
            let last = coords.last().unwrap();
            let dx = (last.x() - first.x()) as f64;
            let dy = (last.y() - first.y()) as f64;

            assert!((dx.hypot(dy) - filament.length()).abs() < ROUNDING);
            assert!((dy.atan2(dx).to_degrees() - filament.angle()).abs() < 0.1);
        }

        #[test]
        fn interior_points_are_spaced_by_step_and_stay_on_axis() {
            let (filaments, id, _) = setup([100.0, 900.0, 1700.0, 120.0]);
            let filament = filaments.get(id).unwrap();
            let step = step_size(200, 35.5).unwrap();
            let coords = segment(id, filament, 200, 35.5).unwrap();

            let direction = filament.direction().unwrap();
            let normal = Vector2::new(-direction.y, direction.x);
            for c in &coords {
                let offset = Vector2::new(c.x() as f64, c.y() as f64) - filament.start.coords;
                assert!(offset.dot(&normal).abs() <= ROUNDING / 2.0);
            }
            for pair in coords[..coords.len() - 1].windows(2) {
                let dx = (pair[1].x() - pair[0].x()) as f64;
                let dy = (pair[1].y() - pair[0].y()) as f64;
                assert!((dx.hypot(dy) - step).abs() <= ROUNDING);
            }
            let tail = &coords[coords.len() - 2..];
            let dx = (tail[1].x() - tail[0].x()) as f64;
            let dy = (tail[1].y() - tail[0].y()) as f64;
            assert!(dx.hypot(dy) <= step + ROUNDING);
        }
    }

    mod set_tests {
        use super::*;

        #[test]
        fn segment_set_concatenates_filaments_in_order_and_sets_box_size() {
            let mut mics = SetOfMicrographs::new(1.0);
            let mic_id = mics.insert(Micrograph::new("mic.mrc"));
            let mut filaments = SetOfFilaments::new();
            let f1 = filaments.insert(Filament::from_endpoints([0.0, 0.0, 200.0, 0.0], mic_id));
            let f2 = filaments.insert(Filament::from_endpoints([0.0, 50.0, 0.0, 150.0], mic_id));

            let coords = segment_set(&filaments, 100, 0.0).unwrap();

            assert_eq!(coords.box_size(), Some(100));
            assert_eq!(coords.for_filament(f1).count(), 3);
            assert_eq!(coords.for_filament(f2).count(), 2);
            let order: Vec<_> = coords.iter().map(|c| c.filament_id.unwrap()).collect();
            assert_eq!(order, vec![f1, f1, f1, f2, f2]);
        }

        #[test]
        fn segment_set_rejects_invalid_step_even_when_empty() {
            let filaments = SetOfFilaments::new();
            assert!(segment_set(&filaments, 50, 50.0).is_err());
        }
    }
}
