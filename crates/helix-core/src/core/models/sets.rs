use super::coordinate::Coordinate;
use super::filament::Filament;
use super::ids::{FilamentId, MicrographId};
use super::micrograph::Micrograph;
use slotmap::SlotMap;

// Sets never remove items, so slot order equals insertion order and
// `SlotMap::iter` preserves the order in which items were added.

/// Micrographs of one acquisition, sharing a sampling rate.
#[derive(Debug, Clone)]
pub struct SetOfMicrographs {
    sampling_rate: f64,
    items: SlotMap<MicrographId, Micrograph>,
}

impl SetOfMicrographs {
    /// Creates an empty set; `sampling_rate` is in Å/px.
    pub fn new(sampling_rate: f64) -> Self {
        Self {
            sampling_rate,
            items: SlotMap::with_key(),
        }
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn insert(&mut self, micrograph: Micrograph) -> MicrographId {
        self.items.insert(micrograph)
    }

    pub fn get(&self, id: MicrographId) -> Option<&Micrograph> {
        self.items.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MicrographId, &Micrograph)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find_by_stem(&self, stem: &str) -> Option<(MicrographId, &Micrograph)> {
        self.items.iter().find(|(_, mic)| mic.stem() == Some(stem))
    }
}

/// Filaments picked on a set of micrographs.
#[derive(Debug, Clone, Default)]
pub struct SetOfFilaments {
    box_size: Option<u32>,
    items: SlotMap<FilamentId, Filament>,
}

impl SetOfFilaments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_box_size(box_size: u32) -> Self {
        Self {
            box_size: Some(box_size),
            items: SlotMap::with_key(),
        }
    }

    /// Box size (px) used when the filaments were picked, if known.
    pub fn box_size(&self) -> Option<u32> {
        self.box_size
    }

    pub fn set_box_size(&mut self, box_size: u32) {
        self.box_size = Some(box_size);
    }

    pub fn insert(&mut self, filament: Filament) -> FilamentId {
        self.items.insert(filament)
    }

    pub fn get(&self, id: FilamentId) -> Option<&Filament> {
        self.items.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilamentId, &Filament)> {
        self.items.iter()
    }

    pub fn for_micrograph(
        &self,
        micrograph_id: MicrographId,
    ) -> impl Iterator<Item = (FilamentId, &Filament)> {
        self.items
            .iter()
            .filter(move |(_, f)| f.micrograph_id == micrograph_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Particle coordinates, usually produced by segmenting a [`SetOfFilaments`].
#[derive(Debug, Clone, Default)]
pub struct SetOfCoordinates {
    box_size: Option<u32>,
    items: Vec<Coordinate>,
}

impl SetOfCoordinates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_box_size(box_size: u32) -> Self {
        Self {
            box_size: Some(box_size),
            items: Vec::new(),
        }
    }

    pub fn box_size(&self) -> Option<u32> {
        self.box_size
    }

    pub fn set_box_size(&mut self, box_size: u32) {
        self.box_size = Some(box_size);
    }

    pub fn push(&mut self, coordinate: Coordinate) {
        self.items.push(coordinate);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coordinate> {
        self.items.iter()
    }

    pub fn for_micrograph(
        &self,
        micrograph_id: MicrographId,
    ) -> impl Iterator<Item = &Coordinate> {
        self.items
            .iter()
            .filter(move |c| c.micrograph_id == micrograph_id)
    }

    pub fn for_filament(&self, filament_id: FilamentId) -> impl Iterator<Item = &Coordinate> {
        self.items
            .iter()
            .filter(move |c| c.filament_id == Some(filament_id))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Extend<Coordinate> for SetOfCoordinates {
    fn extend<T: IntoIterator<Item = Coordinate>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

impl<'a> IntoIterator for &'a SetOfCoordinates {
    type Item = &'a Coordinate;
    type IntoIter = std::slice::Iter<'a, Coordinate>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_micrographs() -> (SetOfMicrographs, MicrographId, MicrographId) {
        let mut mics = SetOfMicrographs::new(1.062);
        let a = mics.insert(Micrograph::new("mics/TMV_001.mrc"));
        let b = mics.insert(Micrograph::new("mics/TMV_002.mrc"));
        (mics, a, b)
    }

    #[test]
    fn micrographs_iterate_in_insertion_order() {
        let (mics, a, b) = two_micrographs();
        let ids: Vec<_> = mics.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(mics.sampling_rate(), 1.062);
    }

    #[test]
    fn find_by_stem_matches_exact_file_stem_only() {
        let (mics, _, b) = two_micrographs();
        assert_eq!(mics.find_by_stem("TMV_002").map(|(id, _)| id), Some(b));
        assert!(mics.find_by_stem("TMV_00").is_none());
    }

    #[test]
    fn filaments_are_filtered_by_micrograph() {
        let (_, a, b) = two_micrographs();
        let mut filaments = SetOfFilaments::with_box_size(250);
        let f1 = filaments.insert(Filament::from_endpoints([0.0, 0.0, 10.0, 0.0], a));
        filaments.insert(Filament::from_endpoints([0.0, 0.0, 0.0, 10.0], b));
        let f3 = filaments.insert(Filament::from_endpoints([5.0, 5.0, 9.0, 9.0], a));

        let on_a: Vec<_> = filaments.for_micrograph(a).map(|(id, _)| id).collect();
        assert_eq!(on_a, vec![f1, f3]);
        assert_eq!(filaments.box_size(), Some(250));
        assert_eq!(filaments.len(), 3);
    }

    #[test]
    fn coordinates_are_filtered_by_filament_and_micrograph() {
        let (_, a, b) = two_micrographs();
        let mut filaments = SetOfFilaments::new();
        let f1 = filaments.insert(Filament::from_endpoints([0.0, 0.0, 10.0, 0.0], a));

        let mut coords = SetOfCoordinates::with_box_size(100);
        coords.extend([
            Coordinate::new(0, 0, a).with_filament(f1),
            Coordinate::new(10, 0, a).with_filament(f1),
            Coordinate::new(7, 7, b),
        ]);

        assert_eq!(coords.len(), 3);
        assert_eq!(coords.for_filament(f1).count(), 2);
        assert_eq!(coords.for_micrograph(b).count(), 1);
        assert_eq!(coords.box_size(), Some(100));
    }
}
