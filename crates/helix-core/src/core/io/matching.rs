use crate::core::models::ids::MicrographId;
use crate::core::models::micrograph::Micrograph;
use crate::core::models::sets::SetOfMicrographs;
use std::path::Path;

/// Finds the micrograph a picking file belongs to.
///
/// An exact stem match wins. Otherwise a micrograph matches when either stem
/// contains the other (`TMV_001_helix.box` belongs to `TMV_001.mrc`); among
/// several candidates the one with the longest stem is taken.
pub fn match_micrograph<'a>(
    file: &Path,
    micrographs: &'a SetOfMicrographs,
) -> Option<(MicrographId, &'a Micrograph)> {
    let stem = file.file_stem()?.to_str()?;
    if let Some(found) = micrographs.find_by_stem(stem) {
        return Some(found);
    }

    micrographs
        .iter()
        .filter_map(|(id, mic)| mic.stem().map(|s| (id, mic, s)))
        .filter(|(_, _, mic_stem)| stem.contains(mic_stem) || mic_stem.contains(stem))
        .max_by_key(|(_, _, mic_stem)| mic_stem.len())
        .map(|(id, mic, _)| (id, mic))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn micrographs() -> (SetOfMicrographs, MicrographId, MicrographId) {
        let mut mics = SetOfMicrographs::new(1.0);
        let a = mics.insert(Micrograph::new("mics/TMV_001.mrc"));
        let b = mics.insert(Micrograph::new("mics/TMV_0012.mrc"));
        (mics, a, b)
    }

    #[test]
    fn exact_stem_is_preferred() {
        let (mics, a, _) = micrographs();
        let found = match_micrograph(Path::new("boxes/TMV_001.box"), &mics);
        assert_eq!(found.map(|(id, _)| id), Some(a));
    }

    #[test]
    fn file_stem_containing_micrograph_stem_matches_longest() {
        let (mics, a, b) = micrographs();
        let found = match_micrograph(Path::new("TMV_001_helix.box"), &mics);
        assert_eq!(found.map(|(id, _)| id), Some(a));
        let found = match_micrograph(Path::new("TMV_0012_helix.box"), &mics);
        assert_eq!(found.map(|(id, _)| id), Some(b));
    }

    #[test]
    fn micrograph_stem_containing_file_stem_matches() {
        let (mics, a, _) = micrographs();
        let mut single = SetOfMicrographs::new(1.0);
        let only = single.insert(Micrograph::new("aligned_TMV_001_DW.mrc"));
        let found = match_micrograph(Path::new("TMV_001.box"), &single);
        assert_eq!(found.map(|(id, _)| id), Some(only));
        assert!(match_micrograph(Path::new("TMV_001.box"), &mics).is_some_and(|(id, _)| id == a));
    }

    #[test]
    fn unrelated_files_do_not_match() {
        let (mics, _, _) = micrographs();
        assert!(match_micrograph(Path::new("GroEL_17.box"), &mics).is_none());
    }
}
