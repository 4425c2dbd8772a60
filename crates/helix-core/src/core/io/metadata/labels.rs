use phf::{Map, phf_map};
use std::fmt;

/// Metadata columns the crate reads or writes, independent of whether the
/// file uses Xmipp or Relion spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    ItemId,
    AngleRot,
    AngleTilt,
    AnglePsi,
    ShiftX,
    ShiftY,
    ShiftZ,
    CoordinateX,
    CoordinateY,
    HelicalTubeId,
    ImageName,
    MicrographName,
    UnfilteredMapHalf1,
    UnfilteredMapHalf2,
    MaskName,
    FinalResolution,
}

#[rustfmt::skip]
static LABEL_ALIASES: Map<&'static str, Label> = phf_map! {
    // --- Xmipp ---
    "itemId" => Label::ItemId,
    "angleRot" => Label::AngleRot, "angleTilt" => Label::AngleTilt, "anglePsi" => Label::AnglePsi,
    "shiftX" => Label::ShiftX, "shiftY" => Label::ShiftY, "shiftZ" => Label::ShiftZ,
    "xcoor" => Label::CoordinateX, "ycoor" => Label::CoordinateY,
    "image" => Label::ImageName, "micrograph" => Label::MicrographName,
    "resolutionFRC" => Label::FinalResolution,

    // --- Relion ---
    "rlnAngleRot" => Label::AngleRot, "rlnAngleTilt" => Label::AngleTilt, "rlnAnglePsi" => Label::AnglePsi,
    "rlnOriginX" => Label::ShiftX, "rlnOriginY" => Label::ShiftY, "rlnOriginZ" => Label::ShiftZ,
    "rlnCoordinateX" => Label::CoordinateX, "rlnCoordinateY" => Label::CoordinateY,
    "rlnHelicalTubeID" => Label::HelicalTubeId,
    "rlnImageName" => Label::ImageName, "rlnMicrographName" => Label::MicrographName,
    "rlnUnfilteredMapHalf1" => Label::UnfilteredMapHalf1,
    "rlnUnfilteredMapHalf2" => Label::UnfilteredMapHalf2,
    "rlnMaskName" => Label::MaskName,
    "rlnFinalResolution" => Label::FinalResolution,
};

impl Label {
    /// Resolves a column name as written in a file (without the leading `_`).
    pub fn from_name(name: &str) -> Option<Self> {
        LABEL_ALIASES.get(name.trim_start_matches('_')).copied()
    }

    /// Xmipp spelling, for the labels Xmipp defines.
    pub fn xmipp_name(self) -> Option<&'static str> {
        let name = match self {
            Label::ItemId => "itemId",
            Label::AngleRot => "angleRot",
            Label::AngleTilt => "angleTilt",
            Label::AnglePsi => "anglePsi",
            Label::ShiftX => "shiftX",
            Label::ShiftY => "shiftY",
            Label::ShiftZ => "shiftZ",
            Label::CoordinateX => "xcoor",
            Label::CoordinateY => "ycoor",
            Label::ImageName => "image",
            Label::MicrographName => "micrograph",
            Label::FinalResolution => "resolutionFRC",
            Label::HelicalTubeId
            | Label::UnfilteredMapHalf1
            | Label::UnfilteredMapHalf2
            | Label::MaskName => return None,
        };
        Some(name)
    }

    /// Relion spelling, used when the crate adds a column to a STAR file.
    pub fn star_name(self) -> &'static str {
        match self {
            Label::ItemId => "rlnItemId",
            Label::AngleRot => "rlnAngleRot",
            Label::AngleTilt => "rlnAngleTilt",
            Label::AnglePsi => "rlnAnglePsi",
            Label::ShiftX => "rlnOriginX",
            Label::ShiftY => "rlnOriginY",
            Label::ShiftZ => "rlnOriginZ",
            Label::CoordinateX => "rlnCoordinateX",
            Label::CoordinateY => "rlnCoordinateY",
            Label::HelicalTubeId => "rlnHelicalTubeID",
            Label::ImageName => "rlnImageName",
            Label::MicrographName => "rlnMicrographName",
            Label::UnfilteredMapHalf1 => "rlnUnfilteredMapHalf1",
            Label::UnfilteredMapHalf2 => "rlnUnfilteredMapHalf2",
            Label::MaskName => "rlnMaskName",
            Label::FinalResolution => "rlnFinalResolution",
        }
    }

    pub fn matches(self, name: &str) -> bool {
        Self::from_name(name) == Some(self)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.star_name())
    }
}
