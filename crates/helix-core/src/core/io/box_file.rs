use crate::core::io::traits::EmFile;
use crate::core::models::coordinate::Coordinate;
use crate::core::models::filament::Filament;
use crate::core::models::ids::MicrographId;
use nalgebra::Point2;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoxFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: BoxParseErrorKind },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoxParseErrorKind {
    #[error("Invalid number in column {column} (value: '{value}')")]
    InvalidNumber { column: usize, value: String },
    #[error("Non-finite value in column {column} (value: '{value}')")]
    NonFinite { column: usize, value: String },
    #[error("Expected {expected} columns, found {found}")]
    ColumnCount { expected: &'static str, found: usize },
    #[error("Helix end record (-2) without a preceding start record (-1)")]
    UnpairedEnd,
    #[error("Helix start record (-1) is not followed by an end record (-2)")]
    UnpairedStart,
    #[error("File mixes helix-coordinate lines with start/end box pairs")]
    MixedLayout,
}

fn parse_error(line: usize, kind: BoxParseErrorKind) -> BoxFileError {
    BoxFileError::Parse { line, kind }
}

fn parse_columns<const N: usize>(fields: &[&str], line: usize) -> Result<[f64; N], BoxFileError> {
    let mut values = [0.0; N];
    for (column, (slot, field)) in values.iter_mut().zip(fields).enumerate() {
        let value: f64 = field.parse().map_err(|_| {
            parse_error(
                line,
                BoxParseErrorKind::InvalidNumber {
                    column: column + 1,
                    value: field.to_string(),
                },
            )
        })?;
        if !value.is_finite() {
            return Err(parse_error(
                line,
                BoxParseErrorKind::NonFinite {
                    column: column + 1,
                    value: field.to_string(),
                },
            ));
        }
        *slot = value;
    }
    Ok(values)
}

/// Significant lines of a box file as `(line_number, fields)`, skipping blank
/// lines and `#` comments.
fn records(reader: &mut impl BufRead) -> impl Iterator<Item = io::Result<(usize, Vec<String>)>> + '_ {
    reader.lines().enumerate().filter_map(|(idx, line)| match line {
        Err(e) => Some(Err(e)),
        Ok(line) => {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                None
            } else {
                Some(Ok((
                    idx + 1,
                    trimmed.split_whitespace().map(str::to_owned).collect(),
                )))
            }
        }
    })
}

fn tab_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer)
}

/// One boxed helix: the two endpoints of its axis (pixels) and the width of
/// the boxing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HelixBox {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HelixLayout {
    /// `x1 y1 x2 y2 width`, as written by `e2helixboxer.py --helix-coords`.
    Coordinates,
    /// EMAN1 `x y w h -1` / `x y w h -2` box pairs marking start and end.
    BoxPairs,
}

/// Helices boxed on a single micrograph.
///
/// Both the `e2helixboxer.py --helix-coords` layout and the older EMAN1 layout
/// of start/end box pairs are accepted; the file is always written in the
/// helix-coordinate layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelixBoxFile {
    pub helices: Vec<HelixBox>,
}

impl HelixBoxFile {
    pub fn from_filaments<'a>(filaments: impl IntoIterator<Item = &'a Filament>, width: u32) -> Self {
        let helices = filaments
            .into_iter()
            .map(|f| HelixBox {
                start: f.start,
                end: f.end,
                width: f64::from(width),
            })
            .collect();
        Self { helices }
    }

    pub fn to_filaments(&self, micrograph_id: MicrographId) -> impl Iterator<Item = Filament> + '_ {
        self.helices
            .iter()
            .map(move |h| Filament::new(h.start, h.end, micrograph_id))
    }

    pub fn len(&self) -> usize {
        self.helices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helices.is_empty()
    }
}

impl EmFile for HelixBoxFile {
    type Error = BoxFileError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error> {
        let mut helices = Vec::new();
        let mut layout: Option<HelixLayout> = None;
        let mut pending_start: Option<(usize, Point2<f64>, f64)> = None;

        for record in records(reader) {
            let (line, fields) = record?;
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            if fields.len() != 5 {
                return Err(parse_error(
                    line,
                    BoxParseErrorKind::ColumnCount {
                        expected: "5",
                        found: fields.len(),
                    },
                ));
            }
            let [a, b, c, d, e] = parse_columns::<5>(&fields, line)?;

            let record_layout = match fields[4] {
                "-1" | "-2" => HelixLayout::BoxPairs,
                _ => HelixLayout::Coordinates,
            };
            match layout {
                None => layout = Some(record_layout),
                Some(current) if current != record_layout => {
                    return Err(parse_error(line, BoxParseErrorKind::MixedLayout));
                }
                Some(_) => {}
            }

            match record_layout {
                HelixLayout::Coordinates => helices.push(HelixBox {
                    start: Point2::new(a, b),
                    end: Point2::new(c, d),
                    width: e,
                }),
                HelixLayout::BoxPairs => {
                    let center = Point2::new(a + c / 2.0, b + d / 2.0);
                    if fields[4] == "-1" {
                        if let Some((start_line, _, _)) = pending_start {
                            return Err(parse_error(start_line, BoxParseErrorKind::UnpairedStart));
                        }
                        pending_start = Some((line, center, c));
                    } else {
                        let Some((_, start, width)) = pending_start.take() else {
                            return Err(parse_error(line, BoxParseErrorKind::UnpairedEnd));
                        };
                        helices.push(HelixBox {
                            start,
                            end: center,
                            width,
                        });
                    }
                }
            }
        }

        if let Some((start_line, _, _)) = pending_start {
            return Err(parse_error(start_line, BoxParseErrorKind::UnpairedStart));
        }
        Ok(Self { helices })
    }

    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error> {
        let mut wtr = tab_writer(writer);
        for helix in &self.helices {
            wtr.write_record([
                (helix.start.x.round() as i64).to_string(),
                (helix.start.y.round() as i64).to_string(),
                (helix.end.x.round() as i64).to_string(),
                (helix.end.y.round() as i64).to_string(),
                (helix.width.round() as i64).to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// A particle box in EMAN convention: lower-left corner and edge length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleBox {
    pub x: i64,
    pub y: i64,
    pub size: u32,
}

impl ParticleBox {
    pub fn from_center(x: i64, y: i64, size: u32) -> Self {
        let half = i64::from(size / 2);
        Self {
            x: x - half,
            y: y - half,
            size,
        }
    }

    pub fn center(&self) -> (i64, i64) {
        let half = i64::from(self.size / 2);
        (self.x + half, self.y + half)
    }
}

/// EMAN `.box` particle file for a single micrograph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleBoxFile {
    pub boxes: Vec<ParticleBox>,
}

impl ParticleBoxFile {
    pub fn from_coordinates<'a>(
        coordinates: impl IntoIterator<Item = &'a Coordinate>,
        box_size: u32,
    ) -> Self {
        let boxes = coordinates
            .into_iter()
            .map(|c| ParticleBox::from_center(c.x(), c.y(), box_size))
            .collect();
        Self { boxes }
    }
}

impl EmFile for ParticleBoxFile {
    type Error = BoxFileError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error> {
        let mut boxes = Vec::new();
        for record in records(reader) {
            let (line, fields) = record?;
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            if !(4..=5).contains(&fields.len()) {
                return Err(parse_error(
                    line,
                    BoxParseErrorKind::ColumnCount {
                        expected: "4 or 5",
                        found: fields.len(),
                    },
                ));
            }
            let [x, y, w, _h] = parse_columns::<4>(&fields, line)?;
            boxes.push(ParticleBox {
                x: x.round() as i64,
                y: y.round() as i64,
                size: w.round().max(0.0) as u32,
            });
        }
        Ok(Self { boxes })
    }

    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error> {
        let mut wtr = tab_writer(writer);
        for b in &self.boxes {
            wtr.write_record([
                b.x.to_string(),
                b.y.to_string(),
                b.size.to_string(),
                b.size.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}
