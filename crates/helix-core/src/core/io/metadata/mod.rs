//! STAR / Xmipp `.xmd` metadata tables.
//!
//! A file is a sequence of `data_<name>` blocks. Each block is either a
//! `loop_` table (a header of `_label` lines followed by whitespace-separated
//! rows) or a key/value list (`_label value`) that is stored as a table with a
//! single row. Quoted values are not supported.

mod labels;

pub use labels::Label;

use crate::core::io::traits::EmFile;
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: MetadataParseErrorKind,
    },
    #[error("Metadata file contains no rows")]
    Empty,
    #[error("No table named 'data_{0}'")]
    MissingTable(String),
    #[error("Missing metadata column '{0}'")]
    MissingLabel(String),
    #[error("Invalid value '{value}' for column '{label}'")]
    InvalidValue { label: String, value: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataParseErrorKind {
    #[error("Row has {found} values but the table declares {expected} columns")]
    ColumnCount { expected: usize, found: usize },
    #[error("Content before the first data_ block")]
    OutsideBlock,
    #[error("Key '{0}' has no value")]
    MissingValue(String),
    #[error("Unexpected line '{0}'")]
    Unexpected(String),
}

fn parse_error(line: usize, kind: MetadataParseErrorKind) -> MetadataError {
    MetadataError::Parse { line, kind }
}

/// One `data_` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    pub name: String,
    pub labels: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub is_loop: bool,
}

impl MetadataTable {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
            rows: Vec::new(),
            is_loop: true,
        }
    }

    /// Column index for a raw column name, without the leading `_`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == name)
    }

    /// Column index for a well-known label in any of its spellings.
    pub fn column_for(&self, label: Label) -> Option<usize> {
        self.labels.iter().position(|l| label.matches(l))
    }

    /// `true` for tables written with Xmipp column names.
    pub fn uses_xmipp_labels(&self) -> bool {
        !self.labels.iter().any(|l| l.starts_with("rln"))
            && self
                .labels
                .iter()
                .any(|l| Label::from_name(l).and_then(Label::xmipp_name) == Some(l.as_str()))
    }

    /// Returns the index of `label`'s column, appending it (filled with
    /// `default`) when absent. New columns follow the table's spelling and
    /// fall back to Relion's.
    pub fn ensure_column(&mut self, label: Label, default: &str) -> usize {
        if let Some(idx) = self.column_for(label) {
            return idx;
        }
        let name = match label.xmipp_name() {
            Some(name) if self.uses_xmipp_labels() => name,
            _ => label.star_name(),
        };
        self.labels.push(name.to_string());
        for row in &mut self.rows {
            row.push(default.to_string());
        }
        self.labels.len() - 1
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            labels: &self.labels,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            labels: &self.labels,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    labels: &'a [String],
    values: &'a [String],
}

impl<'a> Row<'a> {
    pub fn get(&self, name: &str) -> Option<&'a str> {
        let idx = self.labels.iter().position(|l| l == name)?;
        self.values.get(idx).map(String::as_str)
    }

    pub fn label(&self, label: Label) -> Option<&'a str> {
        let idx = self.labels.iter().position(|l| label.matches(l))?;
        self.values.get(idx).map(String::as_str)
    }

    pub fn f64(&self, label: Label) -> Result<f64, MetadataError> {
        let value = self
            .label(label)
            .ok_or_else(|| MetadataError::MissingLabel(label.star_name().to_string()))?;
        value.parse().map_err(|_| MetadataError::InvalidValue {
            label: label.star_name().to_string(),
            value: value.to_string(),
        })
    }

    pub fn to_owned(&self) -> MetadataRow {
        MetadataRow {
            labels: self.labels.to_vec(),
            values: self.values.to_vec(),
        }
    }
}

/// Owned copy of a row, as returned by [`first_row`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    labels: Vec<String>,
    values: Vec<String>,
}

impl MetadataRow {
    pub fn as_row(&self) -> Row<'_> {
        Row {
            labels: &self.labels,
            values: &self.values,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFile {
    pub tables: Vec<MetadataTable>,
}

impl MetadataFile {
    pub fn table(&self, name: &str) -> Option<&MetadataTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut MetadataTable> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn first_row(&self) -> Option<Row<'_>> {
        self.tables.first().and_then(|t| t.row(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    KeyValue,
    LoopHeader,
    LoopBody,
}

impl EmFile for MetadataFile {
    type Error = MetadataError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error> {
        let mut tables: Vec<MetadataTable> = Vec::new();
        let mut state = State::Start;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_num = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(name) = trimmed.strip_prefix("data_") {
                tables.push(MetadataTable {
                    name: name.to_string(),
                    is_loop: false,
                    ..Default::default()
                });
                state = State::KeyValue;
                continue;
            }

            let Some(table) = tables.last_mut() else {
                return Err(parse_error(line_num, MetadataParseErrorKind::OutsideBlock));
            };

            if trimmed == "loop_" {
                if !table.labels.is_empty() {
                    let name = table.name.clone();
                    tables.push(MetadataTable::new(name, Vec::new()));
                } else {
                    table.is_loop = true;
                }
                state = State::LoopHeader;
                continue;
            }

            let mut tokens = trimmed.split_whitespace();
            let first = tokens.next().unwrap_or_default();

            match state {
                State::LoopHeader if first.starts_with('_') => {
                    // Relion appends `#n` column indices; they carry no information.
                    table.labels.push(first[1..].to_string());
                }
                State::LoopHeader | State::LoopBody => {
                    let row: Vec<String> = trimmed.split_whitespace().map(str::to_owned).collect();
                    if row.len() != table.labels.len() {
                        return Err(parse_error(
                            line_num,
                            MetadataParseErrorKind::ColumnCount {
                                expected: table.labels.len(),
                                found: row.len(),
                            },
                        ));
                    }
                    table.rows.push(row);
                    state = State::LoopBody;
                }
                State::KeyValue if first.starts_with('_') => {
                    let key = first[1..].to_string();
                    let value = tokens
                        .next()
                        .ok_or_else(|| {
                            parse_error(line_num, MetadataParseErrorKind::MissingValue(key.clone()))
                        })?
                        .to_string();
                    table.labels.push(key);
                    match table.rows.first_mut() {
                        Some(row) => row.push(value),
                        None => table.rows.push(vec![value]),
                    }
                }
                State::KeyValue | State::Start => {
                    return Err(parse_error(
                        line_num,
                        MetadataParseErrorKind::Unexpected(trimmed.to_string()),
                    ));
                }
            }
        }

        Ok(Self { tables })
    }

    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error> {
        for table in &self.tables {
            writeln!(writer, "\ndata_{}\n", table.name)?;
            if table.is_loop {
                writeln!(writer, "loop_")?;
                for (i, label) in table.labels.iter().enumerate() {
                    writeln!(writer, "_{} #{}", label, i + 1)?;
                }
                for row in &table.rows {
                    writeln!(writer, "{}", row.join(" "))?;
                }
            } else if let Some(row) = table.rows.first() {
                for (label, value) in table.labels.iter().zip(row) {
                    writeln!(writer, "_{label} {value}")?;
                }
            }
        }
        Ok(())
    }
}

/// Reads `path` and returns the first row of its first table.
pub fn first_row(path: impl AsRef<Path>) -> Result<MetadataRow, MetadataError> {
    let file = MetadataFile::read_from_path(path)?;
    file.first_row()
        .map(|row| row.to_owned())
        .ok_or(MetadataError::Empty)
}
