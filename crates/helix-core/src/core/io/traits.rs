use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Common interface of the text formats read and written by the library.
///
/// Implementors only parse from a buffered reader and serialize to a writer;
/// opening and creating files is handled by the provided methods.
pub trait EmFile: Sized {
    /// The error type for parsing and I/O operations.
    type Error: Error + From<io::Error>;

    /// Parses the whole content of `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed or reading fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error>;

    /// Serializes `self` to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
