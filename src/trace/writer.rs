use crate::time::SimTime;
use std::{
    fmt::Display,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

///
/// A buffered trace file, recording tab separated values
/// together with the time they were observed at.
///
pub struct TraceWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records: usize,
}

impl TraceWriter {
    ///
    /// Creates (or truncates) the trace file at the given path,
    /// creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file could not be created.
    ///
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    ///
    /// The path of the underlying file.
    ///
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    ///
    /// The number of records written so far.
    ///
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    ///
    /// Writes a record `time\tv0\tv1...`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the file failed.
    ///
    pub fn record(&mut self, time: SimTime, values: &[&dyn Display]) -> io::Result<()> {
        write!(self.writer, "{}", time.as_secs_f64())?;
        for value in values {
            write!(self.writer, "\t{value}")?;
        }
        writeln!(self.writer)?;
        self.records += 1;
        Ok(())
    }

    ///
    /// Writes a free form line, without a timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the file failed.
    ///
    pub fn line(&mut self, line: impl Display) -> io::Result<()> {
        writeln!(self.writer, "{line}")
    }

    ///
    /// Flushes all buffered records to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the file failed.
    ///
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl std::fmt::Debug for TraceWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceWriter")
            .field("path", &self.path)
            .field("records", &self.records)
            .finish()
    }
}
