//! Incremental writing of JSON array documents.
//!
//! A [`JsonArraySink`] streams serialized entities into a file holding one
//! top-level JSON array.  Between [`JsonArraySink::open`] and
//! [`JsonArraySink::close`] the file lacks its closing bracket; only a closed
//! sink leaves valid JSON behind.

use std::{
    fs::File,
    io::{BufWriter, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::err::Error;

/// Indentation used for the entity objects.
const INDENT: &[u8] = b"    ";

/// Append-only JSON array backed by a single file.
pub struct JsonArraySink<T> {
    path: PathBuf,
    writer: BufWriter<File>,
    count: usize,
    _entity: PhantomData<fn(&T)>,
}

impl<T: Serialize> JsonArraySink<T> {
    /// Create or truncate the file at `path` and start the array.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        tracing::debug!("opening JSON array sink {:?}", &path);
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(b"[")?;
        Ok(Self {
            path,
            writer,
            count: 0,
            _entity: PhantomData,
        })
    }

    /// Append `entity` as the next array element.
    pub fn append(&mut self, entity: &T) -> Result<(), Error> {
        let separator: &[u8] = if self.count == 0 { b"\n" } else { b",\n" };
        self.writer.write_all(separator)?;
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut self.writer,
            PrettyFormatter::with_indent(INDENT),
        );
        entity.serialize(&mut serializer).map_err(|e| {
            if e.is_io() {
                Error::Io(e.into())
            } else {
                Error::Json(e)
            }
        })?;
        self.count += 1;
        Ok(())
    }

    /// Number of entities appended so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Close the array and sync the file; returns the number of entities.
    pub fn close(mut self) -> Result<usize, Error> {
        if self.count == 0 {
            self.writer.write_all(b"]\n")?;
        } else {
            self.writer.write_all(b"\n]\n")?;
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        tracing::debug!(
            "closed JSON array sink {:?} with {} entities",
            &self.path,
            self.count
        );
        Ok(self.count)
    }
}
