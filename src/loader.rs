use std::{
    fs::File,
    io::{self, Seek, SeekFrom},
    path::Path,
};

use thiserror::Error;

use crate::{
    buffer::TextBuffer,
    compile::{CompileError, STRING_UNIT_NAME},
    diagnostics::Status,
    state::State,
};

/// Everything that can stop a load before a unit exists.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open file: '{path}'")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot seek in file: '{path}'")]
    Seek {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot allocate storage for file contents: '{path}'")]
    Allocate { path: String },
    #[error("cannot read data from file: '{path}'")]
    Read { path: String },
    #[error("file is not valid UTF-8: '{path}'")]
    Encoding { path: String },
    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl State {
    /// Compiles `source` against the global environment under the unit name
    /// `(string)`. On success the unit becomes the pending unit.
    pub fn load_from_string(&mut self, source: &str) -> Status {
        self.load_named(STRING_UNIT_NAME, source)
    }

    /// Reads the file at `path` into an exactly sized, terminated buffer and
    /// compiles it under the path as unit name.
    ///
    /// The buffer and the file handle are released before this returns,
    /// whatever the outcome. A failed load leaves the state untouched.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Status {
        let path = path.as_ref();
        let name = path.display().to_string();
        let buffer = match read_source(path, &name) {
            Ok(buffer) => buffer,
            Err(err) => return self.report(err),
        };
        self.load_named(&name, buffer.as_str())
    }

    fn load_named(&mut self, name: &str, source: &str) -> Status {
        tracing::debug!(unit = name, bytes = source.len(), "loading source");
        match self.runtime.compile(name, source) {
            Ok(unit) => {
                self.loaded = Some(unit);
                Status::Success
            }
            Err(err) => self.report(LoadError::from(err)),
        }
    }
}

/// Opens `path`, measures it, and reads it whole into a terminated buffer.
/// The file is closed when this returns.
fn read_source(path: &Path, name: &str) -> Result<TextBuffer, LoadError> {
    let mut file = File::open(path).map_err(|source| LoadError::Open {
        path: name.to_string(),
        source,
    })?;
    let seek_error = |source: io::Error| LoadError::Seek {
        path: name.to_string(),
        source,
    };
    let len = file.seek(SeekFrom::End(0)).map_err(seek_error)?;
    file.seek(SeekFrom::Start(0)).map_err(seek_error)?;

    let byte_len = usize::try_from(len).map_err(|_| LoadError::Allocate {
        path: name.to_string(),
    })?;
    let mut buffer = TextBuffer::allocate(byte_len).map_err(|_| LoadError::Allocate {
        path: name.to_string(),
    })?;

    let read = buffer.fill_from(&mut file, len).map_err(|err| match err.kind() {
        io::ErrorKind::InvalidData => LoadError::Encoding {
            path: name.to_string(),
        },
        _ => LoadError::Read {
            path: name.to_string(),
        },
    })?;
    if read != byte_len {
        return Err(LoadError::Read {
            path: name.to_string(),
        });
    }
    buffer.terminate();
    Ok(buffer)
}
