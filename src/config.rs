use std::{
    cell::RefCell,
    io::{self, Write},
    rc::Rc,
};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 100;
/// Upper bound for `max_call_depth`; deeper settings are clamped to it.
pub const MAX_CALL_DEPTH_LIMIT: usize = 128;

/// In-memory byte sink that can be shared between the host and its embedder.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Returns the contents and empties the buffer.
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.borrow_mut());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Destination for script output or diagnostics.
#[derive(Debug, Clone)]
pub enum Output {
    Stdout,
    Stderr,
    Buffer(SharedBuffer),
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout => io::stdout().lock().write(buf),
            Output::Stderr => io::stderr().lock().write(buf),
            Output::Buffer(buffer) => buffer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout => io::stdout().lock().flush(),
            Output::Stderr => io::stderr().lock().flush(),
            Output::Buffer(buffer) => buffer.flush(),
        }
    }
}

/// Settings applied when a [`State`](crate::State) is created.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Where `print` writes.
    pub stdout: Output,
    /// Where the diagnostic sink writes.
    pub diagnostics: Output,
    /// Nested script calls allowed before a `RangeError` fault.
    pub max_call_depth: usize,
}

impl HostConfig {
    /// Routes both streams into in-memory buffers, handy for embedding tests.
    pub fn captured(stdout: SharedBuffer, diagnostics: SharedBuffer) -> Self {
        Self {
            stdout: Output::Buffer(stdout),
            diagnostics: Output::Buffer(diagnostics),
            ..Self::default()
        }
    }

    /// Sets the call depth limit, clamped to [`MAX_CALL_DEPTH_LIMIT`].
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        if depth > MAX_CALL_DEPTH_LIMIT {
            tracing::warn!(
                requested = depth,
                limit = MAX_CALL_DEPTH_LIMIT,
                "max call depth clamped"
            );
        }
        self.max_call_depth = depth.min(MAX_CALL_DEPTH_LIMIT);
        self
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            stdout: Output::Stdout,
            diagnostics: Output::Stderr,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}
