use std::{
    collections::TryReserveError,
    io::{self, Read},
};

/// Marks the end of scannable text. The lexer stops at the first one it sees.
pub const TERMINATOR: char = '\0';

/// Owned text storage used by the source loader and the lexer.
///
/// File contents are read into an exactly sized buffer that is dropped right
/// after compilation. The state also keeps one long-lived buffer as lexer
/// scratch space, which is released only at teardown.
#[derive(Debug, Default)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves room for exactly `len` bytes of content plus the terminator.
    pub fn allocate(len: usize) -> Result<Self, TryReserveError> {
        let mut text = String::new();
        text.try_reserve_exact(len.saturating_add(1))?;
        Ok(Self { text })
    }

    /// Reads at most `len` bytes from `reader`, returning how many arrived.
    ///
    /// Fails with `InvalidData` when the bytes are not UTF-8.
    pub fn fill_from<R: Read>(&mut self, reader: R, len: u64) -> io::Result<usize> {
        reader.take(len).read_to_string(&mut self.text)
    }

    pub fn terminate(&mut self) {
        self.text.push(TERMINATOR);
    }

    pub fn is_terminated(&self) -> bool {
        self.text.ends_with(TERMINATOR)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn push(&mut self, ch: char) {
        self.text.push(ch);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }

    /// Frees the backing storage and returns how many bytes were held.
    pub fn release(&mut self) -> usize {
        let freed = self.text.capacity();
        self.text = String::new();
        if freed > 0 {
            tracing::trace!(bytes = freed, "text buffer released");
        }
        freed
    }
}
