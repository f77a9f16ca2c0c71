//! Shape of the password and guess construction.

use crate::config::SolverConfig;

/// Fixed-width numeric chunks making up the password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordLayout {
    chunks: usize,
    chunk_width: usize,
}

impl PasswordLayout {
    pub fn new(chunks: usize, chunk_width: usize) -> Self {
        Self {
            chunks,
            chunk_width,
        }
    }

    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(config.chunks, config.chunk_width())
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn chunk_width(&self) -> usize {
        self.chunk_width
    }

    pub fn password_length(&self) -> usize {
        self.chunks * self.chunk_width
    }

    /// Number of distinct values a single chunk can take.
    pub fn chunk_space(&self) -> u64 {
        10u64.saturating_pow(self.chunk_width as u32)
    }

    /// Zero-pad `value` to the chunk width.
    pub fn format_chunk(&self, value: u64) -> String {
        format!("{value:0width$}", width = self.chunk_width)
    }

    /// Build a full-length guess: solved chunks first, then the counter for
    /// the active chunk, then zero filler.
    pub fn generate_guess(
        &self,
        verified_chunks: &[String],
        chunk_index: usize,
        counter: u64,
    ) -> String {
        let mut guess = String::with_capacity(self.password_length());
        for position in 0..self.chunks {
            if position < chunk_index {
                match verified_chunks.get(position) {
                    Some(chunk) => guess.push_str(chunk),
                    None => guess.push_str(&self.filler()),
                }
            } else if position == chunk_index {
                guess.push_str(&self.format_chunk(counter));
            } else {
                guess.push_str(&self.filler());
            }
        }
        guess
    }

    fn filler(&self) -> String {
        "0".repeat(self.chunk_width)
    }
}
