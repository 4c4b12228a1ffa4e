//! Line-boundary chunking of clean text.
//!
//! Lines are accumulated greedily: a chunk grows by whole lines while its
//! measured size, counting one `'\n'` separator between adjacent lines, stays
//! within the budget. A single line over budget is emitted on its own. Joining
//! the produced chunks with `"\n"` yields the input unchanged.

use thiserror::Error;

/// Default chunk budget, in characters.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 6000;

const SEPARATOR: &str = "\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {0}")]
pub struct InvalidConfiguration(pub String);

/// Size function applied to the budget.
///
/// Chunk size is computed as the sum of each line's measure plus the measure
/// of one separator per line break, so implementations should be additive
/// over concatenation for the size bound to be exact.
pub trait Measure {
    fn measure(&self, text: &str) -> usize;
}

/// Counts Unicode scalar values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCount;

impl Measure for CharCount {
    fn measure(&self, text: &str) -> usize {
        text.chars().count()
    }
}

impl<F> Measure for F
where
    F: Fn(&str) -> usize,
{
    fn measure(&self, text: &str) -> usize {
        self(text)
    }
}

#[derive(Debug, Clone)]
pub struct Chunker<M = CharCount> {
    max_len: usize,
    measure: M,
}

impl Chunker<CharCount> {
    pub fn new(max_len: usize) -> Result<Self, InvalidConfiguration> {
        Self::with_measure(max_len, CharCount)
    }
}

impl<M: Measure> Chunker<M> {
    pub fn with_measure(max_len: usize, measure: M) -> Result<Self, InvalidConfiguration> {
        if max_len == 0 {
            return Err(InvalidConfiguration(
                "max chunk length must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_len, measure })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Lazily split `text` into ordered chunks borrowed from it.
    ///
    /// ```
    /// use gleaner_pipeline::chunk::Chunker;
    ///
    /// let chunker = Chunker::new(7).unwrap();
    /// let chunks: Vec<&str> = chunker.chunks("one\ntwo\nthree").collect();
    /// assert_eq!(chunks, ["one\ntwo", "three"]);
    /// ```
    pub fn chunks<'a>(&'a self, text: &'a str) -> Chunks<'a, M> {
        Chunks {
            rest: (!text.is_empty()).then_some(text),
            chunker: self,
        }
    }

    fn size_of(&self, text: &str) -> usize {
        self.measure.measure(text)
    }
}

/// Iterator returned by [`Chunker::chunks`].
pub struct Chunks<'a, M> {
    rest: Option<&'a str>,
    chunker: &'a Chunker<M>,
}

impl<'a, M: Measure> Iterator for Chunks<'a, M> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        let separator = self.chunker.size_of(SEPARATOR);

        // The first line is always taken, even when it alone is over budget.
        let mut end = line_end(rest, 0);
        let mut size = self.chunker.size_of(&rest[..end]);

        while end < rest.len() {
            let next_start = end + 1;
            let next_end = line_end(rest, next_start);
            let line = self.chunker.size_of(&rest[next_start..next_end]);
            if size + separator + line > self.chunker.max_len {
                break;
            }
            size += separator + line;
            end = next_end;
        }

        self.rest = (end < rest.len()).then(|| &rest[end + 1..]);
        Some(&rest[..end])
    }
}

fn line_end(text: &str, from: usize) -> usize {
    text[from..]
        .find('\n')
        .map_or(text.len(), |offset| from + offset)
}

/// Eagerly chunk `text` with the default character measure.
pub fn chunk(text: &str, max_len: usize) -> Result<Vec<String>, InvalidConfiguration> {
    let chunker = Chunker::new(max_len)?;
    Ok(chunker.chunks(text).map(str::to_owned).collect())
}
