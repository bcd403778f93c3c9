/// Outcome of completing one line inside a [`BoundedLineAccumulator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundedLine {
    Line(Vec<u8>),
    TooLong {
        observed_bytes: usize,
        max_line_bytes: usize,
    },
}

/// Splits a stream of byte chunks into newline-delimited lines without ever
/// holding more than `max_line_bytes` of a single line in memory — the
/// executor pool already caps total output, this caps a single pathological
/// line within that budget.
///
/// Mirrors the bounded-memory discipline of a chunked line reader: once a
/// line exceeds the budget, further bytes for that line are discarded until
/// the next newline, and [`BoundedLine::TooLong`] is reported once instead of
/// the (truncated, misleading) partial content.
pub struct BoundedLineAccumulator {
    max_line_bytes: usize,
    current: Vec<u8>,
    observed_bytes: usize,
    discard_mode: bool,
}

impl BoundedLineAccumulator {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            current: Vec::new(),
            observed_bytes: 0,
            discard_mode: false,
        }
    }

    /// Feeds a freshly-read chunk, returning every line it completed (in
    /// order). A chunk with no embedded newline may complete zero lines.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<BoundedLine> {
        let mut completed = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                completed.push(self.finish_line());
                continue;
            }
            self.observed_bytes += 1;
            if self.discard_mode {
                continue;
            }
            if self.current.len() >= self.max_line_bytes {
                self.discard_mode = true;
                continue;
            }
            self.current.push(byte);
        }
        completed
    }

    /// Flushes a trailing partial line once the underlying stream has
    /// closed. Returns `None` if nothing was buffered.
    pub fn finish(&mut self) -> Option<BoundedLine> {
        if self.current.is_empty() && self.observed_bytes == 0 {
            return None;
        }
        Some(self.finish_line())
    }

    fn finish_line(&mut self) -> BoundedLine {
        let line = if self.discard_mode {
            BoundedLine::TooLong {
                observed_bytes: self.observed_bytes,
                max_line_bytes: self.max_line_bytes,
            }
        } else {
            BoundedLine::Line(std::mem::take(&mut self.current))
        };
        self.current.clear();
        self.observed_bytes = 0;
        self.discard_mode = false;
        line
    }
}
