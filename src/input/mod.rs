//! Line source
//!
//! Turns the input file into task-sized chunks of text. Each line loses its
//! terminator (`\n` or `\r\n`); a line longer than [`MAX_TEXT_LEN`] bytes is
//! cut into consecutive chunks on UTF-8 character boundaries, and each chunk
//! becomes its own line task. Blank lines produce one empty chunk. Bytes that
//! are not valid UTF-8 are replaced lossily.
//!
//! Input is read incrementally: at most one chunk plus two bytes of
//! look-ahead is buffered, however long the physical line is. The look-ahead
//! keeps a line of exactly one chunk followed by `\r\n` from producing a
//! trailing empty chunk.

use crate::protocol::MAX_TEXT_LEN;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Iterator over task-sized chunks of an input
pub struct LineSource<R> {
    reader: R,
    /// Unsent bytes of the current line, terminator excluded
    window: Vec<u8>,
    /// Largest chunk in bytes
    max: usize,
    /// The current line's terminator has been consumed
    line_end: bool,
    eof: bool,
    lines_read: u64,
}

impl LineSource<BufReader<File>> {
    /// Open `path` for reading
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> LineSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self::with_max(reader, MAX_TEXT_LEN)
    }

    fn with_max(reader: R, max: usize) -> Self {
        Self {
            reader,
            window: Vec::with_capacity(max + 2),
            max,
            line_end: false,
            eof: false,
            lines_read: 0,
        }
    }

    /// Physical lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Read until the window is full, the line ends, or the input does
    fn fill(&mut self) -> io::Result<()> {
        let limit = self.max + 2;

        while !self.line_end && !self.eof && self.window.len() < limit {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                self.eof = true;
                break;
            }

            let scan = &available[..available.len().min(limit - self.window.len())];
            let used = match scan.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.window.extend_from_slice(&scan[..pos]);
                    if self.window.last() == Some(&b'\r') {
                        self.window.pop();
                    }
                    self.line_end = true;
                    pos + 1
                }
                None => {
                    self.window.extend_from_slice(scan);
                    scan.len()
                }
            };
            self.reader.consume(used);
        }
        Ok(())
    }

    fn next_chunk(&mut self) -> io::Result<Option<String>> {
        self.fill()?;
        if self.window.is_empty() && !self.line_end {
            return Ok(None);
        }

        let whole_line = (self.line_end || self.eof) && self.window.len() <= self.max;
        let cut = if whole_line {
            self.window.len()
        } else {
            char_cut(&self.window, self.max)
        };

        let mut text = String::from_utf8_lossy(&self.window[..cut]).into_owned();
        let rest = self.window.split_off(cut);
        self.window = rest;

        // Replacement characters can push a chunk over the limit
        let mut finished = whole_line;
        if text.len() > self.max {
            let mut keep = self.max;
            while !text.is_char_boundary(keep) {
                keep -= 1;
            }
            if keep > 0 {
                let mut carried = text.split_off(keep).into_bytes();
                carried.append(&mut self.window);
                self.window = carried;
                finished = false;
            }
        }

        if finished {
            self.line_end = false;
            self.lines_read += 1;
        }
        Ok(Some(text))
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

/// Largest prefix of `bytes` of at most `max` bytes that ends on a character
/// boundary
///
/// A single character wider than `max` is taken whole. Invalid sequences
/// are cut anywhere.
fn char_cut(bytes: &[u8], max: usize) -> usize {
    if bytes.len() <= max {
        return bytes.len();
    }

    let is_continuation = |b: u8| b & 0xC0 == 0x80;
    let mut cut = max;
    while cut > 0 && is_continuation(bytes[cut]) {
        cut -= 1;
    }
    if cut == 0 {
        cut = 1;
        while cut < bytes.len() && is_continuation(bytes[cut]) {
            cut += 1;
        }
    }
    cut
}
