// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Syscall-log parser
//!
//! Reads `strace -f -y` style output, tracks the file offset of every
//! descriptor the way the kernel would, and keeps the `read`/`write` calls
//! that are single, sector-aligned blocks.
//!
//! Two line shapes are recognised:
//!
//! ```text
//! [pid 1234] lseek(16</data/file>, 101429760, SEEK_SET) = 101429760
//! [pid 1234] read(16</data/file>, "..."..., 512) = 512
//! ```
//!
//! Everything else is skipped without touching parser state.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, trace, warn};

use crate::constants::{BLOCK_SIZE, DEFAULT_MAX_DESCRIPTORS};
use crate::error::IoReplayError;
use crate::types::{IoOperation, OpKind, Trace};

static LSEEK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[pid\s+\d+\]\s+lseek\((-?\d+)<[^>]*>,\s*(-?\d+),\s*([^)]+)\)\s*=\s*(-?\d+)")
        .expect("lseek pattern")
});

// The buffer argument is skipped greedily so quoted data containing commas
// does not shift the size column.
static TRANSFER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[pid\s+\d+\]\s+([a-z]{1,9})\((-?\d+)<[^>]*>,.*,\s*(-?\d+)\)\s*=\s*(-?\d+)")
        .expect("transfer pattern")
});

/// Filter and table bounds for the parser
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Only transfers of exactly this size, at offsets aligned to it, are kept
    pub block_size: u64,

    /// Descriptors outside `0..max_descriptors` are ignored
    pub max_descriptors: i64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            max_descriptors: DEFAULT_MAX_DESCRIPTORS,
        }
    }
}

/// Offset bookkeeping for one descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorState {
    pub offset: i64,
    pub initialized: bool,
}

/// Counters collected while parsing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: u64,
    pub seeks: u64,
    pub transfers: u64,
    pub emitted: u64,
    pub out_of_range: u64,
}

/// One recognised log line
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogLine<'a> {
    Seek { fd: i64, result: i64 },
    Transfer { name: &'a str, fd: i64, size: i64, transferred: i64 },
}

fn classify(line: &str) -> Option<LogLine<'_>> {
    if let Some(caps) = LSEEK_RE.captures(line) {
        let fd = caps[1].parse().ok()?;
        let result = caps[4].parse().ok()?;
        return Some(LogLine::Seek { fd, result });
    }

    if let Some(caps) = TRANSFER_RE.captures(line) {
        let name = caps.get(1)?.as_str();
        let fd = caps[2].parse().ok()?;
        let size = caps[3].parse().ok()?;
        let transferred = caps[4].parse().ok()?;
        return Some(LogLine::Transfer { name, fd, size, transferred });
    }

    None
}

/// Lazy line iterator over a buffered source.
///
/// Lines are decoded lossily so binary payloads in the log never abort a
/// parse. Once the source is exhausted (or fails) the iterator stays done.
pub struct LineSource<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: Vec::new(), done: false }
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
                    self.buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for LineSource<R> {}

/// Stateful syscall-log parser
#[derive(Debug, Default)]
pub struct TraceParser {
    config: ParserConfig,
    descriptors: HashMap<i64, DescriptorState>,
    stats: ParseStats,
}

impl TraceParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser with custom bounds; a block size of 0 or above `u32::MAX`
    /// falls back to [`BLOCK_SIZE`].
    pub fn with_config(mut config: ParserConfig) -> Self {
        if config.block_size == 0 || config.block_size > u32::MAX as u64 {
            warn!("Invalid block size {}; using {}", config.block_size, BLOCK_SIZE);
            config.block_size = BLOCK_SIZE;
        }
        Self { config, ..Default::default() }
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Current state of a descriptor, if it has been seen
    pub fn descriptor(&self, fd: i64) -> Option<DescriptorState> {
        self.descriptors.get(&fd).copied()
    }

    fn in_range(&self, fd: i64) -> bool {
        fd >= 0 && fd < self.config.max_descriptors
    }

    /// Feed one log line; returns the operation if it passes the filter.
    pub fn process_line(&mut self, line: &str) -> Option<IoOperation> {
        self.stats.lines += 1;

        match classify(line)? {
            LogLine::Seek { fd, result } => {
                if !self.in_range(fd) {
                    self.stats.out_of_range += 1;
                    return None;
                }
                self.stats.seeks += 1;
                // A failed lseek does not move the file position.
                if result < 0 {
                    trace!("Ignoring failed lseek on fd {}", fd);
                    return None;
                }
                self.descriptors.insert(fd, DescriptorState { offset: result, initialized: true });
                None
            }
            LogLine::Transfer { name, fd, size, transferred } => {
                let kind: OpKind = name.parse().ok()?;
                if !self.in_range(fd) {
                    self.stats.out_of_range += 1;
                    return None;
                }
                self.stats.transfers += 1;

                let block = self.config.block_size as i64;
                let state = self.descriptors.entry(fd).or_default();
                if !state.initialized {
                    *state = DescriptorState { offset: 0, initialized: true };
                }

                let before = state.offset;
                let emitted = (size == block && before.rem_euclid(block) == 0 && before >= 0)
                    .then(|| IoOperation::new(kind, before as u64, size as u32));

                if transferred > 0 {
                    match state.offset.checked_add(transferred) {
                        Some(offset) => state.offset = offset,
                        None => debug!("Offset of fd {} would overflow; left at {}", fd, state.offset),
                    }
                }

                if emitted.is_some() {
                    self.stats.emitted += 1;
                }
                emitted
            }
        }
    }

    /// Parse every line of a buffered reader into a trace
    pub fn parse_reader<R: BufRead>(&mut self, reader: R) -> Result<Trace> {
        let mut trace = Trace::new();
        for (line_num, line) in LineSource::new(reader).enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;
            if let Some(op) = self.process_line(&line) {
                trace.push(op);
            }
        }

        debug!("Parse counters: {:?}", self.stats);
        Ok(trace)
    }

    /// Parse a syscall log file; `.zst` files are decompressed on the fly.
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Trace, IoReplayError> {
        let path = path.as_ref();
        let reader = open_log(path)?;

        info!("Parsing syscall log {:?}", path);
        let trace = self.parse_reader(reader)?;
        info!(
            "Kept {} of {} transfers ({} lines, {} seeks, {} out-of-range descriptors)",
            self.stats.emitted,
            self.stats.transfers,
            self.stats.lines,
            self.stats.seeks,
            self.stats.out_of_range
        );
        Ok(trace)
    }
}

/// Open a text source with optional zstd decompression
pub(crate) fn open_log(path: &Path) -> Result<Box<dyn BufRead>, IoReplayError> {
    let file = File::open(path).map_err(|source| IoReplayError::TraceOpen {
        path: path.to_path_buf(),
        source,
    })?;

    if path.extension().is_some_and(|ext| ext == "zst") {
        let decoder = zstd::stream::read::Decoder::new(file).map_err(|source| {
            IoReplayError::TraceOpen { path: path.to_path_buf(), source }
        })?;
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_line(fd: i64, size: i64, transferred: i64) -> String {
        format!("[pid 42] read({}</data/f>, \"\"..., {}) = {}", fd, size, transferred)
    }

    #[test]
    fn test_classify_lseek() {
        let line = "[pid 7] lseek(16</data/file>, 101429760, SEEK_SET) = 101429760";
        assert_eq!(classify(line), Some(LogLine::Seek { fd: 16, result: 101429760 }));
    }

    #[test]
    fn test_classify_transfer_with_commas_in_buffer() {
        let line = "[pid 7] write(3</tmp/x>, \"a, b, c\"..., 512) = 512";
        assert_eq!(
            classify(line),
            Some(LogLine::Transfer { name: "write", fd: 3, size: 512, transferred: 512 })
        );
    }

    #[test]
    fn test_classify_rejects_unprefixed_lines() {
        assert_eq!(classify("read(3</x>, \"\", 512) = 512"), None);
        assert_eq!(classify("[pid 7] openat(AT_FDCWD, \"/x\", O_RDONLY) = 3"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_aligned_block_is_emitted() {
        let mut parser = TraceParser::new();
        let op = parser.process_line(&read_line(5, 512, 512));
        assert_eq!(op, Some(IoOperation::new(OpKind::Read, 0, 512)));
        assert_eq!(parser.descriptor(5), Some(DescriptorState { offset: 512, initialized: true }));
    }

    #[test]
    fn test_wrong_size_advances_offset_without_emitting() {
        let mut parser = TraceParser::new();
        assert_eq!(parser.process_line(&read_line(5, 100, 100)), None);
        assert_eq!(parser.descriptor(5).unwrap().offset, 100);

        // Now misaligned: size matches but offset does not
        assert_eq!(parser.process_line(&read_line(5, 512, 512)), None);
        assert_eq!(parser.descriptor(5).unwrap().offset, 612);
    }

    #[test]
    fn test_short_read_advances_by_transferred() {
        let mut parser = TraceParser::new();
        let op = parser.process_line(&read_line(4, 512, 200));
        assert_eq!(op, Some(IoOperation::new(OpKind::Read, 0, 512)));
        assert_eq!(parser.descriptor(4).unwrap().offset, 200);
    }

    #[test]
    fn test_failed_transfer_does_not_advance() {
        let mut parser = TraceParser::new();
        parser.process_line("[pid 1] read(4</x>, 0x7ffd, 512) = -1 EBADF (Bad file descriptor)");
        assert_eq!(parser.descriptor(4).unwrap().offset, 0);
        parser.process_line(&read_line(4, 512, 0));
        assert_eq!(parser.descriptor(4).unwrap().offset, 0);
    }

    #[test]
    fn test_lseek_positions_descriptor() {
        let mut parser = TraceParser::new();
        assert_eq!(parser.process_line("[pid 1] lseek(9</d>, 4096, SEEK_SET) = 4096"), None);
        let op = parser.process_line("[pid 1] write(9</d>, \"x\"..., 512) = 512");
        assert_eq!(op, Some(IoOperation::new(OpKind::Write, 4096, 512)));
    }

    #[test]
    fn test_failed_lseek_is_ignored() {
        let mut parser = TraceParser::new();
        parser.process_line("[pid 1] lseek(9</d>, 1024, SEEK_SET) = 1024");
        parser.process_line("[pid 1] lseek(9</d>, -5, SEEK_SET) = -1 EINVAL (Invalid argument)");
        assert_eq!(parser.descriptor(9).unwrap().offset, 1024);
    }

    #[test]
    fn test_offset_overflow_leaves_descriptor_unchanged() {
        let mut parser = TraceParser::new();
        parser.process_line("[pid 1] lseek(3</d>, 0, SEEK_END) = 9223372036854775807");
        assert_eq!(parser.process_line("[pid 1] read(3</d>, \"\"..., 512) = 512"), None);
        assert_eq!(parser.descriptor(3).unwrap().offset, i64::MAX);
        assert_eq!(parser.stats().transfers, 1);
    }

    #[test]
    fn test_invalid_block_size_falls_back_to_sector() {
        let mut parser = TraceParser::with_config(ParserConfig { block_size: 0, ..Default::default() });
        let op = parser.process_line(&read_line(3, 512, 512));
        assert_eq!(op, Some(IoOperation::new(OpKind::Read, 0, 512)));

        let mut huge = TraceParser::with_config(ParserConfig { block_size: 1 << 40, ..Default::default() });
        assert!(huge.process_line(&read_line(3, 512, 512)).is_some());
    }

    #[test]
    fn test_out_of_range_descriptors_are_ignored() {
        let mut parser = TraceParser::new();
        assert_eq!(parser.process_line(&read_line(4096, 512, 512)), None);
        assert_eq!(parser.descriptor(4096), None);
        assert_eq!(parser.stats().out_of_range, 1);

        let mut small = TraceParser::with_config(ParserConfig { max_descriptors: 8, ..Default::default() });
        assert_eq!(small.process_line(&read_line(8, 512, 512)), None);
        assert!(small.process_line(&read_line(7, 512, 512)).is_some());
    }

    #[test]
    fn test_other_syscall_names_are_skipped() {
        let mut parser = TraceParser::new();
        assert_eq!(parser.process_line("[pid 1] readv(3</x>, [{...}], 512) = 512"), None);
        assert_eq!(parser.descriptor(3), None);
    }

    #[test]
    fn test_parse_reader_keeps_line_order() {
        let log = [
            "[pid 10] read(3</a>, \"\"..., 512) = 512",
            "garbage line",
            "[pid 11] write(4</b>, \"\"..., 512) = 512",
            "[pid 10] read(3</a>, \"\"..., 512) = 512",
        ]
        .join("\n");

        let trace = TraceParser::new().parse_reader(Cursor::new(log)).unwrap();
        assert_eq!(
            trace.operations(),
            &[
                IoOperation::new(OpKind::Read, 0, 512),
                IoOperation::new(OpKind::Write, 0, 512),
                IoOperation::new(OpKind::Read, 512, 512),
            ]
        );
    }

    #[test]
    fn test_line_source_is_fused_and_lossy() {
        let data: &[u8] = b"one\r\ntwo\xff\nthree";
        let mut lines = LineSource::new(Cursor::new(data));
        assert_eq!(lines.next().unwrap().unwrap(), "one");
        assert_eq!(lines.next().unwrap().unwrap(), "two\u{fffd}");
        assert_eq!(lines.next().unwrap().unwrap(), "three");
        assert!(lines.next().is_none());
        assert!(lines.next().is_none());
    }
}
