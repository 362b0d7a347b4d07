// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Filtered trace text format
//!
//! Two header lines followed by one `<kind> <offset> <length>` line per
//! operation. Readers skip the first two lines without looking at them, so
//! hand-edited headers are fine.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::constants::{TRACE_HEADER, TRACE_HEADER_RULE};
use crate::error::IoReplayError;
use crate::strace::{open_log, LineSource};
use crate::types::{IoOperation, OpKind, Trace};

const HEADER_LINES: usize = 2;

/// Write the header and one line per operation
pub fn encode<W: Write>(trace: &Trace, mut writer: W) -> std::io::Result<()> {
    writeln!(writer, "{}", TRACE_HEADER)?;
    writeln!(writer, "{}", TRACE_HEADER_RULE)?;
    for op in trace {
        writeln!(writer, "{} {} {}", op.kind.code(), op.offset, op.length)?;
    }
    writer.flush()
}

/// Parse one data line; `None` if it is not three valid integers
pub fn decode_line(line: &str) -> Option<IoOperation> {
    let mut fields = line.split_whitespace();
    let kind = OpKind::from_code(fields.next()?.parse().ok()?)?;
    let offset = fields.next()?.parse().ok()?;
    let length = fields.next()?.parse().ok()?;
    Some(IoOperation::new(kind, offset, length))
}

/// Decode a filtered trace, dropping malformed lines
pub fn decode<R: BufRead>(reader: R) -> Result<Trace> {
    let mut trace = Trace::new();
    let mut skipped = 0;

    for (line_num, line) in LineSource::new(reader).enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;
        if line_num < HEADER_LINES || line.trim().is_empty() {
            continue;
        }

        match decode_line(&line) {
            Some(op) => trace.push(op),
            None => {
                warn!("Skipping malformed trace line {}: {:?}", line_num + 1, line);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        info!("Skipped {} invalid trace entries", skipped);
    }

    trace.compact();
    Ok(trace)
}

/// Load a filtered trace from disk (`.zst` aware)
pub fn load<P: AsRef<Path>>(path: P) -> Result<Trace, IoReplayError> {
    let path = path.as_ref();
    let trace = decode(open_log(path)?)?;
    info!("Loaded {} operations from {:?}", trace.len(), path);
    Ok(trace)
}

/// Save a filtered trace to disk, zstd-compressed when the name ends in `.zst`
pub fn save<P: AsRef<Path>>(trace: &Trace, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create trace file: {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext == "zst") {
        let mut encoder = zstd::stream::write::Encoder::new(file, 0)
            .context("Failed to create zstd encoder")?;
        encode(trace, &mut encoder)?;
        encoder.finish().context("Failed to finish zstd stream")?;
    } else {
        encode(trace, BufWriter::new(file))?;
    }

    info!("Wrote {} operations to {:?}", trace.len(), path);
    Ok(())
}
