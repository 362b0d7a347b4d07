// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for replayable I/O operations
//!
//! These types are shared by the trace parser, the trace codec and the
//! replay engine.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Direction of a replayable operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Read,
    Write,
}

impl OpKind {
    /// Numeric code used in the filtered trace format (0 = read, 1 = write)
    pub fn code(self) -> u8 {
        match self {
            OpKind::Read => 0,
            OpKind::Write => 1,
        }
    }

    /// Inverse of [`OpKind::code`]; any other value is rejected
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(OpKind::Read),
            1 => Some(OpKind::Write),
            _ => None,
        }
    }
}

impl FromStr for OpKind {
    type Err = anyhow::Error;

    /// Syscall names are matched exactly: `read` or `write`, nothing else.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(OpKind::Read),
            "write" => Ok(OpKind::Write),
            _ => bail!("Unknown transfer syscall: {}", s),
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Read => write!(f, "read"),
            OpKind::Write => write!(f, "write"),
        }
    }
}

/// Single replayable operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoOperation {
    pub kind: OpKind,

    /// Absolute byte offset in the target
    pub offset: u64,

    /// Requested transfer size in bytes
    pub length: u32,
}

impl IoOperation {
    pub fn new(kind: OpKind, offset: u64, length: u32) -> Self {
        Self { kind, offset, length }
    }
}

/// Ordered list of operations; the order is the replay order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    ops: Vec<IoOperation>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: IoOperation) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn operations(&self) -> &[IoOperation] {
        &self.ops
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IoOperation> {
        self.ops.iter()
    }

    /// Largest requested length, or `None` for an empty trace
    pub fn max_length(&self) -> Option<u32> {
        self.ops.iter().map(|op| op.length).max()
    }

    /// Sum of requested lengths
    pub fn total_bytes(&self) -> u64 {
        self.ops.iter().map(|op| op.length as u64).sum()
    }

    /// Drop spare capacity left by amortized growth
    pub fn compact(&mut self) {
        self.ops.shrink_to_fit();
    }
}

impl From<Vec<IoOperation>> for Trace {
    fn from(ops: Vec<IoOperation>) -> Self {
        Self { ops }
    }
}

impl FromIterator<IoOperation> for Trace {
    fn from_iter<I: IntoIterator<Item = IoOperation>>(iter: I) -> Self {
        Self { ops: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a IoOperation;
    type IntoIter = std::slice::Iter<'a, IoOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_kind_parse() {
        assert_eq!("read".parse::<OpKind>().unwrap(), OpKind::Read);
        assert_eq!("write".parse::<OpKind>().unwrap(), OpKind::Write);
        assert!("READ".parse::<OpKind>().is_err());
        assert!("pread64".parse::<OpKind>().is_err());
    }

    #[test]
    fn test_op_kind_codes() {
        assert_eq!(OpKind::Read.code(), 0);
        assert_eq!(OpKind::Write.code(), 1);
        assert_eq!(OpKind::from_code(0), Some(OpKind::Read));
        assert_eq!(OpKind::from_code(1), Some(OpKind::Write));
        assert_eq!(OpKind::from_code(2), None);
        assert_eq!(OpKind::from_code(-1), None);
    }

    #[test]
    fn test_trace_max_length() {
        let mut trace = Trace::new();
        assert_eq!(trace.max_length(), None);
        trace.push(IoOperation::new(OpKind::Read, 0, 512));
        trace.push(IoOperation::new(OpKind::Write, 4096, 4096));
        assert_eq!(trace.max_length(), Some(4096));
        assert_eq!(trace.total_bytes(), 4608);
    }
}
