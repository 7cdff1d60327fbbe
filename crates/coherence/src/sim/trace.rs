//! Memory reference trace loading.
//!
//! A trace is a text file with one processor reference per line:
//!
//! ```text
//! # cache  access  address
//! 0        LOAD    0x40
//! 1        W       64
//! ```
//!
//! The access is `LOAD`/`L`/`R` or `STORE`/`S`/`W` (case-insensitive); the address is
//! decimal or `0x`-prefixed hex. Blank lines and `#` comments are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::common::{CacheId, LineAddr, Message, MessageKind, NodeId};

/// Processor access kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Read of a line.
    Load,
    /// Write of a line.
    Store,
}

impl Access {
    /// Returns the processor message kind for this access.
    pub const fn kind(self) -> MessageKind {
        match self {
            Self::Load => MessageKind::Load,
            Self::Store => MessageKind::Store,
        }
    }
}

/// One processor memory reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemRef {
    /// The cache (and processor) issuing the reference.
    pub cache: CacheId,
    /// Read or write.
    pub access: Access,
    /// The referenced line.
    pub addr: LineAddr,
}

impl MemRef {
    /// A `LOAD` of `addr` by `cache`.
    pub const fn load(cache: CacheId, addr: u64) -> Self {
        Self {
            cache,
            access: Access::Load,
            addr: LineAddr(addr),
        }
    }

    /// A `STORE` to `addr` by `cache`.
    pub const fn store(cache: CacheId, addr: u64) -> Self {
        Self {
            cache,
            access: Access::Store,
            addr: LineAddr(addr),
        }
    }

    /// Returns the processor message delivered to the cache for this reference.
    pub const fn message(&self) -> Message {
        Message::new(self.access.kind(), self.addr, NodeId::Cache(self.cache))
    }
}

/// Errors raised while loading a trace.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace file could not be read.
    #[error("failed to read trace {path}: {source}")]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A line does not have the `<cache> <access> <address>` shape.
    #[error("line {line}: expected `<cache> <access> <address>`, got `{text}`")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// The offending text.
        text: String,
    },

    /// The cache id is not a number.
    #[error("line {line}: invalid cache id `{text}`")]
    BadCache {
        /// One-based line number.
        line: usize,
        /// The offending token.
        text: String,
    },

    /// The access kind is not recognized.
    #[error("line {line}: unknown access `{text}`")]
    BadAccess {
        /// One-based line number.
        line: usize,
        /// The offending token.
        text: String,
    },

    /// The address is not a decimal or hex number.
    #[error("line {line}: invalid address `{text}`")]
    BadAddress {
        /// One-based line number.
        line: usize,
        /// The offending token.
        text: String,
    },

    /// The reference names a cache the system does not have.
    #[error("line {line}: cache {cache} out of range (system has {num_caches} caches)")]
    CacheOutOfRange {
        /// One-based line number (0 for references submitted directly).
        line: usize,
        /// The requested cache.
        cache: CacheId,
        /// Number of caches in the system.
        num_caches: usize,
    },
}

fn parse_access(token: &str) -> Option<Access> {
    match token.to_ascii_uppercase().as_str() {
        "LOAD" | "L" | "R" => Some(Access::Load),
        "STORE" | "S" | "W" => Some(Access::Store),
        _ => None,
    }
}

fn parse_addr(token: &str) -> Option<u64> {
    match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

/// Parses trace text.
///
/// # Arguments
///
/// * `text` - The trace contents.
/// * `num_caches` - Number of caches in the system; larger cache ids are rejected.
///
/// # Returns
///
/// The references in file order, or the first error encountered.
pub fn parse_trace(text: &str, num_caches: usize) -> Result<Vec<MemRef>, TraceError> {
    let mut refs = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let body = raw.split('#').next().unwrap_or_default().trim();
        if body.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = body.split_whitespace().collect();
        let [cache_tok, access_tok, addr_tok] = tokens.as_slice() else {
            return Err(TraceError::Malformed {
                line,
                text: body.to_string(),
            });
        };

        let cache: CacheId = cache_tok.parse().map_err(|_| TraceError::BadCache {
            line,
            text: (*cache_tok).to_string(),
        })?;
        if cache >= num_caches {
            return Err(TraceError::CacheOutOfRange {
                line,
                cache,
                num_caches,
            });
        }
        let access = parse_access(access_tok).ok_or_else(|| TraceError::BadAccess {
            line,
            text: (*access_tok).to_string(),
        })?;
        let addr = parse_addr(addr_tok).ok_or_else(|| TraceError::BadAddress {
            line,
            text: (*addr_tok).to_string(),
        })?;

        refs.push(MemRef {
            cache,
            access,
            addr: LineAddr(addr),
        });
    }
    Ok(refs)
}

/// Reads and parses a trace file.
pub fn load_trace(path: impl AsRef<Path>, num_caches: usize) -> Result<Vec<MemRef>, TraceError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_trace(&text, num_caches)
}
