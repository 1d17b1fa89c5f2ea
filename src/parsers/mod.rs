//! Source adapters
//!
//! Reads source files with an ordered encoding fallback and hands the text
//! to the tree-sitter Java adapter, which produces the closed declaration
//! model from [`crate::syntax`].

pub mod java;

use anyhow::{Context, Result};
use std::path::Path;
use strum::Display;

use crate::models::ParseError;
use crate::syntax::CompilationUnit;

/// Result of adapting one file
///
/// `unit` is `None` when the file was rejected as a whole (read or syntax
/// failure); `errors` may be non-empty either way.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub unit: Option<CompilationUnit>,
    pub errors: Vec<ParseError>,
}

/// Text encodings tried in order when reading a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SourceEncoding {
    #[strum(to_string = "utf-8")]
    Utf8,
    #[strum(to_string = "windows-1252")]
    Windows1252,
    #[strum(to_string = "iso-8859-1")]
    Latin1,
}

const ENCODINGS: [SourceEncoding; 3] = [
    SourceEncoding::Utf8,
    SourceEncoding::Windows1252,
    SourceEncoding::Latin1,
];

/// Read a file as text, falling back through [`SourceEncoding`]s
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let (text, encoding) = decode(&bytes)
        .with_context(|| format!("No encoding could decode {}", path.display()))?;

    if encoding != SourceEncoding::Utf8 {
        log::debug!("Decoded {} as {}", path.display(), encoding);
    }

    Ok(text)
}

/// Decode raw bytes using the first encoding that accepts them
pub fn decode(bytes: &[u8]) -> Option<(String, SourceEncoding)> {
    ENCODINGS
        .iter()
        .find_map(|&encoding| decode_as(bytes, encoding).map(|text| (text, encoding)))
}

fn decode_as(bytes: &[u8], encoding: SourceEncoding) -> Option<String> {
    match encoding {
        SourceEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            std::str::from_utf8(bytes).ok().map(str::to_string)
        }
        SourceEncoding::Windows1252 => bytes
            .iter()
            .map(|&b| match b {
                0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
                _ => Some(b as char),
            })
            .collect(),
        SourceEncoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Windows-1252 mapping for 0x80..=0x9F; `None` marks undefined bytes
const WINDOWS_1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];
