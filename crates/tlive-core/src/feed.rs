//! Line-delimited JSON feeds (recorded event streams, replay scenarios).

use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use thiserror::Error;

pub const DEFAULT_MAX_LINE_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("line {line}: exceeds max size {size} > {max}")]
    OversizedLine { line: usize, size: usize, max: usize },
    #[error("line {line}: not valid utf-8")]
    InvalidUtf8 { line: usize },
    #[error("line {line}: {message}")]
    Decode { line: usize, message: String },
}

impl FeedError {
    pub fn line(&self) -> usize {
        match self {
            FeedError::OversizedLine { line, .. }
            | FeedError::InvalidUtf8 { line }
            | FeedError::Decode { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedReport<T> {
    pub items: Vec<T>,
    pub errors: Vec<FeedError>,
}

impl<T> Default for FeedReport<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> FeedReport<T> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Incremental decoder. Blank lines and lines starting with `#` are skipped;
/// a bad line is reported and decoding carries on with the next one.
pub struct NdjsonFeedDecoder<T> {
    max_line_bytes: usize,
    pending: Vec<u8>,
    line: usize,
    marker: PhantomData<T>,
}

impl<T> NdjsonFeedDecoder<T> {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            pending: Vec::new(),
            line: 0,
            marker: PhantomData,
        }
    }
}

impl<T> Default for NdjsonFeedDecoder<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl<T: DeserializeOwned> NdjsonFeedDecoder<T> {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> FeedReport<T> {
        let mut report = FeedReport::default();
        self.pending.extend_from_slice(chunk);

        while let Some(newline_idx) = self.pending.iter().position(|byte| *byte == b'\n') {
            let raw = self.pending.drain(..=newline_idx).collect::<Vec<u8>>();
            self.line += 1;
            self.decode_line(&raw, &mut report);
        }

        if self.pending.len() > self.max_line_bytes {
            report.errors.push(FeedError::OversizedLine {
                line: self.line + 1,
                size: self.pending.len(),
                max: self.max_line_bytes,
            });
            self.pending.clear();
        }

        report
    }

    pub fn finish(&mut self) -> FeedReport<T> {
        let mut report = FeedReport::default();
        if self.pending.is_empty() {
            return report;
        }
        let tail = std::mem::take(&mut self.pending);
        self.line += 1;
        self.decode_line(&tail, &mut report);
        report
    }

    fn decode_line(&self, raw: &[u8], report: &mut FeedReport<T>) {
        let line = self.line;
        if raw.len() > self.max_line_bytes {
            report.errors.push(FeedError::OversizedLine {
                line,
                size: raw.len(),
                max: self.max_line_bytes,
            });
            return;
        }
        let Ok(text) = std::str::from_utf8(raw) else {
            report.errors.push(FeedError::InvalidUtf8 { line });
            return;
        };
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            return;
        }
        match serde_json::from_str(text) {
            Ok(item) => report.items.push(item),
            Err(err) => report.errors.push(FeedError::Decode {
                line,
                message: err.to_string(),
            }),
        }
    }
}

/// Decodes a complete feed held in memory.
pub fn decode_feed<T: DeserializeOwned>(input: &[u8]) -> FeedReport<T> {
    let mut decoder = NdjsonFeedDecoder::default();
    let mut report = decoder.push_chunk(input);
    let tail = decoder.finish();
    report.items.extend(tail.items);
    report.errors.extend(tail.errors);
    report
}
