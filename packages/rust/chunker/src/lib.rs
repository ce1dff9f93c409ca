//! Line-windowed chunking of JavaScript source text.
//!
//! Splits a source file into overlapping windows so that a construct
//! spanning a window boundary (e.g., a multi-line endpoint-table literal)
//! is fully visible in at least one window. Duplicate sightings caused by
//! the overlap are absorbed downstream by the reconciler.

use tracing::debug;

use apiscout_shared::{ApiScoutError, Result};

// ---------------------------------------------------------------------------
// SourceText
// ---------------------------------------------------------------------------

/// The full input file content plus its line count. Immutable, owned by the
/// analysis facade for the duration of one run.
#[derive(Debug, Clone)]
pub struct SourceText {
    text: String,
    total_lines: u32,
}

impl SourceText {
    /// Wrap raw source text, counting its lines once.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let total_lines = text.lines().count() as u32;
        Self { text, total_lines }
    }

    /// The full text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Total number of lines. Zero for empty input.
    pub fn total_lines(&self) -> u32 {
        self.total_lines
    }

    /// True when the input contains no lines at all.
    pub fn is_empty(&self) -> bool {
        self.total_lines == 0
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// A contiguous slice of source text in original-file line coordinates.
/// `start_line` and `end_line` are 1-based and inclusive. Produced once by
/// [`split`]; read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// First line of the window in the original file.
    pub start_line: u32,
    /// Last line of the window in the original file.
    pub end_line: u32,
    /// The window's own text.
    pub text: String,
}

impl Window {
    /// Number of lines in this window.
    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }

    /// The last `max_lines` lines of the window, used as surrounding
    /// context for the next window's semantic analysis.
    pub fn tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self.text.lines().collect();
        let skip = lines.len().saturating_sub(max_lines);
        lines[skip..].join("\n")
    }
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Split source text into consecutive windows of `window_size` lines, each
/// subsequent window beginning `window_size - overlap` lines after the
/// previous window's start.
///
/// The final window is truncated to the remaining line count rather than
/// padded; input shorter than `window_size` produces exactly one window
/// covering the whole file. Empty input produces zero windows.
///
/// `window_size` must be positive and `overlap` strictly smaller than
/// `window_size`; violations are a config error.
pub fn split(source: &SourceText, window_size: u32, overlap: u32) -> Result<Vec<Window>> {
    if window_size == 0 {
        return Err(ApiScoutError::config("window_size must be positive"));
    }
    if overlap >= window_size {
        return Err(ApiScoutError::config(format!(
            "overlap ({overlap}) must be smaller than window_size ({window_size})"
        )));
    }

    let total = source.total_lines();
    if total == 0 {
        return Ok(Vec::new());
    }

    let lines: Vec<&str> = source.text().lines().collect();
    let stride = window_size - overlap;
    let mut windows = Vec::new();
    let mut start: u32 = 1;

    loop {
        let end = (start + window_size - 1).min(total);
        let text = lines[(start - 1) as usize..end as usize].join("\n");
        windows.push(Window {
            start_line: start,
            end_line: end,
            text,
        });

        if end == total {
            break;
        }
        start += stride;
    }

    debug!(
        total_lines = total,
        window_size,
        overlap,
        windows = windows.len(),
        "split source into windows"
    );

    Ok(windows)
}
