//! Managed blocks inside hosts-format files.
//!
//! A managed block is a paragraph (a run of non-blank lines bounded by the
//! start of the file or blank lines) that contains the marker `#<tag>`. Each
//! sync removes the old paragraph and appends a fresh one at the end of the
//! file, so repeated runs converge on the same bytes.
//!
//! ```text
//! 127.0.0.1  localhost
//!
//! # ZeroTier entries managed by zerotier-hosts #ZeroTier
//! 10.147.17.2  alice  #ZeroTier
//! 10.147.17.9  bob  #ZeroTier
//! ```

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};
use crate::render::EntryFormat;

/// Line terminator used when writing a target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// `\n`, for Unix files.
    Lf,
    /// `\r\n`, for the Windows hosts file.
    CrLf,
}

impl LineEnding {
    /// Returns the terminator string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// Header comment that opens a managed block.
#[must_use]
pub fn managed_header(tag: &str) -> String {
    format!("# {tag} entries managed by zerotier-hosts #{tag}")
}

/// Splits `content` into lines, each keeping its own terminator.
fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    content.split_inclusive(|&b| b == b'\n').collect()
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn has_terminator(line: &[u8]) -> bool {
    line.last() == Some(&b'\n')
}

/// `#<tag>` counts only as a whole whitespace-separated word, so `#WSLg`
/// does not mark a `WSL` block.
fn has_marker(line: &[u8], tag: &str) -> bool {
    let marker = format!("#{tag}");
    line.split(u8::is_ascii_whitespace)
        .any(|word| word == marker.as_bytes())
}

/// Splits `lines` into paragraphs, returned as index ranges of non-blank runs.
#[must_use]
pub fn paragraphs<L: AsRef<[u8]>>(lines: &[L]) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, line) in lines.iter().enumerate() {
        match (is_blank(line.as_ref()), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                out.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(s..lines.len());
    }
    out
}

/// Returns `true` if some paragraph of `content` carries `#<tag>`.
#[must_use]
pub fn has_managed_block(content: &[u8], tag: &str) -> bool {
    split_lines(content).iter().any(|l| has_marker(l, tag))
}

/// Removes every paragraph tagged with `#<tag>` from `content`.
///
/// The blank separator before a removed paragraph goes with it (or the one
/// after it, when the paragraph opens the file). Trailing blank lines are
/// trimmed. Kept lines are returned byte for byte, terminators included.
#[must_use]
pub fn strip_managed_block<'a>(content: &'a [u8], tag: &str) -> Vec<&'a [u8]> {
    let lines = split_lines(content);
    let mut keep = vec![true; lines.len()];

    for para in paragraphs(&lines) {
        if !lines[para.clone()].iter().any(|l| has_marker(l, tag)) {
            continue;
        }
        keep[para.clone()].fill(false);

        if para.start > 0 {
            let mut i = para.start;
            while i > 0 && is_blank(lines[i - 1]) {
                i -= 1;
                keep[i] = false;
            }
        } else {
            let mut i = para.end;
            while i < lines.len() && is_blank(lines[i]) {
                keep[i] = false;
                i += 1;
            }
        }
    }

    let mut remainder: Vec<&[u8]> = lines
        .into_iter()
        .zip(keep)
        .filter_map(|(l, k)| k.then_some(l))
        .collect();
    while remainder.last().is_some_and(|l| is_blank(l)) {
        remainder.pop();
    }
    remainder
}

/// Replaces the `#<tag>` block in `content` with `header` followed by `lines`.
///
/// Lines outside the block keep their bytes and terminators. The new block
/// is appended after a blank line (none when nothing else is left in the
/// file) and each of its lines is terminated with `ending`.
#[must_use]
pub fn replace_managed_block(
    content: &[u8],
    tag: &str,
    header: &str,
    lines: &[String],
    ending: LineEnding,
) -> Vec<u8> {
    let remainder = strip_managed_block(content, tag);
    let mut out = remainder.concat();
    if let Some(last) = remainder.last() {
        if !has_terminator(last) {
            out.extend_from_slice(ending.as_str().as_bytes());
        }
        out.extend_from_slice(ending.as_str().as_bytes());
    }
    for line in std::iter::once(header).chain(lines.iter().map(String::as_str)) {
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(ending.as_str().as_bytes());
    }
    out
}

/// A hosts-format file kept in sync by this crate.
///
/// # Example
///
/// ```rust,ignore
/// use zerotier_hosts::{EntryFormat, HostFileTarget, LineEnding};
///
/// let target = HostFileTarget::new("windows", "/mnt/c/Windows/System32/drivers/etc/hosts")
///     .with_line_ending(LineEnding::CrLf)
///     .with_exclude(["DESKTOP-1234"]);
/// target.sync_block("ZeroTier", &["10.147.17.2  alice  #ZeroTier".to_string()])?;
/// ```
#[derive(Debug, Clone)]
pub struct HostFileTarget {
    /// Short name used in logs (e.g. `"hosts"`, `"windows"`, `"filter-list"`).
    pub label: String,
    /// File path.
    pub path: PathBuf,
    /// Terminator written for the lines of a managed block.
    pub line_ending: LineEnding,
    /// Line layout for member entries.
    pub format: EntryFormat,
    /// Member names never written into this file.
    pub exclude: Vec<String>,
    /// Whether this file also receives the `#WSL` announcement.
    pub announced: bool,
}

impl HostFileTarget {
    /// Creates a `\n`-terminated, bare-format target with no exclusions.
    #[must_use]
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            line_ending: LineEnding::Lf,
            format: EntryFormat::Bare,
            exclude: Vec::new(),
            announced: false,
        }
    }

    /// Overrides the line terminator.
    #[must_use]
    pub const fn with_line_ending(mut self, ending: LineEnding) -> Self {
        self.line_ending = ending;
        self
    }

    /// Overrides the entry format.
    #[must_use]
    pub const fn with_format(mut self, format: EntryFormat) -> Self {
        self.format = format;
        self
    }

    /// Marks this file as a receiver of the `#WSL` announcement.
    #[must_use]
    pub const fn with_announcement(mut self) -> Self {
        self.announced = true;
        self
    }

    /// Adds member names to leave out of this file.
    #[must_use]
    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the `#<tag>` block of this file with `lines`.
    ///
    /// A missing file is created. The file is left untouched when the new
    /// content is identical to what is on disk. Returns `true` if the file
    /// was written.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::FileAccess`] if the file cannot be read or written.
    pub fn sync_block(&self, tag: &str, lines: &[String]) -> Result<bool> {
        let current = self.read()?;
        let updated = replace_managed_block(
            &current,
            tag,
            &managed_header(tag),
            lines,
            self.line_ending,
        );
        self.write_if_changed(&current, &updated, tag, lines.len())
    }

    /// Removes the `#<tag>` block from this file, if present.
    ///
    /// Returns `true` if the file was written.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::FileAccess`] if the file cannot be read or written.
    pub fn remove_block(&self, tag: &str) -> Result<bool> {
        if !self.path.exists() {
            tracing::debug!(target_file = %self.label, "Target file does not exist, skipping");
            return Ok(false);
        }
        let current = self.read()?;
        if !has_managed_block(&current, tag) {
            return Ok(false);
        }
        let updated = strip_managed_block(&current, tag).concat();
        self.write_if_changed(&current, &updated, tag, 0)
    }

    /// Reads raw bytes; hosts files are not guaranteed to be UTF-8.
    fn read(&self) -> Result<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(SyncError::file_access(&self.path, e)),
        }
    }

    fn write_if_changed(
        &self,
        current: &[u8],
        updated: &[u8],
        tag: &str,
        entries: usize,
    ) -> Result<bool> {
        if current == updated {
            tracing::debug!(target_file = %self.label, tag = %tag, "Managed block unchanged");
            return Ok(false);
        }

        std::fs::write(&self.path, updated).map_err(|e| SyncError::file_access(&self.path, e))?;
        tracing::info!(
            target_file = %self.label,
            path = %self.path.display(),
            tag = %tag,
            entries,
            "Updated managed block"
        );
        Ok(true)
    }
}
