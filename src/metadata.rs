//! Merging the crop block into a discipline's metadata document.
//!
//! The document is split into its top-level entries, each keeping its exact
//! text. Only the `crops` entry is ever rewritten, so unrelated content keeps
//! its formatting and comments byte for byte.

use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::crops::CropSet;
use crate::error::{Error, Result};
use crate::geometry::NormBox;
use crate::output::write_atomic;

pub const CROPS_KEY: &str = "crops";
/// Single-box block written by older tooling, superseded by `crops`.
pub const LEGACY_FACE_BOX_KEY: &str = "face_box";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Unchanged,
    Updated,
    Inserted,
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MergeOutcome::Unchanged => "unchanged",
            MergeOutcome::Updated => "updated",
            MergeOutcome::Inserted => "inserted",
        };
        f.write_str(s)
    }
}

/// The subset of crops persisted in the metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropsBlock {
    pub face: NormBox,
    pub card: NormBox,
}

impl CropsBlock {
    pub fn from_crops(crops: &CropSet) -> Self {
        Self {
            face: crops.face,
            card: crops.card,
        }
    }

    /// Canonical text of the block, including its trailing newline.
    pub fn render(&self) -> String {
        let mut out = format!("{}:\n", CROPS_KEY);
        for (name, b) in [("face", &self.face), ("card", &self.card)] {
            out.push_str(&format!("  {}:\n", name));
            for (field, value) in [("x", b.x), ("y", b.y), ("w", b.w), ("h", b.h)] {
                // `{:?}` keeps the decimal point on whole numbers (0.0, 1.0)
                out.push_str(&format!("    {}: {:?}\n", field, value));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    key: Option<String>,
    // key line and its indented continuation
    body: String,
    // blank lines and column-0 comments up to the next entry
    trailing: String,
}

impl Entry {
    fn preamble() -> Self {
        Entry {
            key: None,
            body: String::new(),
            trailing: String::new(),
        }
    }
}

/// A YAML document as an ordered list of top-level entries.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDocument {
    // entries[0] is the preamble before the first key, possibly empty
    entries: Vec<Entry>,
}

enum Line<'a> {
    Key(&'a str),
    Continuation,
    Trivia,
}

fn classify(line: &str) -> Line<'_> {
    let content = line.trim_end_matches(['\n', '\r']);
    if content.trim().is_empty() || content.starts_with('#') {
        return Line::Trivia;
    }
    if content == "---" || content == "..." {
        return Line::Trivia;
    }
    if content.starts_with([' ', '\t', '-']) {
        return Line::Continuation;
    }
    match content.split_once(':') {
        Some((key, _)) => Line::Key(key.trim().trim_matches(['"', '\''])),
        None => Line::Continuation,
    }
}

impl MetadataDocument {
    /// Splits `text` into entries after checking that it is valid YAML.
    pub fn parse(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str::<serde_yaml::Value>(text)?;

        let mut entries = Vec::new();
        let mut current = Entry::preamble();
        let mut pending = String::new();

        for line in text.split_inclusive('\n') {
            match classify(line) {
                Line::Key(key) => {
                    current.trailing = std::mem::take(&mut pending);
                    entries.push(current);
                    current = Entry {
                        key: Some(key.to_string()),
                        body: line.to_string(),
                        trailing: String::new(),
                    };
                }
                Line::Continuation => {
                    // blank lines inside a block belong to the block
                    current.body.push_str(&pending);
                    current.body.push_str(line);
                    pending.clear();
                }
                Line::Trivia => pending.push_str(line),
            }
        }
        current.trailing = pending;
        entries.push(current);

        Ok(MetadataDocument { entries })
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.key.as_deref() == Some(key))
    }

    /// Exact text of the top-level entry `key`, without trailing blank lines.
    pub fn block(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].body.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| e.key.as_deref())
    }

    fn replace_block(&mut self, key: &str, body: String) -> bool {
        match self.position(key) {
            Some(i) => {
                self.entries[i].body = body;
                true
            }
            None => false,
        }
    }

    /// Drops the entry `key` together with the blank line separating it
    /// from what precedes it.
    fn remove_block(&mut self, key: &str) -> bool {
        let Some(i) = self.position(key) else {
            return false;
        };
        // the preamble is never keyed, so `i >= 1`
        let removed = self.entries.remove(i);
        let previous = &mut self.entries[i - 1];
        if let Some(last) = previous.trailing.split_inclusive('\n').last() {
            if last.trim().is_empty() {
                let keep = previous.trailing.len() - last.len();
                previous.trailing.truncate(keep);
            }
        }
        previous.trailing.push_str(&removed.trailing);
        true
    }

    /// `"\r\n"` when the document already uses CRLF line endings.
    pub fn line_ending(&self) -> &'static str {
        let crlf = self
            .entries
            .iter()
            .any(|e| e.body.contains("\r\n") || e.trailing.contains("\r\n"));
        if crlf {
            "\r\n"
        } else {
            "\n"
        }
    }

    /// Appends a new entry at the end, separated by one blank line.
    fn append_block(&mut self, key: &str, body: String) {
        let eol = self.line_ending();
        if let Some(last) = self.entries.last_mut() {
            let ends_with_newline = if last.trailing.is_empty() {
                last.body.is_empty() || last.body.ends_with('\n')
            } else {
                last.trailing.ends_with('\n')
            };
            if !ends_with_newline {
                last.trailing.push_str(eol);
            }
            last.trailing.push_str(eol);
        }
        self.entries.push(Entry {
            key: Some(key.to_string()),
            body,
            trailing: String::new(),
        });
    }

    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .flat_map(|e| [e.body.as_str(), e.trailing.as_str()])
            .collect()
    }
}

/// Merges `crops` into the document text.
///
/// Returns the outcome and the resulting text, which equals the input when
/// the outcome is `Unchanged`.
pub fn merge_crops(
    text: &str,
    crops: &CropsBlock,
) -> std::result::Result<(MergeOutcome, String), serde_yaml::Error> {
    let mut doc = MetadataDocument::parse(text)?;
    let rendered = crops.render().replace('\n', doc.line_ending());

    let outcome = match doc.block(CROPS_KEY) {
        Some(existing) if existing == rendered => return Ok((MergeOutcome::Unchanged, text.to_string())),
        Some(_) => {
            doc.replace_block(CROPS_KEY, rendered);
            MergeOutcome::Updated
        }
        None => {
            if doc.remove_block(LEGACY_FACE_BOX_KEY) {
                debug!("dropped legacy {} block", LEGACY_FACE_BOX_KEY);
            }
            doc.append_block(CROPS_KEY, rendered);
            MergeOutcome::Inserted
        }
    };

    Ok((outcome, doc.to_text()))
}

#[derive(Deserialize)]
struct CropsOnly {
    crops: CropsBlock,
}

/// Merges `crops` into the document at `path`, writing it back unless
/// nothing changed or `dry_run` is set.
pub fn update_metadata_file(path: &Path, crops: &CropsBlock, dry_run: bool) -> Result<MergeOutcome> {
    let text = fs::read_to_string(path)?;
    let invalid = |reason: String| Error::InvalidDocument {
        path: path.to_path_buf(),
        reason,
    };

    let (outcome, merged) = merge_crops(&text, crops).map_err(|e| invalid(e.to_string()))?;
    if outcome == MergeOutcome::Unchanged {
        return Ok(outcome);
    }

    // the merged text must read back as the block we meant to write
    let check: CropsOnly =
        serde_yaml::from_str(&merged).map_err(|e| invalid(format!("merged document: {}", e)))?;
    if check.crops != *crops {
        return Err(invalid("merged crops block does not read back".to_string()));
    }

    if !dry_run {
        write_atomic(path, merged)?;
    }
    Ok(outcome)
}
