//! The section corpus consumed by index construction.
//!
//! A corpus maps each unique title to its ordered chunks. Construction drops
//! blank chunks and titles left without chunks, and rejects chunks that reach
//! the configured maximum length.
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::Title;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Corpus {
    sections: BTreeMap<Title, Vec<String>>,
}

impl Corpus {
    pub fn new(raw: BTreeMap<Title, Vec<String>>, max_chunk_chars: usize) -> Result<Self> {
        Self::from_sections(raw, max_chunk_chars)
    }

    /// Build from `(title, chunks)` pairs; chunks of a repeated title are appended in order.
    pub fn from_sections<I, T, C, S>(sections: I, max_chunk_chars: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (T, C)>,
        T: Into<Title>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: BTreeMap<Title, Vec<String>> = BTreeMap::new();
        for (title, chunks) in sections {
            let title = title.into();
            if title.trim().is_empty() { return Err(Error::InvalidInput("section title must not be blank".into())); }
            let mut kept = Vec::new();
            for chunk in chunks {
                let chunk = chunk.into();
                if chunk.trim().is_empty() { continue; }
                let chars = chunk.chars().count();
                if chars >= max_chunk_chars {
                    return Err(Error::InvalidInput(format!("chunk of '{}' has {} characters, limit is {}", title, chars, max_chunk_chars)));
                }
                kept.push(chunk);
            }
            if kept.is_empty() { debug!(title = %title, "dropping title without chunks"); continue; }
            out.entry(title).or_default().extend(kept);
        }
        Ok(Self { sections: out })
    }

    /// Read every `*.json` file under `dir` (sorted by path), each a `{ title: [chunk, ...] }` object.
    /// A missing or unreadable `dir` is an I/O error.
    pub fn load_dir(dir: &Path, max_chunk_chars: usize) -> Result<Self> {
        let files = list_json_files(dir)?;
        if files.is_empty() { info!(dir = %dir.display(), "no .json corpus files found"); }
        let mut sections: Vec<(Title, Vec<String>)> = Vec::new();
        for (file_index, path) in files.iter().enumerate() {
            debug!(file = %path.display(), "reading corpus file {}/{}", file_index + 1, files.len());
            let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            let parsed: BTreeMap<Title, Vec<String>> = serde_json::from_str(&raw)
                .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
            sections.extend(parsed);
        }
        let corpus = Self::from_sections(sections, max_chunk_chars)?;
        info!(files = files.len(), titles = corpus.len(), chunks = corpus.chunk_count(), "loaded corpus");
        Ok(corpus)
    }

    /// Number of titles.
    pub fn len(&self) -> usize { self.sections.len() }

    pub fn is_empty(&self) -> bool { self.sections.is_empty() }

    pub fn chunk_count(&self) -> usize { self.sections.values().map(Vec::len).sum() }

    pub fn titles(&self) -> impl Iterator<Item = &str> { self.sections.keys().map(String::as_str) }

    pub fn chunks(&self, title: &str) -> Option<&[String]> { self.sections.get(title).map(Vec::as_slice) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.sections.iter().map(|(t, c)| (t.as_str(), c.as_slice()))
    }

    /// blake3 over every title and chunk, hex. Equal corpora share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        let mut field = |s: &str| {
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        };
        for (title, chunks) in &self.sections {
            field(title);
            field(&chunks.len().to_string());
            for chunk in chunks { field(chunk); }
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn list_json_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        let kind = if root.exists() { ErrorKind::InvalidInput } else { ErrorKind::NotFound };
        return Err(Error::io(root, io::Error::new(kind, "corpus path is not a directory")));
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, e.into())
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_blank_chunks_and_empty_titles() {
        let corpus = Corpus::from_sections(
            vec![
                ("Paris: History", vec!["Paris was founded...", "   ", ""]),
                ("Paris: Links", vec!["\n\t"]),
                ("Rome: History", vec![]),
            ],
            2000,
        )
        .unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.chunks("Paris: History").unwrap(), ["Paris was founded..."]);
        assert!(corpus.chunks("Paris: Links").is_none());
        assert!(corpus.chunks("Rome: History").is_none());
    }

    #[test]
    fn repeated_title_appends_chunks() {
        let corpus = Corpus::from_sections(vec![("A", vec!["one"]), ("B", vec!["x"]), ("A", vec!["two"])], 100).unwrap();
        assert_eq!(corpus.chunks("A").unwrap(), ["one", "two"]);
        assert_eq!(corpus.chunk_count(), 3);
    }

    #[test]
    fn rejects_chunk_at_max_length() {
        let at_limit = "x".repeat(10);
        let err = Corpus::from_sections(vec![("A", vec![at_limit])], 10).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(Corpus::from_sections(vec![("A", vec!["x".repeat(9)])], 10).is_ok());
    }

    #[test]
    fn length_is_counted_in_characters() {
        // 6 Cyrillic letters, 12 bytes
        assert!(Corpus::from_sections(vec![("Москва", vec!["Кремль"])], 7).is_ok());
    }

    #[test]
    fn rejects_blank_title() {
        assert!(Corpus::from_sections(vec![("  ", vec!["text"])], 100).is_err());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = Corpus::from_sections(vec![("A", vec!["one", "two"])], 100).unwrap();
        let same = Corpus::from_sections(vec![("A", vec!["one"]), ("A", vec!["two"])], 100).unwrap();
        let moved = Corpus::from_sections(vec![("A", vec!["one"]), ("B", vec!["two"])], 100).unwrap();
        let joined = Corpus::from_sections(vec![("A", vec!["onetwo"])], 100).unwrap();
        assert_eq!(a.fingerprint(), same.fingerprint());
        assert_ne!(a.fingerprint(), moved.fingerprint());
        assert_ne!(a.fingerprint(), joined.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn titles_iterate_in_order() {
        let corpus = Corpus::from_sections(vec![("b", vec!["2"]), ("a", vec!["1"])], 100).unwrap();
        assert_eq!(corpus.titles().collect::<Vec<_>>(), ["a", "b"]);
    }
}
