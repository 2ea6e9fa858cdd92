//! Record of content digests that have already been published.
//!
//! Lives for the process lifetime only. An entry is added after a publish
//! succeeds end to end, never before, so a failed upload stays eligible for a
//! fresh attempt the next time the same bytes show up.

use std::collections::HashMap;

/// digest -> remote file id for every successful publish so far.
#[derive(Debug, Default)]
pub struct DedupIndex {
    entries: HashMap<String, String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote file id previously published for this digest, if any.
    pub fn lookup(&self, digest: &str) -> Option<&str> {
        self.entries.get(digest).map(String::as_str)
    }

    /// Mark a digest as published. Call only after the upload succeeded.
    pub fn record(&mut self, digest: String, remote_file_id: String) {
        self.entries.insert(digest, remote_file_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index_has_no_entries() {
        let index = DedupIndex::new();
        assert_eq!(index.lookup("abc"), None);
    }

    #[test]
    fn test_record_then_lookup() {
        let mut index = DedupIndex::new();
        index.record("digest-1".to_string(), "file-1".to_string());

        assert_eq!(index.lookup("digest-1"), Some("file-1"));
        assert_eq!(index.lookup("digest-2"), None);
    }

    #[test]
    fn test_rerecord_overwrites() {
        let mut index = DedupIndex::new();
        index.record("digest-1".to_string(), "file-1".to_string());
        index.record("digest-1".to_string(), "file-2".to_string());

        assert_eq!(index.lookup("digest-1"), Some("file-2"));
    }
}
