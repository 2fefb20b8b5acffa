use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::{DictError, DictionaryType};
use crate::remote::content_lines;
use crate::trie::{Hit, SegmentTrie};

pub const MAIN_FILE: &str = "main.dic";
pub const QUANTIFIER_FILE: &str = "quantifier.dic";
pub const STOPWORD_FILE: &str = "stopword.dic";

/// Read-only baseline dictionary shared across all domains.
#[derive(Debug, Clone)]
pub struct DefaultDictionary {
    main: Arc<SegmentTrie>,
    quantifiers: Arc<SegmentTrie>,
    stop_words: Arc<SegmentTrie>,
}

impl DefaultDictionary {
    pub fn empty() -> Self {
        Self::from_tries(SegmentTrie::new(), SegmentTrie::new(), SegmentTrie::new())
    }

    pub fn from_words<M, Q, S>(main: M, quantifiers: Q, stop_words: S) -> Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        Q: IntoIterator,
        Q::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self::from_tries(
            SegmentTrie::from_words(main),
            SegmentTrie::from_words(quantifiers),
            SegmentTrie::from_words(stop_words),
        )
    }

    fn from_tries(main: SegmentTrie, quantifiers: SegmentTrie, stop_words: SegmentTrie) -> Self {
        Self {
            main: Arc::new(main),
            quantifiers: Arc::new(quantifiers),
            stop_words: Arc::new(stop_words),
        }
    }

    /// Load `main.dic`, `quantifier.dic` and `stopword.dic` from `dir`.
    /// Missing files yield empty tries.
    pub fn load(dir: &Path) -> Result<Self, DictError> {
        let read = |file: &str, kind: DictionaryType| -> Result<SegmentTrie, DictError> {
            let path = dir.join(file);
            match fs::read_to_string(&path) {
                Ok(text) => Ok(SegmentTrie::from_words(content_lines(&text))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "baseline file absent");
                    Ok(SegmentTrie::new())
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => Err(DictError::Malformed {
                    kind,
                    reason: format!("{}: {e}", path.display()),
                }),
                Err(e) => Err(e.into()),
            }
        };
        let dict = Self::from_tries(
            read(MAIN_FILE, DictionaryType::MainWords)?,
            read(QUANTIFIER_FILE, DictionaryType::Quantifiers)?,
            read(STOPWORD_FILE, DictionaryType::StopWords)?,
        );
        info!(
            dir = %dir.display(),
            main = dict.main.len(),
            quantifiers = dict.quantifiers.len(),
            stop_words = dict.stop_words.len(),
            "loaded baseline dictionary"
        );
        Ok(dict)
    }

    pub fn trie(&self, kind: DictionaryType) -> &Arc<SegmentTrie> {
        match kind {
            DictionaryType::MainWords => &self.main,
            DictionaryType::StopWords => &self.stop_words,
            DictionaryType::Quantifiers => &self.quantifiers,
        }
    }

    pub fn match_main(&self, text: &[char], begin: usize, length: usize) -> Hit {
        self.main.match_span(text, begin, length)
    }

    pub fn match_quantifier(&self, text: &[char], begin: usize, length: usize) -> Hit {
        self.quantifiers.match_span(text, begin, length)
    }

    pub fn is_stop_word(&self, text: &[char], begin: usize, length: usize) -> bool {
        self.stop_words.match_span(text, begin, length).is_match()
    }
}

impl Default for DefaultDictionary {
    fn default() -> Self {
        Self::empty()
    }
}
