//! Per-domain dictionaries backed by the remote store.
//!
//! `DefaultDictionary` is the process-wide baseline shared by every domain.
//! `Dictionary` owns one domain's main / stop-word / quantifier tries and
//! republishes them on reload. Lookups consult the baseline first.

mod baseline;
mod domain;

pub use baseline::DefaultDictionary;
pub use domain::{Dictionary, DictionaryStats, Endpoints, ReloadOutcome, TypeStats};

use std::fmt;
use std::io;

use crate::remote::StoreError;

/// Which of a domain's dictionaries an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DictionaryType {
    MainWords,
    StopWords,
    Quantifiers,
}

impl DictionaryType {
    pub const ALL: [DictionaryType; 3] = [
        DictionaryType::MainWords,
        DictionaryType::StopWords,
        DictionaryType::Quantifiers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DictionaryType::MainWords => "main_words",
            DictionaryType::StopWords => "stop_words",
            DictionaryType::Quantifiers => "quantifiers",
        }
    }
}

impl fmt::Display for DictionaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("remote store error: {0}")]
    Store(#[from] StoreError),

    #[error("malformed dictionary {kind}: {reason}")]
    Malformed {
        kind: DictionaryType,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
