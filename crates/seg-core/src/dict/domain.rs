use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use tracing::{debug, info, info_span, warn};

use super::{DefaultDictionary, DictError, DictionaryType};
use crate::remote::{Endpoint, Fetch, RemoteDictStore};
use crate::trie::{Hit, SegmentTrie};

/// Remote endpoint per dictionary type. `None` means the type is never
/// loaded remotely and stays empty for the domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub main_words: Option<String>,
    pub stop_words: Option<String>,
    pub quantifiers: Option<String>,
}

impl Endpoints {
    /// Expand `{domain}` templates; blank templates disable that type.
    pub fn from_templates(main_words: &str, stop_words: &str, quantifiers: &str, domain: &str) -> Self {
        let expand = |template: &str| {
            let template = template.trim();
            (!template.is_empty()).then(|| Endpoint::for_domain(template, domain))
        };
        Self {
            main_words: expand(main_words),
            stop_words: expand(stop_words),
            quantifiers: expand(quantifiers),
        }
    }

    pub fn get(&self, kind: DictionaryType) -> Option<&str> {
        match kind {
            DictionaryType::MainWords => self.main_words.as_deref(),
            DictionaryType::StopWords => self.stop_words.as_deref(),
            DictionaryType::Quantifiers => self.quantifiers.as_deref(),
        }
    }

    /// Types that have an endpoint.
    pub fn configured(&self) -> Vec<DictionaryType> {
        DictionaryType::ALL
            .into_iter()
            .filter(|&k| self.get(k).is_some())
            .collect()
    }
}

#[derive(Clone)]
struct Slot {
    trie: Arc<SegmentTrie>,
    loaded_at: Option<SystemTime>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            trie: Arc::new(SegmentTrie::new()),
            loaded_at: None,
        }
    }
}

/// The set of tries readers see. Replaced as a whole, never mutated.
#[derive(Clone)]
struct Published {
    main_words: Slot,
    stop_words: Slot,
    quantifiers: Slot,
}

impl Published {
    fn empty() -> Self {
        Self {
            main_words: Slot::empty(),
            stop_words: Slot::empty(),
            quantifiers: Slot::empty(),
        }
    }

    fn slot(&self, kind: DictionaryType) -> &Slot {
        match kind {
            DictionaryType::MainWords => &self.main_words,
            DictionaryType::StopWords => &self.stop_words,
            DictionaryType::Quantifiers => &self.quantifiers,
        }
    }

    fn slot_mut(&mut self, kind: DictionaryType) -> &mut Slot {
        match kind {
            DictionaryType::MainWords => &mut self.main_words,
            DictionaryType::StopWords => &mut self.stop_words,
            DictionaryType::Quantifiers => &mut self.quantifiers,
        }
    }
}

/// What a reload did, per dictionary type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadOutcome {
    /// Types republished, with their new word counts.
    pub loaded: Vec<(DictionaryType, usize)>,
    /// Types whose remote object does not exist; previous tries kept.
    pub not_found: Vec<DictionaryType>,
    /// Types without an endpoint.
    pub skipped: Vec<DictionaryType>,
}

impl ReloadOutcome {
    pub fn is_loaded(&self, kind: DictionaryType) -> bool {
        self.loaded.iter().any(|&(k, _)| k == kind)
    }

    pub fn published_anything(&self) -> bool {
        !self.loaded.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeStats {
    pub kind: DictionaryType,
    pub words: usize,
    pub nodes: usize,
    pub loaded_at: Option<SystemTime>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryStats {
    pub domain: String,
    pub types: Vec<TypeStats>,
}

/// One tenant domain's dictionaries.
///
/// Lookups read the currently published tries and never touch the network.
/// `reload` is the only writer: it builds new tries off to the side and swaps
/// them in with a single reference update. Reloads of one domain are
/// serialized; different domains do not share any lock.
pub struct Dictionary {
    domain: String,
    baseline: Arc<DefaultDictionary>,
    store: Arc<dyn RemoteDictStore>,
    endpoints: Endpoints,
    /// Accept a fetched dictionary with no entries over a non-empty one.
    allow_empty: bool,
    published: RwLock<Arc<Published>>,
    reload_lock: Mutex<()>,
}

impl Dictionary {
    /// Create a domain with empty tries. Call [`Dictionary::initial_load`] or
    /// [`Dictionary::reload`] to fill them.
    pub fn new(
        domain: impl Into<String>,
        baseline: Arc<DefaultDictionary>,
        store: Arc<dyn RemoteDictStore>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            domain: domain.into(),
            baseline,
            store,
            endpoints,
            allow_empty: false,
            published: RwLock::new(Arc::new(Published::empty())),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn baseline(&self) -> &Arc<DefaultDictionary> {
        &self.baseline
    }

    pub fn store(&self) -> &Arc<dyn RemoteDictStore> {
        &self.store
    }

    /// Load every configured type. Failures are logged and leave the tries
    /// empty; the sync monitor retries on its next tick.
    pub fn initial_load(&self) {
        if let Err(e) = self.reload(None) {
            warn!(domain = %self.domain, "initial dictionary load failed: {e}");
        }
    }

    fn snapshot(&self) -> Arc<Published> {
        let guard = self.published.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Currently published trie for `kind`.
    pub fn published(&self, kind: DictionaryType) -> Arc<SegmentTrie> {
        Arc::clone(&self.snapshot().slot(kind).trie)
    }

    /// Match against the main dictionary: baseline first, then the domain.
    pub fn lookup_main(&self, text: &[char], begin: usize, length: usize) -> Hit {
        let base = self.baseline.match_main(text, begin, length);
        if base.is_match() {
            return base;
        }
        let own = self
            .snapshot()
            .main_words
            .trie
            .match_span(text, begin, length);
        prefer_domain(base, own)
    }

    /// Match against the quantifier dictionary: baseline first, then the domain.
    pub fn lookup_quantifier(&self, text: &[char], begin: usize, length: usize) -> Hit {
        let base = self.baseline.match_quantifier(text, begin, length);
        if base.is_match() {
            return base;
        }
        let own = self
            .snapshot()
            .quantifiers
            .trie
            .match_span(text, begin, length);
        prefer_domain(base, own)
    }

    /// A span is a stop word if the baseline or the domain lists it.
    pub fn is_stop_word(&self, text: &[char], begin: usize, length: usize) -> bool {
        self.baseline.is_stop_word(text, begin, length)
            || self
                .snapshot()
                .stop_words
                .trie
                .match_span(text, begin, length)
                .is_match()
    }

    /// Convenience for whole-word main lookups.
    pub fn lookup_word(&self, word: &str) -> Hit {
        let chars: Vec<char> = word.chars().collect();
        self.lookup_main(&chars, 0, chars.len())
    }

    /// Rebuild `kind` (or every configured type when `None`) from the remote
    /// store and publish the result.
    ///
    /// A fetch or content error aborts the whole reload and leaves the
    /// published tries untouched. A missing object keeps the previous trie
    /// for that type.
    pub fn reload(&self, kind: Option<DictionaryType>) -> Result<ReloadOutcome, DictError> {
        let _guard = self.reload_lock.lock().unwrap_or_else(|e| e.into_inner());
        let _span = info_span!("reload", domain = %self.domain, kind = ?kind).entered();
        info!("begin dictionary reload");

        let kinds: Vec<DictionaryType> = match kind {
            Some(k) => vec![k],
            None => DictionaryType::ALL.to_vec(),
        };

        let current = self.snapshot();
        let mut next = Published::clone(&current);
        let mut outcome = ReloadOutcome::default();

        for kind in kinds {
            let Some(endpoint) = self.endpoints.get(kind) else {
                outcome.skipped.push(kind);
                continue;
            };
            let lines = match self.store.content(endpoint)? {
                Fetch::Found(lines) => lines,
                Fetch::NotFound => {
                    debug!(%kind, endpoint, "remote dictionary not found, keeping current");
                    outcome.not_found.push(kind);
                    continue;
                }
            };
            let trie = SegmentTrie::from_words(lines.iter().map(|l| l.trim()));
            if trie.is_empty() && !self.allow_empty && !current.slot(kind).trie.is_empty() {
                return Err(DictError::Malformed {
                    kind,
                    reason: format!("{endpoint} has no entries"),
                });
            }
            outcome.loaded.push((kind, trie.len()));
            *next.slot_mut(kind) = Slot {
                trie: Arc::new(trie),
                loaded_at: Some(SystemTime::now()),
            };
        }

        if outcome.published_anything() {
            let mut published = self.published.write().unwrap_or_else(|e| e.into_inner());
            *published = Arc::new(next);
        }
        info!(loaded = ?outcome.loaded, not_found = ?outcome.not_found, "dictionary reload finished");
        Ok(outcome)
    }

    pub fn stats(&self) -> DictionaryStats {
        let snapshot = self.snapshot();
        let types = DictionaryType::ALL
            .into_iter()
            .map(|kind| {
                let slot = snapshot.slot(kind);
                TypeStats {
                    kind,
                    words: slot.trie.len(),
                    nodes: slot.trie.node_count(),
                    loaded_at: slot.loaded_at,
                    endpoint: self.endpoints.get(kind).map(str::to_string),
                }
            })
            .collect();
        DictionaryStats {
            domain: self.domain.clone(),
            types,
        }
    }
}

/// Baseline did not match: take the domain hit if it got anywhere, else keep
/// the baseline hit (which may still be a prefix).
fn prefer_domain(base: Hit, own: Hit) -> Hit {
    if own.is_match() || own.is_prefix() {
        own
    } else {
        base
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dictionary")
            .field("domain", &self.domain)
            .field("store", &self.store.name())
            .field("endpoints", &self.endpoints)
            .finish()
    }
}
