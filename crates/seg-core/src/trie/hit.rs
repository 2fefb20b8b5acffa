use std::fmt;
use std::sync::Arc;

use super::{NodeId, SegmentTrie};

/// Outcome of one trie query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchState {
    None,
    Prefix,
    Exact,
    ExactAndPrefix,
}

impl MatchState {
    pub(crate) fn from_flags(terminal: bool, has_children: bool) -> Self {
        match (terminal, has_children) {
            (false, false) => MatchState::None,
            (false, true) => MatchState::Prefix,
            (true, false) => MatchState::Exact,
            (true, true) => MatchState::ExactAndPrefix,
        }
    }

    /// The span is a complete dictionary word.
    pub fn is_match(self) -> bool {
        matches!(self, MatchState::Exact | MatchState::ExactAndPrefix)
    }

    /// The span can be extended towards a longer dictionary word.
    pub fn is_prefix(self) -> bool {
        matches!(self, MatchState::Prefix | MatchState::ExactAndPrefix)
    }

    pub fn is_none(self) -> bool {
        self == MatchState::None
    }
}

/// Position reached inside a specific trie snapshot.
#[derive(Clone)]
pub(crate) struct Cursor {
    pub(crate) trie: Arc<SegmentTrie>,
    pub(crate) node: NodeId,
}

/// Result of a trie query over the char span `begin..end`.
///
/// A `Hit` keeps the trie snapshot it came from alive, so a left-to-right scan
/// started before a reload finishes on the same dictionary content.
#[derive(Clone)]
pub struct Hit {
    state: MatchState,
    begin: usize,
    end: usize,
    cursor: Option<Cursor>,
}

impl Hit {
    /// A hit that matched nothing over `begin..end`.
    pub fn unmatched(begin: usize, end: usize) -> Self {
        Self {
            state: MatchState::None,
            begin,
            end,
            cursor: None,
        }
    }

    pub(crate) fn at(trie: &Arc<SegmentTrie>, node: NodeId, begin: usize, end: usize) -> Self {
        let state = trie.state_at(node);
        if state.is_none() {
            return Self::unmatched(begin, end);
        }
        Self {
            state,
            begin,
            end,
            cursor: Some(Cursor {
                trie: Arc::clone(trie),
                node,
            }),
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    /// Exclusive end offset of the span.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn is_match(&self) -> bool {
        self.state.is_match()
    }

    pub fn is_prefix(&self) -> bool {
        self.state.is_prefix()
    }

    pub fn is_unmatched(&self) -> bool {
        self.state.is_none()
    }

    /// Insertion id of the word ending at this span, if the span is a word.
    pub fn entry_id(&self) -> Option<u32> {
        let cursor = self.cursor.as_ref()?;
        cursor.trie.entry_at(cursor.node)
    }

    /// The trie snapshot this hit continues in.
    pub fn trie(&self) -> Option<&Arc<SegmentTrie>> {
        self.cursor.as_ref().map(|c| &c.trie)
    }

    /// Extend the span by one char, resuming from the node reached so far.
    pub fn advance(&self, next: char) -> Hit {
        let end = self.end.saturating_add(1);
        let Some(cursor) = &self.cursor else {
            return Hit::unmatched(self.begin, end);
        };
        match cursor.trie.child(cursor.node, next) {
            Some(node) => Hit::at(&cursor.trie, node, self.begin, end),
            None => Hit::unmatched(self.begin, end),
        }
    }

    pub(crate) fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }
}

impl PartialEq for Hit {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state && self.begin == other.begin && self.end == other.end
    }
}

impl fmt::Debug for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hit")
            .field("state", &self.state)
            .field("begin", &self.begin)
            .field("end", &self.end)
            .finish()
    }
}
