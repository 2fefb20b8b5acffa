//! Char-keyed segment trie with resumable matching.
//!
//! Nodes live in a single arena (`Vec<Node>`) and refer to each other by
//! index. Each node keeps its children as a `Vec<(char, NodeId)>` sorted by
//! char, so lookups are a binary search and memory grows with the vocabulary
//! rather than the alphabet. A trie is built privately, then shared behind an
//! `Arc` and never mutated again; a reload always builds a new arena.

mod hit;

use std::sync::Arc;

use tracing::debug_span;

pub use hit::{Hit, MatchState};

use crate::unicode::{fold_char, fold_word};

pub(crate) type NodeId = u32;

const ROOT: NodeId = 0;

#[derive(Default)]
struct Node {
    children: Vec<(char, NodeId)>,
    /// Insertion id of the word ending here.
    entry: Option<u32>,
}

pub struct SegmentTrie {
    nodes: Vec<Node>,
    words: u32,
}

impl SegmentTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            words: 0,
        }
    }

    /// Build a trie from an iterator of words. Blank words are skipped.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _span = debug_span!("build_trie").entered();
        let mut trie = Self::new();
        for word in words {
            trie.insert(word.as_ref());
        }
        trie.compact();
        tracing::debug!(words = trie.words, nodes = trie.nodes.len());
        trie
    }

    /// Insert a word. Returns `true` if the word was not present before.
    pub fn insert(&mut self, word: &str) -> bool {
        let chars = fold_word(word);
        if chars.is_empty() {
            return false;
        }
        let mut node = ROOT;
        for c in chars {
            node = self.child_or_insert(node, c);
        }
        let slot = &mut self.nodes[node as usize].entry;
        if slot.is_some() {
            return false;
        }
        *slot = Some(self.words);
        self.words += 1;
        true
    }

    fn child_or_insert(&mut self, node: NodeId, c: char) -> NodeId {
        let next = self.nodes.len() as NodeId;
        let children = &mut self.nodes[node as usize].children;
        match children.binary_search_by_key(&c, |&(k, _)| k) {
            Ok(i) => children[i].1,
            Err(i) => {
                children.insert(i, (c, next));
                self.nodes.push(Node::default());
                next
            }
        }
    }

    /// Release spare capacity left over from construction.
    pub fn compact(&mut self) {
        for node in &mut self.nodes {
            node.children.shrink_to_fit();
        }
        self.nodes.shrink_to_fit();
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.words as usize
    }

    pub fn is_empty(&self) -> bool {
        self.words == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, word: &str) -> bool {
        let mut node = ROOT;
        for c in word.trim().chars() {
            match self.child(node, c) {
                Some(n) => node = n,
                None => return false,
            }
        }
        node != ROOT && self.nodes[node as usize].entry.is_some()
    }

    /// All words, sorted by char code.
    pub fn words(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<(NodeId, String)> = vec![(ROOT, String::new())];
        while let Some((node, prefix)) = stack.pop() {
            let n = &self.nodes[node as usize];
            if n.entry.is_some() {
                out.push(prefix.clone());
            }
            for &(c, child) in n.children.iter().rev() {
                let mut next = prefix.clone();
                next.push(c);
                stack.push((child, next));
            }
        }
        out
    }

    pub(crate) fn child(&self, node: NodeId, c: char) -> Option<NodeId> {
        let c = fold_char(c);
        let children = &self.nodes[node as usize].children;
        children
            .binary_search_by_key(&c, |&(k, _)| k)
            .ok()
            .map(|i| children[i].1)
    }

    pub(crate) fn state_at(&self, node: NodeId) -> MatchState {
        let n = &self.nodes[node as usize];
        MatchState::from_flags(n.entry.is_some(), !n.children.is_empty())
    }

    pub(crate) fn entry_at(&self, node: NodeId) -> Option<u32> {
        self.nodes[node as usize].entry
    }

    /// Match the span `text[offset..offset + length]` from the root.
    ///
    /// Empty or out-of-range spans yield an unmatched hit.
    pub fn match_span(self: &Arc<Self>, text: &[char], offset: usize, length: usize) -> Hit {
        let end = offset.saturating_add(length);
        if length == 0 || end > text.len() {
            return Hit::unmatched(offset, end);
        }
        let mut node = ROOT;
        for &c in &text[offset..end] {
            match self.child(node, c) {
                Some(n) => node = n,
                None => return Hit::unmatched(offset, end),
            }
        }
        Hit::at(self, node, offset, end)
    }

    /// Match a whole word.
    pub fn match_word(self: &Arc<Self>, word: &str) -> Hit {
        let chars: Vec<char> = word.chars().collect();
        self.match_span(&chars, 0, chars.len())
    }

    /// Resume `hit` with one more char.
    ///
    /// Returns an unmatched hit if `hit` was produced by a different trie.
    pub fn match_continuing(self: &Arc<Self>, hit: &Hit, next: char) -> Hit {
        match hit.cursor() {
            Some(cursor) if Arc::ptr_eq(&cursor.trie, self) => hit.advance(next),
            _ => Hit::unmatched(hit.begin(), hit.end().saturating_add(1)),
        }
    }
}

impl Default for SegmentTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SegmentTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentTrie")
            .field("words", &self.words)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
