use std::fs;
use std::process;
use std::sync::Arc;

use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use seg_core::dict::{DefaultDictionary, DictionaryType};
use seg_core::remote::content_lines;
use seg_core::trie::{MatchState, SegmentTrie};

fn read_words(file: &str) -> Vec<String> {
    let text = die!(fs::read_to_string(file), "Error reading {file}: {}");
    content_lines(&text)
}

fn read_optional(file: Option<&str>) -> Vec<String> {
    file.map(read_words).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanMatch {
    pub begin: usize,
    pub end: usize,
    pub word: String,
    pub kind: &'static str,
    pub stop_word: bool,
}

/// Every dictionary word found in `text`, left to right, extending each
/// start position while the trie still reports a prefix.
pub fn scan_text(dict: &DefaultDictionary, text: &[char]) -> Vec<ScanMatch> {
    let mut out = Vec::new();
    let sources = [
        ("main", dict.trie(DictionaryType::MainWords)),
        ("quantifier", dict.trie(DictionaryType::Quantifiers)),
    ];
    for begin in 0..text.len() {
        for &(kind, trie) in &sources {
            let mut hit = trie.match_span(text, begin, 1);
            while !hit.is_unmatched() {
                if hit.is_match() {
                    out.push(ScanMatch {
                        begin: hit.begin(),
                        end: hit.end(),
                        word: text[hit.begin()..hit.end()].iter().collect(),
                        kind,
                        stop_word: dict.is_stop_word(text, hit.begin(), hit.len()),
                    });
                }
                if !hit.is_prefix() || hit.end() >= text.len() {
                    break;
                }
                hit = hit.advance(text[hit.end()]);
            }
        }
    }
    out
}

/// Match state after each character of `word`.
pub fn trace_word(trie: &Arc<SegmentTrie>, word: &str) -> Vec<(String, MatchState)> {
    let chars: Vec<char> = word.chars().collect();
    let mut steps = Vec::with_capacity(chars.len());
    if chars.is_empty() {
        return steps;
    }
    let mut hit = trie.match_span(&chars, 0, 1);
    steps.push((chars[..1].iter().collect(), hit.state()));
    for i in 1..chars.len() {
        hit = hit.advance(chars[i]);
        steps.push((chars[..=i].iter().collect(), hit.state()));
    }
    steps
}

fn pad(s: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(s);
    if w < width {
        format!("{s}{}", " ".repeat(width - w))
    } else {
        s.to_string()
    }
}

pub fn scan(
    main_file: &str,
    quantifier_file: Option<&str>,
    stop_file: Option<&str>,
    text: &str,
    json: bool,
) {
    let dict = DefaultDictionary::from_words(
        read_words(main_file),
        read_optional(quantifier_file),
        read_optional(stop_file),
    );
    let chars: Vec<char> = text.chars().collect();
    let matches = scan_text(&dict, &chars);

    if json {
        println!("{}", die!(serde_json::to_string_pretty(&matches), "Error: {}"));
        return;
    }
    if matches.is_empty() {
        println!("No matches.");
        return;
    }
    for m in &matches {
        println!(
            "  [{:>3},{:>3}) {} {:<10}{}",
            m.begin,
            m.end,
            pad(&m.word, 16),
            m.kind,
            if m.stop_word { " stop" } else { "" },
        );
    }
    eprintln!("{} matches in {} chars", matches.len(), chars.len());
}

pub fn lookup(dict_file: &str, word: &str) {
    let trie = Arc::new(SegmentTrie::from_words(read_words(dict_file)));
    let steps = trace_word(&trie, word);
    if steps.is_empty() {
        eprintln!("Error: empty word");
        process::exit(1);
    }
    for (prefix, state) in &steps {
        println!("  {} {state:?}", pad(prefix, 16));
    }
    let found = steps.last().is_some_and(|(_, s)| s.is_match());
    println!("{word}: {}", if found { "found" } else { "not found" });
}

pub fn info(dict_file: &str) {
    let trie = SegmentTrie::from_words(read_words(dict_file));
    println!("{dict_file}");
    println!("  words: {}", trie.len());
    println!("  nodes: {}", trie.node_count());
}
