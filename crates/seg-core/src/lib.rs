pub mod dict;
pub mod remote;
pub mod settings;
pub mod trie;
pub mod unicode;
