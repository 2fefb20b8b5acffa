//! Hot-reloadable, multi-tenant segmentation dictionaries.
//!
//! The building blocks live in `seg_core` (tries, dictionaries, remote
//! stores, settings) and `seg_sync` (change detection and scheduling); this
//! crate wires them together.

pub mod engine;
pub mod trace_init;

pub use engine::{Domain, EngineError, SegEngine};
pub use seg_core::dict::{Dictionary, DictionaryType};
pub use seg_core::settings::{parse_settings_toml, Settings};
pub use seg_core::trie::{Hit, MatchState};
pub use trace_init::init_tracing;
