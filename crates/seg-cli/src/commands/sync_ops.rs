use std::fs;
use std::path::Path;
use std::process;
use std::thread;
use std::time::SystemTime;

use serde::Serialize;

use seg_core::remote::{same_etag, FileStore, Fetch, ObjectMetadata, RemoteDictStore};
use seg_core::settings::{parse_settings_toml, Settings};
use seg_engine::{Domain, SegEngine};

fn load_settings(file: Option<&str>) -> Settings {
    match file {
        Some(file) => {
            let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
            die!(parse_settings_toml(&content), "Error: {}")
        }
        None => Settings::default(),
    }
}

pub struct PollOptions<'a> {
    pub settings: Option<&'a str>,
    /// Serve from this directory instead of the configured store.
    pub root: Option<&'a str>,
    pub node: Option<&'a str>,
    pub watch: bool,
}

pub fn poll(domain: &str, opts: &PollOptions) {
    let mut settings = load_settings(opts.settings);
    if let Some(root) = opts.root {
        settings.remote.file.root = root.to_string();
        settings.remote.enabled = true;
    }
    if let Some(node) = opts.node {
        settings.cluster.local_node = node.to_string();
    }
    if settings.endpoints(domain).configured().is_empty() {
        eprintln!("Error: no remote dictionary configured (set endpoint templates or --root)");
        process::exit(1);
    }

    let period = settings.remote.refresh.period();
    let engine = die!(SegEngine::from_settings(settings), "Error: {}").with_scheduling(opts.watch);
    let domain = die!(engine.open_domain(domain), "Error: {}");
    print_domain(&domain);

    if opts.watch {
        eprintln!("Watching every {}s, Ctrl-C to stop", period.as_secs());
        loop {
            thread::sleep(period);
            print_domain(&domain);
        }
    }
}

fn ago(t: Option<SystemTime>) -> String {
    match t.and_then(|t| t.elapsed().ok()) {
        Some(d) => format!("{}s ago", d.as_secs()),
        None => "never".to_string(),
    }
}

fn print_domain(domain: &Domain) {
    let stats = domain.dictionary().stats();
    println!("domain {}", stats.domain);
    for t in &stats.types {
        println!(
            "  {:<12} words={:<8} nodes={:<8} loaded {}",
            t.kind.as_str(),
            t.words,
            t.nodes,
            ago(t.loaded_at),
        );
    }
    for m in domain.monitors() {
        let state = m.state();
        println!(
            "  monitor {:<12} {:<13} etag={} success {}{}",
            m.kind().as_str(),
            state.phase,
            state.last_etag.as_deref().unwrap_or("-"),
            ago(state.last_success),
            state
                .last_error
                .map(|e| format!(" error: {e}"))
                .unwrap_or_default(),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AckRow {
    pub node: String,
    pub etag: String,
    pub current: bool,
}

/// One row per acknowledging node, flagging whether it adopted the
/// object's current token.
pub fn ack_rows(meta: &ObjectMetadata) -> Vec<AckRow> {
    meta.acks
        .iter()
        .map(|(node, etag)| AckRow {
            node: node.clone(),
            etag: etag.clone(),
            current: same_etag(etag, &meta.etag),
        })
        .collect()
}

#[derive(Serialize)]
struct AckReport<'a> {
    endpoint: &'a str,
    etag: &'a str,
    nodes: Vec<AckRow>,
}

pub fn acks(root: &str, endpoint: &str, json: bool) {
    let store = FileStore::new(Path::new(root));
    let meta = match die!(store.metadata(endpoint), "Error: {}") {
        Fetch::Found(meta) => meta,
        Fetch::NotFound => {
            eprintln!("Error: {endpoint} not found under {root}");
            process::exit(1);
        }
    };
    let rows = ack_rows(&meta);

    if json {
        let report = AckReport {
            endpoint,
            etag: &meta.etag,
            nodes: rows,
        };
        println!("{}", die!(serde_json::to_string_pretty(&report), "Error: {}"));
        return;
    }
    println!("{endpoint} etag={}", meta.etag);
    if rows.is_empty() {
        println!("  (no acknowledgements)");
        return;
    }
    for row in &rows {
        println!(
            "  {:<20} {:<24} {}",
            row.node,
            row.etag,
            if row.current { "current" } else { "stale" }
        );
    }
    let current = rows.iter().filter(|r| r.current).count();
    eprintln!("{current}/{} nodes on the current version", rows.len());
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use seg_core::remote::NodeAck;

    use super::*;

    #[test]
    fn ack_rows_compare_tokens_case_insensitively() {
        let meta = ObjectMetadata {
            etag: "\"ABC\"".into(),
            acks: BTreeMap::from([
                ("alpha".to_string(), "\"abc\"".to_string()),
                ("beta".to_string(), "\"old\"".to_string()),
            ]),
        };
        let rows = ack_rows(&meta);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].node, "alpha");
        assert!(rows[0].current);
        assert!(!rows[1].current);
    }

    #[test]
    fn ack_rows_from_file_store() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("shop")).unwrap();
        fs::write(dir.path().join("shop/main.dic"), "羽绒服\n").unwrap();
        let store = FileStore::new(dir.path());
        let endpoint = "file://shop/main.dic";
        let meta = store.metadata(endpoint).unwrap().found().unwrap();
        store
            .set_node_ack(
                endpoint,
                &NodeAck {
                    node_id: "Alpha".into(),
                    etag: meta.etag.clone(),
                    peers: Vec::new(),
                },
            )
            .unwrap();

        let meta = store.metadata(endpoint).unwrap().found().unwrap();
        let rows = ack_rows(&meta);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].node, "alpha");
        assert!(rows[0].current);
    }

    #[test]
    fn ago_never_without_time() {
        assert_eq!(ago(None), "never");
        assert_eq!(ago(Some(SystemTime::now())), "0s ago");
    }
}
