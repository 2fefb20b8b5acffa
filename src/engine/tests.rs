use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use seg_core::remote::{Fetch, MemoryStore, NodeAck, ObjectMetadata, StoreError};
use seg_core::settings::parse_settings_toml;
use seg_sync::Phase;

use super::*;

fn settings_for(root: &Path, extra: &str) -> Settings {
    let toml = format!(
        r#"
[remote]
enabled = true
main_words = "file://{{domain}}/main.dic"
stop_words = "file://{{domain}}/stopword.dic"

[remote.refresh]
delay_secs = 3600
period_secs = 3600

[remote.file]
root = "{}"

[cluster]
local_node = "alpha"
nodes = ["alpha", "beta"]
{extra}
"#,
        root.display().to_string().replace('\\', "/")
    );
    parse_settings_toml(&toml).unwrap()
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn engine(root: &Path) -> SegEngine {
    SegEngine::from_settings(settings_for(root, ""))
        .unwrap()
        .with_scheduling(false)
}

#[test]
fn open_domain_loads_remote_dictionaries() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "shop/main.dic", "羽绒服\n冲锋衣\n");
    write(dir.path(), "shop/stopword.dic", "啊\n");
    let engine = engine(dir.path());

    let shop = engine.open_domain("shop").unwrap();
    assert_eq!(shop.name(), "shop");
    assert_eq!(shop.monitors().len(), 2);
    assert!(!shop.is_scheduled());
    let dict = shop.dictionary();
    assert!(dict.lookup_word("冲锋衣").is_match());
    let text: Vec<char> = "啊".chars().collect();
    assert!(dict.is_stop_word(&text, 0, 1));

    let acks = fs::read_to_string(dir.path().join("shop/main.dic.acks.json")).unwrap();
    assert!(acks.contains("\"alpha\""));
}

#[test]
fn open_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "shop/main.dic", "羽绒服\n");
    let engine = engine(dir.path());
    let a = engine.open_domain("shop").unwrap();
    let b = engine.open_domain(" shop ").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(engine.domain_names(), vec!["shop".to_string()]);
}

#[test]
fn blank_domain_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    assert!(matches!(
        engine.open_domain("  "),
        Err(EngineError::BlankDomain)
    ));
}

#[test]
fn missing_remote_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let shop = engine.open_domain("shop").unwrap();
    assert!(shop.dictionary().lookup_word("羽绒服").is_unmatched());
    for m in shop.monitors() {
        assert_eq!(m.state().phase, Phase::Idle);
        assert_eq!(m.state().last_etag, None);
    }

    write(dir.path(), "shop/main.dic", "羽绒服\n");
    let results = shop.poll_now();
    assert!(results.iter().any(|(kind, r)| *kind == DictionaryType::MainWords
        && matches!(r, Ok(PollOutcome::Reloaded { .. }))));
    assert!(shop.dictionary().lookup_word("羽绒服").is_match());
}

#[test]
fn corrupt_ack_sidecar_does_not_block_reload() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "shop/main.dic", "羽绒服\n");
    let engine = engine(dir.path());
    let shop = engine.open_domain("shop").unwrap();
    assert!(shop.dictionary().lookup_word("羽绒服").is_match());

    write(dir.path(), "shop/main.dic.acks.json", "{not json");
    write(dir.path(), "shop/main.dic", "冲锋衣\n");
    let results = shop.poll_now();
    assert!(results.iter().any(|(kind, r)| *kind == DictionaryType::MainWords
        && matches!(r, Ok(PollOutcome::Reloaded { acknowledged: true, .. }))));
    assert!(shop.dictionary().lookup_word("冲锋衣").is_match());

    let acks = fs::read_to_string(dir.path().join("shop/main.dic.acks.json")).unwrap();
    assert!(acks.contains("\"alpha\""));
}

#[test]
fn domains_do_not_share_words() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "shop/main.dic", "羽绒服\n");
    write(dir.path(), "news/main.dic", "发布会\n");
    let engine = engine(dir.path());
    let shop = engine.open_domain("shop").unwrap();
    let news = engine.open_domain("news").unwrap();
    assert!(shop.dictionary().lookup_word("羽绒服").is_match());
    assert!(shop.dictionary().lookup_word("发布会").is_unmatched());
    assert!(news.dictionary().lookup_word("发布会").is_match());
}

#[test]
fn remote_disabled_loads_once_without_polling() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "base/main.dic", "北京\n");
    write(dir.path(), "shop/main.dic", "羽绒服\n");
    let mut settings = settings_for(
        dir.path(),
        &format!(
            "\n[baseline]\ndir = \"{}\"\n",
            dir.path().join("base").display().to_string().replace('\\', "/")
        ),
    );
    settings.remote.enabled = false;
    let engine = SegEngine::from_settings(settings).unwrap();

    let shop = engine.open_domain("shop").unwrap();
    assert_eq!(shop.monitors().len(), 2);
    assert!(!shop.is_scheduled());
    assert!(shop.dictionary().lookup_word("北京").is_match());
    assert!(shop.dictionary().lookup_word("羽绒服").is_match());

    // Changes are only picked up on demand.
    write(dir.path(), "shop/main.dic", "冲锋衣\n");
    assert!(shop.dictionary().lookup_word("冲锋衣").is_unmatched());
    shop.poll_now();
    assert!(shop.dictionary().lookup_word("冲锋衣").is_match());
}

/// Blocks metadata reads of "slow" endpoints until released.
struct SlowStore {
    inner: MemoryStore,
    entered: Mutex<mpsc::Sender<()>>,
    delay: Duration,
}

impl RemoteDictStore for SlowStore {
    fn metadata(&self, endpoint: &str) -> Result<Fetch<ObjectMetadata>, StoreError> {
        if endpoint.contains("slow") {
            let _ = self.entered.lock().unwrap().send(());
            thread::sleep(self.delay);
        }
        self.inner.metadata(endpoint)
    }

    fn content(&self, endpoint: &str) -> Result<Fetch<Vec<String>>, StoreError> {
        self.inner.content(endpoint)
    }

    fn set_node_ack(&self, endpoint: &str, ack: &NodeAck) -> Result<(), StoreError> {
        self.inner.set_node_ack(endpoint, ack)
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[test]
fn slow_domain_does_not_block_others() {
    let (tx, rx) = mpsc::channel();
    let store = SlowStore {
        inner: MemoryStore::new(),
        entered: Mutex::new(tx),
        delay: Duration::from_secs(2),
    };
    store.inner.put("mem://slow/main.dic", "羽绒服\n");
    store.inner.put("mem://fast/main.dic", "冲锋衣\n");
    let mut settings = Settings::default();
    settings.remote.main_words = "mem://{domain}/main.dic".into();
    settings.remote.stop_words.clear();
    let engine = Arc::new(
        SegEngine::new(
            settings,
            Arc::new(store),
            Arc::new(StaticCluster::single("alpha")),
            Arc::new(DefaultDictionary::empty()),
        )
        .with_scheduling(false),
    );

    let opener = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.open_domain("slow").map(|d| d.name().to_string()))
    };
    rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let started = Instant::now();
    let fast = engine.open_domain("fast").unwrap();
    assert_eq!(engine.domain_names(), vec!["fast".to_string()]);
    assert!(engine.domain("slow").is_none());
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(fast.dictionary().lookup_word("冲锋衣").is_match());

    assert_eq!(opener.join().unwrap().unwrap(), "slow");
    assert_eq!(
        engine.domain_names(),
        vec!["fast".to_string(), "slow".to_string()]
    );
}

#[test]
fn concurrent_opens_share_one_domain() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "shop/main.dic", "羽绒服\n");
    let engine = Arc::new(engine(dir.path()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.open_domain("shop").unwrap())
        })
        .collect();
    let domains: Vec<Arc<Domain>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let kept = engine.domain("shop").unwrap();
    assert!(domains.iter().all(|d| Arc::ptr_eq(d, &kept)));
}

#[test]
fn unload_stops_monitors() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "shop/main.dic", "羽绒服\n");
    let engine = SegEngine::from_settings(settings_for(dir.path(), "")).unwrap();
    let shop = engine.open_domain("shop").unwrap();
    assert!(shop.is_scheduled());

    assert!(engine.unload_domain("shop"));
    assert!(!shop.is_scheduled());
    assert!(engine.domain("shop").is_none());
    assert!(!engine.unload_domain("shop"));
    // The handle still answers from its last dictionary.
    assert!(shop.dictionary().lookup_word("羽绒服").is_match());
}

#[test]
fn scheduled_polling_applies_updates() {
    let store = Arc::new(MemoryStore::new());
    store.put("mem://shop/main.dic", "羽绒服\n");
    let mut settings = Settings::default();
    settings.remote.enabled = true;
    settings.remote.main_words = "mem://{domain}/main.dic".into();
    settings.remote.stop_words.clear();
    settings.remote.refresh.delay_secs = 0;
    settings.remote.refresh.period_secs = 1;
    let engine = SegEngine::new(
        settings,
        Arc::clone(&store) as Arc<dyn RemoteDictStore>,
        Arc::new(StaticCluster::single("alpha")),
        Arc::new(DefaultDictionary::empty()),
    );
    let shop = engine.open_domain("shop").unwrap();
    assert!(shop.dictionary().lookup_word("羽绒服").is_match());

    store.put("mem://shop/main.dic", "冲锋衣\n");
    let deadline = Instant::now() + Duration::from_secs(10);
    while !shop.dictionary().lookup_word("冲锋衣").is_match() {
        assert!(Instant::now() < deadline, "update was not picked up");
        thread::sleep(Duration::from_millis(20));
    }
    // The ack lands just after publication.
    let etag = store
        .metadata("mem://shop/main.dic")
        .unwrap()
        .found()
        .unwrap()
        .etag;
    while store.acks("mem://shop/main.dic").get("alpha") != Some(&etag) {
        assert!(Instant::now() < deadline, "ack was not written");
        thread::sleep(Duration::from_millis(20));
    }
    engine.shutdown();
    assert!(engine.domain_names().is_empty());
}
