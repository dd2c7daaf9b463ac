use async_trait::async_trait;
use research_aggregator::{
    AggregatorSettings, CanonicalRecord, Language, ResearchAggregator, ResearchError, Result, SourceAdapter,
    SourceKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();
    });
}

fn record(kind: SourceKind, url: &str, title: &str, language: Language) -> CanonicalRecord {
    CanonicalRecord {
        title: title.to_string(),
        url: url.to_string(),
        source_kind: kind,
        source_name: format!("{} origin", kind),
        language,
        thumbnail_url: None,
        description: None,
        body_text: None,
        published_at: None,
    }
}

enum Behavior {
    Returns(Vec<(&'static str, &'static str)>),
    Fails,
    Panics,
    Hangs,
}

struct FakeAdapter {
    kind: SourceKind,
    behavior: Behavior,
    english_only: bool,
    calls: AtomicUsize,
}

impl FakeAdapter {
    fn new(kind: SourceKind, behavior: Behavior) -> Self {
        Self {
            kind,
            behavior,
            english_only: false,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SourceAdapter for FakeAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn supports(&self, language: Language) -> bool {
        !self.english_only || language == Language::En
    }

    async fn search(&self, _topic: &str, language: Language, limit: usize) -> Result<Vec<CanonicalRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Returns(items) => Ok(items
                .iter()
                .take(limit)
                .map(|(url, title)| record(self.kind, url, title, language))
                .collect()),
            Behavior::Fails => Err(ResearchError::General("origin exploded".to_string())),
            Behavior::Panics => panic!("adapter bug"),
            Behavior::Hangs => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

fn settings(languages: Vec<Language>) -> AggregatorSettings {
    AggregatorSettings {
        languages,
        results_per_source: 10,
        max_concurrent_searches: 2,
        search_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_failing_adapters_do_not_sink_the_batch() {
    init_tracing();

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(FakeAdapter::new(SourceKind::Video, Behavior::Fails)),
        Arc::new(FakeAdapter::new(
            SourceKind::News,
            Behavior::Returns(vec![("https://news.example.com/1", "News one")]),
        )),
        Arc::new(FakeAdapter::new(SourceKind::Blog, Behavior::Panics)),
        Arc::new(FakeAdapter::new(
            SourceKind::Podcast,
            Behavior::Returns(vec![("https://pod.example.com/1", "Pod one")]),
        )),
    ];
    let aggregator = ResearchAggregator::new(adapters, settings(vec![Language::En]));

    let batch = aggregator.collect("AI").await;

    assert_eq!(batch.calls_succeeded, 2);
    assert_eq!(batch.calls_failed, 2);
    let urls: Vec<&str> = batch.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["https://news.example.com/1", "https://pod.example.com/1"]);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_adapter_times_out() {
    init_tracing();

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(FakeAdapter::new(SourceKind::Video, Behavior::Hangs)),
        Arc::new(FakeAdapter::new(
            SourceKind::Paper,
            Behavior::Returns(vec![("https://arxiv.example.org/1", "Paper one")]),
        )),
    ];
    let aggregator = ResearchAggregator::new(adapters, settings(vec![Language::En]));

    let batch = aggregator.collect("AI").await;

    assert_eq!(batch.calls_failed, 1);
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].source_kind, SourceKind::Paper);
}

#[tokio::test]
async fn test_first_seen_duplicate_wins() {
    init_tracing();

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(FakeAdapter::new(
            SourceKind::News,
            Behavior::Returns(vec![("https://shared.example.com/story", "Title from news")]),
        )),
        Arc::new(FakeAdapter::new(
            SourceKind::Blog,
            Behavior::Returns(vec![
                ("https://shared.example.com/story", "Title from blog"),
                ("https://blog.example.com/only", "Blog only"),
            ]),
        )),
    ];
    let aggregator = ResearchAggregator::new(adapters, settings(vec![Language::En]));

    let batch = aggregator.collect("AI").await;

    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.records[0].title, "Title from news");
    assert_eq!(batch.records[0].source_kind, SourceKind::News);
    assert_eq!(batch.records[1].url, "https://blog.example.com/only");
}

#[tokio::test]
async fn test_every_supported_language_is_queried() {
    init_tracing();

    let everywhere = Arc::new(FakeAdapter::new(SourceKind::News, Behavior::Returns(Vec::new())));
    let mut english = FakeAdapter::new(SourceKind::Paper, Behavior::Returns(Vec::new()));
    english.english_only = true;
    let english = Arc::new(english);

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![everywhere.clone(), english.clone()];
    let aggregator = ResearchAggregator::new(adapters, settings(vec![Language::Ko, Language::En]));

    let batch = aggregator.collect("AI").await;

    assert_eq!(everywhere.calls.load(Ordering::SeqCst), 2);
    assert_eq!(english.calls.load(Ordering::SeqCst), 1);
    assert_eq!(batch.calls_succeeded, 3);
    assert!(batch.records.is_empty());
}

/// Notes when each call starts, then sleeps for `delay` before answering.
struct StampingAdapter {
    kind: SourceKind,
    delay: Duration,
    url: &'static str,
    origin: tokio::time::Instant,
    starts: Arc<Mutex<Vec<(SourceKind, Duration)>>>,
}

#[async_trait]
impl SourceAdapter for StampingAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn search(&self, _topic: &str, language: Language, _limit: usize) -> Result<Vec<CanonicalRecord>> {
        self.starts.lock().unwrap().push((self.kind, self.origin.elapsed()));
        tokio::time::sleep(self.delay).await;
        Ok(vec![record(self.kind, self.url, &format!("Title from {}", self.kind), language)])
    }
}

fn stamping(
    kind: SourceKind,
    delay: Duration,
    url: &'static str,
    origin: tokio::time::Instant,
    starts: &Arc<Mutex<Vec<(SourceKind, Duration)>>>,
) -> Arc<dyn SourceAdapter> {
    Arc::new(StampingAdapter {
        kind,
        delay,
        url,
        origin,
        starts: starts.clone(),
    })
}

#[tokio::test(start_paused = true)]
async fn test_slow_call_does_not_hold_back_the_rest() {
    init_tracing();

    let origin = tokio::time::Instant::now();
    let starts = Arc::new(Mutex::new(Vec::new()));
    let hour = Duration::from_secs(3600);
    let adapters = vec![
        stamping(SourceKind::Video, hour, "https://video.example.com/1", origin, &starts),
        stamping(SourceKind::News, Duration::ZERO, "https://news.example.com/1", origin, &starts),
        stamping(SourceKind::Blog, Duration::ZERO, "https://blog.example.com/1", origin, &starts),
        stamping(SourceKind::Podcast, Duration::ZERO, "https://pod.example.com/1", origin, &starts),
    ];
    let mut config = settings(vec![Language::En]);
    config.search_timeout = Duration::from_secs(120);
    let aggregator = ResearchAggregator::new(adapters, config);

    let batch = aggregator.collect("AI").await;

    let starts = starts.lock().unwrap().clone();
    assert_eq!(starts.len(), 4);
    for (kind, at) in &starts {
        assert!(*at < Duration::from_secs(1), "{} call started only at {:?}", kind, at);
    }
    assert_eq!(batch.calls_failed, 1);
    assert_eq!(batch.calls_succeeded, 3);
}

#[tokio::test(start_paused = true)]
async fn test_first_seen_follows_registration_not_completion() {
    init_tracing();

    let origin = tokio::time::Instant::now();
    let starts = Arc::new(Mutex::new(Vec::new()));
    let shared = "https://shared.example.com/story";
    let adapters = vec![
        stamping(SourceKind::Video, Duration::from_secs(2), shared, origin, &starts),
        stamping(SourceKind::News, Duration::ZERO, shared, origin, &starts),
    ];
    let aggregator = ResearchAggregator::new(adapters, settings(vec![Language::En]));

    let batch = aggregator.collect("AI").await;

    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].source_kind, SourceKind::Video);
    assert_eq!(batch.records[0].title, "Title from video");
}
