//! Integration tests for the placeseek engine
//!
//! These drive a spawned engine through its public handle only. The search
//! backend is a scripted provider that records every call, and time is paused
//! so debounce, polling and timeouts run on virtual time.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use placeseek::{
    BiasRegion, Coordinate, EngineConfig, LocationSearch, PlaceCandidate, PlaceSeekError,
    SearchProvider, SearchSnapshot,
    providers::{AuthorizationState, ManualLocationProvider, PermissionPrompt, ProviderError},
};
use tokio::time::{Instant, sleep};

const REFERENCE: Coordinate = Coordinate::new(25.0330, 121.5654);

fn setup_test_env() {
    let _ = placeseek::init_logging(tracing::Level::WARN);
}

#[derive(Debug, Clone, PartialEq)]
enum CallKind {
    Text(String),
    Nearby(Vec<String>),
}

#[derive(Debug, Clone)]
struct Call {
    kind: CallKind,
    region: BiasRegion,
    at: Instant,
}

#[derive(Debug, Clone)]
struct Reply {
    delay: Duration,
    outcome: Result<Vec<PlaceCandidate>, String>,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<Call>,
    text_replies: HashMap<String, Reply>,
    nearby_reply: Option<Reply>,
}

/// Answers from a script and records every call it receives.
#[derive(Debug, Clone, Default)]
struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    fn reply_to(&self, text: &str, delay: Duration, places: Vec<PlaceCandidate>) -> &Self {
        self.script.lock().unwrap().text_replies.insert(
            text.to_string(),
            Reply {
                delay,
                outcome: Ok(places),
            },
        );
        self
    }

    fn fail_on(&self, text: &str) -> &Self {
        self.script.lock().unwrap().text_replies.insert(
            text.to_string(),
            Reply {
                delay: Duration::ZERO,
                outcome: Err("backend down".to_string()),
            },
        );
        self
    }

    fn reply_nearby(&self, delay: Duration, places: Vec<PlaceCandidate>) -> &Self {
        self.script.lock().unwrap().nearby_reply = Some(Reply {
            delay,
            outcome: Ok(places),
        });
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    fn call_kinds(&self) -> Vec<CallKind> {
        self.calls().into_iter().map(|call| call.kind).collect()
    }

    async fn answer(
        &self,
        kind: CallKind,
        region: &BiasRegion,
    ) -> placeseek::providers::Result<Vec<PlaceCandidate>> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            let reply = match &kind {
                CallKind::Text(text) => script.text_replies.get(text).cloned(),
                CallKind::Nearby(_) => script.nearby_reply.clone(),
            };
            script.calls.push(Call {
                kind,
                region: *region,
                at: Instant::now(),
            });
            reply
        };

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };
        if !reply.delay.is_zero() {
            sleep(reply.delay).await;
        }
        reply.outcome.map_err(ProviderError::Unavailable)
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    async fn search(
        &self,
        text: &str,
        region: &BiasRegion,
    ) -> placeseek::providers::Result<Vec<PlaceCandidate>> {
        self.answer(CallKind::Text(text.to_string()), region).await
    }

    async fn search_nearby(
        &self,
        terms: &[String],
        region: &BiasRegion,
    ) -> placeseek::providers::Result<Vec<PlaceCandidate>> {
        self.answer(CallKind::Nearby(terms.to_vec()), region).await
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn place(id: &str) -> PlaceCandidate {
    PlaceCandidate::builder(id, REFERENCE).name(id).build()
}

/// A place `meters` due north of [`REFERENCE`].
fn place_north(id: &str, meters: f64) -> PlaceCandidate {
    let latitude = REFERENCE.latitude + meters / placeseek::providers::model::METERS_PER_DEGREE;
    PlaceCandidate::builder(id, Coordinate::new(latitude, REFERENCE.longitude)).build()
}

fn ids(snapshot: &SearchSnapshot) -> Vec<&str> {
    snapshot.results.iter().map(PlaceCandidate::id).collect()
}

fn spawn(provider: &ScriptedProvider, location: &ManualLocationProvider) -> LocationSearch {
    LocationSearch::builder()
        .search_provider(provider.clone())
        .location_provider(location.clone())
        .spawn()
        .expect("Engine should spawn inside a runtime")
}

/// Wait for the engine state to satisfy `predicate`, failing instead of hanging.
async fn until(
    search: &LocationSearch,
    predicate: impl FnMut(&SearchSnapshot) -> bool,
) -> SearchSnapshot {
    tokio::time::timeout(Duration::from_secs(60), search.wait_for(predicate))
        .await
        .expect("Engine state never matched")
        .expect("Engine closed unexpectedly")
}

#[tokio::test(start_paused = true)]
async fn test_typing_burst_runs_one_search_for_last_text() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_to(
        "cafe",
        Duration::from_millis(120),
        vec![place("a"), place("b"), place("c")],
    );
    let search = spawn(&provider, &ManualLocationProvider::new());

    for text in ["c", "ca", "caf", "cafe"] {
        search.handle_text_change(text);
        sleep(Duration::from_millis(30)).await;
    }
    let last_keystroke = Instant::now() - Duration::from_millis(30);
    assert_eq!(search.search_text(), "cafe");

    let snapshot = until(&search, |s| s.results.len() == 3).await;
    assert!(!snapshot.is_searching);
    assert_eq!(ids(&snapshot), vec!["a", "b", "c"]);

    sleep(Duration::from_secs(2)).await;
    let calls = provider.calls();
    assert_eq!(calls.len(), 1, "only the settled text is searched");
    assert_eq!(calls[0].kind, CallKind::Text("cafe".into()));
    assert!(calls[0].at - last_keystroke >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_searching_flag_tracks_outstanding_request() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_to("tea", Duration::from_millis(300), vec![place("tea-house")]);
    let search = spawn(&provider, &ManualLocationProvider::new());

    search.handle_text_change("tea");
    let snapshot = until(&search, |s| s.is_searching).await;
    assert!(snapshot.results.is_empty());

    let snapshot = until(&search, |s| !s.is_searching).await;
    assert_eq!(ids(&snapshot), vec!["tea-house"]);
}

#[tokio::test(start_paused = true)]
async fn test_empty_text_clears_without_searching() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_to("pizza", Duration::ZERO, vec![place("slice")]);
    let search = spawn(&provider, &ManualLocationProvider::new());

    search.handle_text_change("pizza");
    until(&search, |s| !s.results.is_empty()).await;

    search.handle_text_change("pizza ");
    search.handle_text_change("   ");
    let snapshot = until(&search, |s| s.results.is_empty()).await;
    assert!(!snapshot.is_searching);
    assert_eq!(snapshot.search_text, "   ");

    sleep(Duration::from_secs(2)).await;
    assert_eq!(provider.call_kinds(), vec![CallKind::Text("pizza".into())]);
}

#[tokio::test(start_paused = true)]
async fn test_late_response_from_older_search_never_wins() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider
        .reply_to("ramen", Duration::from_millis(800), vec![place("old")])
        .reply_to("udon", Duration::from_millis(50), vec![place("new")]);
    let search = spawn(&provider, &ManualLocationProvider::new());

    search.handle_text_change("ramen");
    search.search_now();
    sleep(Duration::from_millis(10)).await;
    search.handle_text_change("udon");
    search.search_now();

    let snapshot = until(&search, |s| !s.results.is_empty()).await;
    assert_eq!(ids(&snapshot), vec!["new"]);

    sleep(Duration::from_secs(2)).await;
    let snapshot = search.snapshot();
    assert_eq!(ids(&snapshot), vec!["new"]);
    assert_eq!(snapshot.generation, 2);
    assert!(!snapshot.is_searching);
}

#[tokio::test(start_paused = true)]
async fn test_provider_failure_shows_empty_results() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider
        .reply_to("noodles", Duration::ZERO, vec![place("bowl")])
        .fail_on("bubble tea");
    let search = spawn(&provider, &ManualLocationProvider::new());

    search.handle_text_change("noodles");
    search.search_now();
    until(&search, |s| !s.results.is_empty()).await;

    search.handle_text_change("bubble tea");
    search.search_now();
    let snapshot = until(&search, |s| s.generation == 2 && !s.is_searching).await;
    assert!(snapshot.results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_nearby_without_permission_only_asks_for_it() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    let location = ManualLocationProvider::new().with_prompt(PermissionPrompt::Pending);
    let search = spawn(&provider, &location);

    search.search_nearby();
    let snapshot = until(&search, |s| s.generation == 1).await;
    assert!(!snapshot.is_searching);

    sleep(Duration::from_secs(10)).await;
    assert!(provider.calls().is_empty());
    assert_eq!(location.permission_requests(), 1);

    let denied = ManualLocationProvider::denied();
    search.set_location_provider(denied.clone());
    search.search_nearby();
    until(&search, |s| s.generation == 2).await;
    assert!(provider.calls().is_empty());
    assert_eq!(denied.permission_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_nearby_results_are_ranked_by_distance() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_nearby(
        Duration::from_millis(40),
        vec![
            place_north("500m", 500.0),
            place_north("50m", 50.0),
            place_north("2000m", 2_000.0),
        ],
    );
    let search = spawn(&provider, &ManualLocationProvider::authorized_at(REFERENCE));

    search.search_nearby();
    let snapshot = until(&search, |s| !s.results.is_empty()).await;

    assert_eq!(ids(&snapshot), vec!["50m", "500m", "2000m"]);
}

#[tokio::test(start_paused = true)]
async fn test_nearby_with_cached_fix_queries_immediately() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_nearby(Duration::ZERO, vec![place("corner-cafe")]);
    let location = ManualLocationProvider::authorized_at(REFERENCE);
    let search = spawn(&provider, &location);

    let started = Instant::now();
    search.search_nearby();
    let snapshot = until(&search, |s| !s.results.is_empty()).await;

    assert_eq!(snapshot.search_text, "nearby");
    assert!(!snapshot.is_searching);
    assert_eq!(location.permission_requests(), 0);
    assert_eq!(location.location_requests(), 0);

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].at - started < Duration::from_millis(200));
    assert_eq!(calls[0].region, BiasRegion::new(REFERENCE, 1_000.0));
    assert_eq!(
        calls[0].kind,
        CallKind::Nearby(EngineConfig::default().nearby_terms)
    );

    // The marker text is never searched
    sleep(Duration::from_secs(2)).await;
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_nearby_success_cancels_pending_debounce() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_nearby(Duration::from_millis(100), vec![place("dumplings")]);
    let search = spawn(&provider, &ManualLocationProvider::authorized_at(REFERENCE));

    search.handle_text_change("tea");
    search.search_nearby();
    until(&search, |s| !s.results.is_empty()).await;

    sleep(Duration::from_secs(2)).await;
    let kinds = provider.call_kinds();
    assert_eq!(kinds.len(), 1);
    assert!(matches!(kinds[0], CallKind::Nearby(_)));
    assert_eq!(search.search_text(), "nearby");
}

#[tokio::test(start_paused = true)]
async fn test_nearby_waits_for_fix_then_searches() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_nearby(Duration::ZERO, vec![place_north("here", 10.0)]);
    let location = ManualLocationProvider::authorized_without_fix();
    location.stage_fix(REFERENCE, Duration::from_millis(900));
    let search = spawn(&provider, &location);

    let started = Instant::now();
    search.search_nearby();
    let snapshot = until(&search, |s| !s.results.is_empty()).await;

    assert_eq!(location.location_requests(), 1);
    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    let waited = calls[0].at - started;
    assert!(waited >= Duration::from_millis(900) && waited <= Duration::from_millis(1_000));
    assert_eq!(snapshot.search_text, "nearby");
}

#[tokio::test(start_paused = true)]
async fn test_nearby_location_timeout_leaves_results_untouched() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_to("cafe", Duration::ZERO, vec![place("kept")]);
    let search = spawn(&provider, &ManualLocationProvider::authorized_without_fix());

    search.handle_text_change("cafe");
    until(&search, |s| !s.results.is_empty()).await;

    let started = Instant::now();
    search.search_nearby();
    until(&search, |s| s.generation == 2 && s.is_searching).await;
    let snapshot = until(&search, |s| !s.is_searching).await;

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(ids(&snapshot), vec!["kept"]);
    assert_eq!(snapshot.search_text, "cafe");
    assert_eq!(provider.calls().len(), 1, "no nearby call without a fix");
}

#[tokio::test(start_paused = true)]
async fn test_text_search_is_biased_around_fix() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    let location = ManualLocationProvider::new();
    let search = spawn(&provider, &location);

    search.handle_text_change("bakery");
    search.search_now();
    until(&search, |s| s.generation == 1 && !s.is_searching).await;

    location.set_authorization(AuthorizationState::Authorized);
    location.set_coordinate(Some(REFERENCE));
    search.handle_text_change("bakery 101");
    search.search_now();
    until(&search, |s| s.generation == 2 && !s.is_searching).await;

    let calls = provider.calls();
    assert_eq!(calls[0].region, EngineConfig::default().default_region);
    assert_eq!(calls[1].region, BiasRegion::new(REFERENCE, 5_000.0));
}

#[tokio::test(start_paused = true)]
async fn test_final_voice_result_skips_debounce() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_to("beef noodles", Duration::ZERO, vec![place("shop")]);
    let search = spawn(&provider, &ManualLocationProvider::new());

    let started = Instant::now();
    search.handle_voice("beef", false);
    search.handle_voice("beef noodles", true);
    until(&search, |s| !s.results.is_empty()).await;

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, CallKind::Text("beef noodles".into()));
    assert!(calls[0].at - started < Duration::from_millis(500));

    // An empty final result is ignored
    search.handle_voice("  ", true);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(search.search_text(), "beef noodles");
    assert_eq!(search.results().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_results_supersedes_outstanding_search() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_to("dessert", Duration::from_millis(300), vec![place("cake")]);
    let search = spawn(&provider, &ManualLocationProvider::new());

    search.handle_text_change("dessert");
    search.search_now();
    until(&search, |s| s.is_searching).await;

    search.clear_results();
    let snapshot = until(&search, |s| s.generation == 2).await;
    assert_eq!(snapshot.search_text, "");
    assert!(!snapshot.is_searching);

    sleep(Duration::from_secs(1)).await;
    assert!(search.results().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_engine() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    let search = spawn(&provider, &ManualLocationProvider::new());
    assert!(search.is_running());

    search.handle_text_change("late night snack");
    search.shutdown();

    let result = search.wait_for(|_| false).await;
    assert!(matches!(result, Err(PlaceSeekError::EngineClosed)));
    assert!(!search.is_running());

    // Operations after shutdown are ignored
    search.handle_text_change("ignored");
    sleep(Duration::from_secs(1)).await;
    assert!(provider.calls().is_empty());
    assert!(matches!(search.changed().await, Err(PlaceSeekError::EngineClosed)));
}

#[tokio::test(start_paused = true)]
async fn test_new_engine_starts_from_generation_zero() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    let first = spawn(&provider, &ManualLocationProvider::new());
    first.handle_text_change("x");
    first.search_now();
    until(&first, |s| s.generation == 1).await;
    first.shutdown();

    let second = spawn(&provider, &ManualLocationProvider::new());
    assert_eq!(second.snapshot().generation, 0);
}

#[tokio::test(start_paused = true)]
async fn test_custom_config_is_used() {
    setup_test_env();

    let provider = ScriptedProvider::default();
    provider.reply_to("boba", Duration::ZERO, vec![place("cup")]);
    let config = EngineConfig::builder()
        .debounce_delay(Duration::from_millis(100))
        .build()
        .unwrap();
    let search = LocationSearch::builder()
        .config(config)
        .search_provider(provider.clone())
        .spawn()
        .unwrap();

    let started = Instant::now();
    search.handle_text_change("boba");
    until(&search, |s| !s.results.is_empty()).await;

    let elapsed = provider.calls()[0].at - started;
    assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(500));
}
