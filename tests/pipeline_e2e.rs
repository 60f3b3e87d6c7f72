// tests/pipeline_e2e.rs
//
// Score → reduce → judge with in-process fakes; no network, no real sleeping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use news_gatekeeper::config::{GatekeeperConfig, PipelineConfig};
use news_gatekeeper::diversity::DiversityReducer;
use news_gatekeeper::document::{Document, RawDocument};
use news_gatekeeper::embed::HashingEmbedder;
use news_gatekeeper::judge::{
    CancelFlag, CompletionClient, JudgeError, JudgeOrchestrator, JudgeSettings, Sleeper,
};
use news_gatekeeper::pipeline::Pipeline;
use news_gatekeeper::scoring::{
    Component, ReputationPolicy, ScoreError, ScoreInput, ScoreProvider, ScoringEngine,
};

struct Max(Component);

impl ScoreProvider for Max {
    fn component(&self) -> Component {
        self.0
    }
    fn score(&self, _input: &ScoreInput<'_>) -> Result<f32, ScoreError> {
        Ok(1.0)
    }
}

#[derive(Default)]
struct NoSleep(Mutex<Vec<Duration>>);

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, d: Duration) {
        self.0.lock().push(d);
    }
}

/// Rates every item 6/10, except ids listed as favourites (10/10).
struct FlatJudge {
    favourites: Vec<String>,
}

#[async_trait]
impl CompletionClient for FlatJudge {
    async fn complete(&self, user_prompt: &str, _system: &str) -> Result<String, JudgeError> {
        let items: Vec<serde_json::Value> = user_prompt
            .lines()
            .filter_map(|l| l.strip_prefix("ID: "))
            .map(|id| {
                let score = if self.favourites.iter().any(|f| f == id) { 10 } else { 6 };
                serde_json::json!({"id": id, "score": score, "reason": "test"})
            })
            .collect();
        Ok(serde_json::Value::Array(items).to_string())
    }
    fn name(&self) -> &str {
        "flat"
    }
}

fn raw(id: &str, title: &str, body: &str, url: &str) -> RawDocument {
    RawDocument {
        id: Some(id.to_string()),
        title: title.to_string(),
        body: body.to_string(),
        url: url.to_string(),
        source: String::new(),
        published_at: None,
    }
}

fn max_content_engine() -> ScoringEngine {
    ScoringEngine::new(
        Box::new(Max(Component::Lexical)),
        Box::new(Max(Component::Semantic)),
        Box::new(Max(Component::Preference)),
        Box::new(ReputationPolicy::default_seed()),
        Some(Arc::new(HashingEmbedder::new(64))),
    )
}

fn pipeline_with(client: Arc<dyn CompletionClient>, limits: PipelineConfig) -> (Pipeline, Arc<NoSleep>) {
    let sleeper = Arc::new(NoSleep::default());
    let judge = JudgeOrchestrator::new(client, JudgeSettings::default()).with_sleeper(sleeper.clone());
    (
        Pipeline::new(max_content_engine(), DiversityReducer::default(), judge, limits),
        sleeper,
    )
}

const HEADLINES: [&str; 12] = [
    "Lithium miners cut guidance",
    "Senate passes charging subsidy bill",
    "Rivian opens Georgia plant",
    "Panasonic delays Kansas battery line",
    "Hyundai recalls Ioniq over software fault",
    "Chinese exporters face new tariffs",
    "Volvo drops diesel entirely",
    "Solid state cells reach pilot production",
    "Uber signs robotaxi partnership",
    "Nickel prices slump after Indonesian output surge",
    "Mercedes trims dividend outlook",
    "Startup unveils sodium ion pack",
];

fn distinct_docs(n: usize) -> Vec<RawDocument> {
    HEADLINES
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, t)| raw(&format!("d{i}"), t, "", &format!("https://outlet{i}.example/story")))
        .collect()
}

fn find<'a>(docs: &'a [Document], id: &str) -> Option<&'a Document> {
    docs.iter().find(|d| d.id == id)
}

#[tokio::test]
async fn block_listed_wire_is_capped_but_kept() {
    let (p, _) = pipeline_with(Arc::new(news_gatekeeper::judge::DisabledClient), PipelineConfig::default());
    let out = p
        .run(vec![
            raw("pr", "Acme Corp announces record quarter", "press release", "https://www.prnewswire.com/news-releases/acme"),
            raw("rt", "Battery supply deal signed", "wire story", "https://www.reuters.com/business/x"),
        ])
        .await;

    let pr = find(&out, "pr").expect("press release is still present");
    assert!((pr.relevance_score - 0.1).abs() < 1e-6);
    assert_eq!(pr.score_breakdown.reputation(), Some(0.1));
    let rt = find(&out, "rt").unwrap();
    assert!((rt.relevance_score - 1.2).abs() < 1e-6);
    assert_eq!(out[0].id, "rt");
}

#[tokio::test]
async fn near_identical_titles_merge_regardless_of_body() {
    let (p, _) = pipeline_with(Arc::new(news_gatekeeper::judge::DisabledClient), PipelineConfig::default());
    let out = p
        .run(vec![
            raw(
                "first",
                "Tesla Optimus Delayed Again",
                "Production of the humanoid robot slips into next year.",
                "https://electrek.co/optimus",
            ),
            raw(
                "second",
                "Tesla's Optimus Robot Delayed, Again",
                "Shareholders grumble at the annual meeting in Austin.",
                "https://someblog.example/optimus",
            ),
        ])
        .await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "first");
    assert_eq!(out[0].merged_children.len(), 1);
    assert_eq!(out[0].merged_children[0].id, "second");
}

#[tokio::test]
async fn judge_reorders_representatives_and_paces_batches() {
    let docs = distinct_docs(12);
    let (p, sleeper) = pipeline_with(
        Arc::new(FlatJudge {
            favourites: vec!["d11".to_string()],
        }),
        PipelineConfig::default(),
    );
    let out = p.execute(docs, &CancelFlag::new()).await;

    assert_eq!(out.summary.input, 12);
    assert_eq!(out.summary.judged, out.documents.len());
    assert_eq!(out.documents[0].id, "d11");
    assert_eq!(out.documents[0].score_breakdown.judge(), Some(1.0));
    assert_eq!(out.documents.len(), 12);
    // Two batches (10 + 2): exactly one pause, none after the last.
    assert_eq!(*sleeper.0.lock(), [Duration::from_secs(4)]);
}

#[tokio::test]
async fn limits_apply_before_and_after_judging() {
    let docs = distinct_docs(8);
    let limits = PipelineConfig {
        candidate_limit: Some(5),
        final_limit: Some(3),
    };
    let (p, _) = pipeline_with(Arc::new(FlatJudge { favourites: vec![] }), limits);
    let out = p.execute(docs, &CancelFlag::new()).await;
    assert_eq!(out.documents.len(), 3);
    assert_eq!(out.summary.judged, 5);
}

#[tokio::test]
async fn default_config_runs_without_artifacts_or_judge() {
    let p = Pipeline::from_config(&GatekeeperConfig::default());
    let out = p
        .run(vec![
            raw("a", "Lithium price rebounds", "", "https://www.bloomberg.com/a"),
            raw("b", "Lithium price rebounds", "", "https://www.globenewswire.com/b"),
            raw("c", "", "", ""),
        ])
        .await;
    let total: usize = out.iter().map(Document::cluster_size).sum();
    assert_eq!(total, 3);
    // Trusted source outranks the blocked duplicate and absorbs it.
    assert_eq!(out[0].id, "a");
    assert_eq!(out[0].merged_children[0].id, "b");
}
