//! Offline pipeline tests with a stubbed LLM client.
//!
//! No network access and no API key needed: every completion is answered by
//! [`StubClient`], which routes on the requested schema name.

use async_trait::async_trait;
use edgequake_storyboard::schema::{SLIDE_SCHEMA_NAME, VALIDATION_SCHEMA_NAME};
use edgequake_storyboard::{
    run, run_to_file, sanitize, FormatterConfig, LlmClient, MoocFormatter, PromptVariant,
    ResultBatch, SourceUnit, StoryboardConfig, StoryboardError, StructuredRequest,
    StructuredResponse,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Answers slide requests with `slide` and validation requests with
/// `validation`. The `fail_on`-th slide request (1-based) fails instead.
struct StubClient {
    slide: Box<dyn Fn(&str) -> String + Send + Sync>,
    validation: String,
    fail_on: Option<usize>,
    slide_calls: AtomicUsize,
}

impl StubClient {
    fn fixed(slide: &str, validation: &str) -> Self {
        let slide = slide.to_string();
        Self {
            slide: Box::new(move |_: &str| slide.clone()),
            validation: validation.to_string(),
            fail_on: None,
            slide_calls: AtomicUsize::new(0),
        }
    }

    /// Echo the source text back as slide content.
    fn echo() -> Self {
        Self {
            slide: Box::new(|user: &str| {
                let source = user
                    .lines()
                    .skip_while(|l| !l.starts_with("SOURCE CONTENT"))
                    .nth(1)
                    .unwrap_or("")
                    .to_string();
                json!({"title": "T", "content": source, "dialogue": "Narration."}).to_string()
            }),
            validation: r#"{"score": 8, "feedback": "Grounded."}"#.to_string(),
            fail_on: None,
            slide_calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, k: usize) -> Self {
        self.fail_on = Some(k);
        self
    }
}

#[async_trait]
impl LlmClient for StubClient {
    async fn complete(
        &self,
        request: &StructuredRequest,
    ) -> Result<StructuredResponse, StoryboardError> {
        match request.schema.name {
            SLIDE_SCHEMA_NAME => {
                let n = self.slide_calls.fetch_add(1, Ordering::SeqCst) + 1;
                if self.fail_on == Some(n) {
                    return Err(StoryboardError::HttpStatus {
                        service: "stub".into(),
                        status: 500,
                        body: "boom".into(),
                    });
                }
                Ok(StructuredResponse::from_content((self.slide)(&request.user)))
            }
            VALIDATION_SCHEMA_NAME => Ok(StructuredResponse::from_content(self.validation.clone())),
            other => Err(StoryboardError::Internal(format!("unexpected schema {other}"))),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn config(client: StubClient, variant: PromptVariant) -> StoryboardConfig {
    StoryboardConfig::builder()
        .client(Arc::new(client))
        .variant(variant)
        .build()
        .unwrap()
}

fn units(n: usize) -> Vec<SourceUnit> {
    (1..=n)
        .map(|i| SourceUnit::new(format!("el-{i}"), format!("Source paragraph number {i}.")))
        .collect()
}

#[tokio::test]
async fn photosynthesis_scenario_produces_exact_batch() {
    let client = StubClient::fixed(
        r#"{"content":"Photosynthesis Overview","dialogue":"Let's discuss photosynthesis."}"#,
        r#"{"score":9.5,"feedback":"Well grounded."}"#,
    );
    let input = vec![SourceUnit::new(
        "a",
        "Photosynthesis converts light into chemical energy.",
    )];

    let out = run(&input, &config(client, PromptVariant::Classic))
        .await
        .unwrap();

    let value = serde_json::to_value(&out.batch).unwrap();
    assert_eq!(
        value,
        json!([{
            "element_id": "a",
            "result": {
                "content": "Photosynthesis Overview",
                "dialogue": "Let's discuss photosynthesis.",
                "groundedness_score": 9.5,
                "feedback": "Well grounded."
            }
        }])
    );
}

#[tokio::test]
async fn output_order_matches_input_order() {
    let input = units(7);
    let out = run(&input, &config(StubClient::echo(), PromptVariant::Titled))
        .await
        .unwrap();

    assert_eq!(out.batch.len(), input.len());
    for (unit, result) in input.iter().zip(out.batch.iter()) {
        assert_eq!(unit.element_id, result.element_id);
        assert_eq!(result.result.content, unit.text);
        assert_eq!(result.result.title.as_deref(), Some("T"));
    }
    assert_eq!(out.stats.elements, 7);
    assert_eq!(out.stats.mean_score, Some(8.0));
}

#[tokio::test]
async fn failure_at_any_element_writes_nothing() {
    for k in 1..=3 {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("deck.json");
        std::fs::write(&input_path, serde_json::to_string(&units(3)).unwrap()).unwrap();

        let out_dir = dir.path().join("out");
        let cfg = StoryboardConfig::builder()
            .client(Arc::new(StubClient::echo().failing_on(k)))
            .output_dir(&out_dir)
            .build()
            .unwrap();

        let r = run_to_file(&input_path, &cfg).await;
        assert!(
            matches!(r, Err(StoryboardError::HttpStatus { status: 500, .. })),
            "k={k}: {r:?}"
        );
        assert!(!out_dir.join("deck_results.json").exists(), "k={k}");
    }
}

#[tokio::test]
async fn run_to_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("chunking_big_cleaned.json");
    std::fs::write(
        &input_path,
        r#"[
            {"type":"CompositeElement","element_id":"x1","text":"Première partie : énergie solaire.","metadata":{"page_number":1}},
            {"type":"CompositeElement","element_id":"x2","text":"Second part.","metadata":{}}
        ]"#,
    )
    .unwrap();

    let cfg = StoryboardConfig::builder()
        .client(Arc::new(StubClient::echo()))
        .output_dir(dir.path().join("output"))
        .build()
        .unwrap();
    let (path, stats) = run_to_file(&input_path, &cfg).await.unwrap();

    assert_eq!(path, dir.path().join("output/chunking_big_cleaned_results.json"));
    assert_eq!(stats.elements, 2);

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("Première partie : énergie solaire."), "non-ASCII must stay literal");
    assert!(raw.starts_with("[\n  {"), "two-space pretty print");

    let back = ResultBatch::read_from(&path).unwrap();
    let ids: Vec<&str> = back.iter().map(|r| r.element_id.as_str()).collect();
    assert_eq!(ids, vec!["x1", "x2"]);
    assert_eq!(back.iter().next().unwrap().result.content, "Première partie : énergie solaire.");
}

#[tokio::test]
async fn out_of_range_score_is_clamped_by_default() {
    let client = StubClient::fixed(
        r#"{"title":"t","content":"c","dialogue":"d"}"#,
        r#"{"score":14,"feedback":"Too generous."}"#,
    );
    let out = run(&units(1), &config(client, PromptVariant::Titled))
        .await
        .unwrap();
    assert_eq!(out.batch.iter().next().unwrap().result.groundedness_score, 10.0);
}

#[tokio::test]
async fn titled_variant_rejects_missing_title() {
    let client = StubClient::fixed(
        r#"{"content":"c","dialogue":"d"}"#,
        r#"{"score":9,"feedback":"ok"}"#,
    );
    let r = run(&units(1), &config(client, PromptVariant::Titled)).await;
    assert!(matches!(r, Err(StoryboardError::SchemaViolation { .. })));
}

#[test]
fn sanitizer_scenario_and_idempotence() {
    let once = sanitize("Check [this](http://x.com) out ![alt](img.png)");
    assert_eq!(once, "Check this out [Image]");
    assert_eq!(sanitize(&once), once);

    let messy = "<p>Intro</p>\n<B>Key</B> point: see [docs](https://example.com)\r\n![fig](f.png)";
    let once = sanitize(messy);
    assert_eq!(sanitize(&once), once);
}

#[tokio::test]
async fn generated_results_format_to_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("lesson.json");
    std::fs::write(&input_path, serde_json::to_string(&units(12)).unwrap()).unwrap();

    let cfg = StoryboardConfig::builder()
        .client(Arc::new(StubClient::echo()))
        .output_dir(dir.path().join("output"))
        .build()
        .unwrap();
    let (results, _) = run_to_file(&input_path, &cfg).await.unwrap();

    let formatter = MoocFormatter::new(FormatterConfig {
        output_dir: dir.path().join("pdf"),
        ..Default::default()
    });
    let pdf = formatter.format_results(&results).unwrap();

    assert_eq!(pdf, dir.path().join("pdf/lesson_pdf.pdf"));
    let bytes = std::fs::read(&pdf).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}
