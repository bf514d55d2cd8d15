use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lopdf::{Dictionary, Document, Object, Stream};
use strata_forecast::clients::{ContentPart, ModelBackend, ModelRequest, TextStream};
use strata_forecast::config::Config;
use strata_forecast::error::{AnalysisError, InvocationError, SanitizeError};
use strata_forecast::models::profile::{InvestorProfile, OccupierProfile};
use strata_forecast::services::InvocationMode;
use strata_forecast::{AnalysisOrchestrator, AnalysisRequest, AnalysisStage, SourceDocument, UserProfile};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// 按脚本依次回复的模型服务
struct ScriptedBackend {
    replies: Mutex<VecDeque<Vec<String>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Vec<&str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.into_iter().map(String::from).collect())
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// 对任意调用都返回同一段文本
    fn repeating(reply: &str, times: usize) -> Arc<Self> {
        Self::new(vec![vec![reply]; times])
    }

    fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn stream(&self, request: &ModelRequest) -> Result<TextStream, InvocationError> {
        self.requests.lock().unwrap().push(request.clone());
        let segments = self.replies.lock().unwrap().pop_front().unwrap_or_default();
        Ok(futures::stream::iter(segments.into_iter().map(Ok).collect::<Vec<_>>()).boxed())
    }
}

/// 生成包含 N 页空白页的 PDF
fn blank_pdf(num_pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..num_pages)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
                ),
                ("Contents", Object::Reference(content_id)),
            ]);
            Object::Reference(doc.add_object(page))
        })
        .collect();

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        ("Kids", Object::Array(kids)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn pdf(name: &str, pages: u32) -> SourceDocument {
    SourceDocument::new(name, "application/pdf", blank_pdf(pages))
}

fn occupier() -> UserProfile {
    UserProfile::Occupier(OccupierProfile {
        purchase_price: "780000".to_string(),
        current_weekly_rent: "650".to_string(),
        ..Default::default()
    })
}

fn investor() -> UserProfile {
    UserProfile::Investor(InvestorProfile {
        purchase_price: "780000".to_string(),
        expected_weekly_rent: "700".to_string(),
        ..Default::default()
    })
}

fn config() -> Config {
    Config {
        page_budget: 250,
        batch_page_budget: 250,
        max_retries: 3,
        base_backoff_ms: 1000,
        ..Default::default()
    }
}

const VALID_REPORT: &str = r#"```json
{
  "riskScore": 64.123456789,
  "briefingPoints": [
    {"content": "Special levy of $1.2M raised for facade repairs", "source": {"fileName": "agm-2024.pdf", "pageNumber": 12}}
    {"content": "Sinking fund below recommended balance"}
  ],
  "timeline": [{"year": 2026, "title": "Facade repair", "description": "Levy instalment }{ due", "estimatedCost": 18500.5}],
  "financialProjection": [{"year": 2025, "propertyValue": 780000, "strataLevies": 6200.123456, "specialLevies": 1e-22, "cumulativeCost": 6200.1235}],
  "conclusion": "Material building risk"
}
```"#;

fn extraction_text(request: &ModelRequest) -> String {
    match &request.parts[0] {
        ContentPart::Text(text) => text.clone(),
        other => panic!("第一个片段应为文本: {:?}", other),
    }
}

#[tokio::test]
async fn test_scenario_a_single_small_document() {
    let backend = ScriptedBackend::repeating(VALID_REPORT, 1);
    let orchestrator = AnalysisOrchestrator::new(&config(), backend.clone());
    let (progress, receiver) = watch::channel(AnalysisStage::Idle);

    let outcome = orchestrator
        .analyze_with_progress(
            AnalysisRequest {
                documents: vec![pdf("strata-minutes.pdf", 5)],
                profile: occupier(),
            },
            &CancellationToken::new(),
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(outcome.chunk_count, 1);
    assert_eq!(outcome.batch_count, 1);
    assert!(!outcome.synthesized);
    assert_eq!(backend.requests().len(), 1);
    assert_eq!(*receiver.borrow(), AnalysisStage::Done);

    let report = outcome.report;
    assert_eq!(report.risk_score, 64.1235);
    assert_eq!(report.briefing_points.len(), 2);
    assert_eq!(report.timeline[0].description, "Levy instalment }{ due");
    assert_eq!(report.financial_projection[0].strata_levies, 6200.1235);
    assert_eq!(report.financial_projection[0].special_levies, 0.0);
}

#[tokio::test]
async fn test_scenario_b_three_large_documents_are_split_batched_and_synthesized() {
    // 6 个分块 (250 + 150 页 × 3) 每个都单独成批，另加一次合成调用
    let backend = ScriptedBackend::repeating(VALID_REPORT, 7);
    let orchestrator = AnalysisOrchestrator::new(&config(), backend.clone());
    let (progress, _receiver) = watch::channel(AnalysisStage::Idle);

    let outcome = orchestrator
        .analyze_with_progress(
            AnalysisRequest {
                documents: vec![pdf("a.pdf", 400), pdf("b.pdf", 400), pdf("c.pdf", 400)],
                profile: occupier(),
            },
            &CancellationToken::new(),
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(outcome.chunk_count, 6);
    assert!(outcome.batch_count >= 2);
    assert!(outcome.synthesized);

    let requests = backend.requests();
    assert_eq!(requests.len(), outcome.batch_count + 1);

    // 提取请求按文档顺序发送，且每批不超过页数预算
    let first = extraction_text(&requests[0]);
    assert!(first.contains("a.pdf (Part 1, pages 1-250) (pages 1-250)"));
    let second = extraction_text(&requests[1]);
    assert!(second.contains("a.pdf (Part 2, pages 251-400)"));

    // 合成请求不附带任何文档，只携带序列化的部分报告
    let synthesis = requests.last().unwrap();
    assert_eq!(synthesis.attachment_bytes(), 0);
    assert_eq!(synthesis.parts.len(), 1);
    assert!(extraction_text(synthesis).contains(&format!("Partial reports ({})", outcome.batch_count)));

    assert_eq!(outcome.report.risk_score, 64.1235);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_empty_responses_then_success_with_backoff() {
    let backend = ScriptedBackend::new(vec![vec![""], vec!["  \n "], vec![VALID_REPORT]]);
    let orchestrator = AnalysisOrchestrator::new(&config(), backend.clone());

    let started = tokio::time::Instant::now();
    let report = orchestrator
        .analyze(
            AnalysisRequest {
                documents: vec![pdf("levy-notice.pdf", 2)],
                profile: occupier(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // 第 1→2 次等待 1s，第 2→3 次等待 2s
    assert!(started.elapsed() >= Duration::from_millis(3000));
    assert_eq!(backend.requests().len(), 3);
    assert_eq!(report.conclusion, "Material building risk");
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_unrecoverable_json_fails_with_bounded_snippet() {
    let broken = format!(
        "{{\"riskScore\": 50, \"briefingPoints\": [{{\"content\": \"x\"}} ### {}]}}",
        "evidence ".repeat(2000)
    );
    let backend = ScriptedBackend::repeating(&broken, 3);
    let orchestrator = AnalysisOrchestrator::new(&config(), backend.clone());

    let err = orchestrator
        .analyze(
            AnalysisRequest {
                documents: vec![pdf("by-laws.pdf", 3)],
                profile: occupier(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match &err {
        AnalysisError::ModelInvocationFailed {
            mode,
            attempts,
            source: InvocationError::Sanitize(SanitizeError::UnrecoverableMalformedResponse { snippet, .. }),
        } => {
            assert_eq!(*mode, InvocationMode::Extraction);
            assert_eq!(*attempts, 3);
            assert!(snippet.contains("###"));
            assert!(snippet.len() < broken.len());
        }
        other => panic!("应为不可恢复的解析错误: {:?}", other),
    }

    let message = err.to_string();
    assert!(message.len() < 1024, "错误信息不应包含完整响应");
    assert_eq!(backend.requests().len(), 3);
}

#[tokio::test]
async fn test_batch_failure_aborts_run_without_partial_report() {
    // 第一个批次成功，第二个批次三次都返回空
    let backend = ScriptedBackend::new(vec![vec![VALID_REPORT], vec![""], vec![""], vec![""]]);
    let config = Config {
        batch_page_budget: 1,
        base_backoff_ms: 1,
        ..config()
    };
    let orchestrator = AnalysisOrchestrator::new(&config, backend.clone());

    let err = orchestrator
        .analyze(
            AnalysisRequest {
                documents: vec![
                    SourceDocument::new("photo.jpg", "image/jpeg", vec![0xFF, 0xD8]),
                    SourceDocument::new("notes.txt", "text/plain", b"by-law 12".to_vec()),
                ],
                profile: occupier(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::ModelInvocationFailed {
            source: InvocationError::EmptyModelResponse,
            ..
        }
    ));
    assert_eq!(backend.requests().len(), 4);
}

#[tokio::test]
async fn test_persona_invariant_holds_even_when_model_returns_both() {
    let both = r#"{"riskScore": 20, "conclusion": "ok",
        "rentVsBuy": {"totalCostOfBuying": 1, "totalCostOfRenting": 2, "verdict": "buy"},
        "investorWealth": {"projectedEquity": 3, "netWealthPosition": 4}}"#;

    let backend = ScriptedBackend::repeating(both, 2);
    let orchestrator = AnalysisOrchestrator::new(&config(), backend.clone());

    let investor_report = orchestrator
        .analyze(
            AnalysisRequest {
                documents: vec![pdf("contract.pdf", 1)],
                profile: investor(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(investor_report.rent_vs_buy.is_none());
    assert!(investor_report.investor_wealth.is_some());

    let occupier_report = orchestrator
        .analyze(
            AnalysisRequest {
                documents: vec![pdf("contract.pdf", 1)],
                profile: occupier(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(occupier_report.investor_wealth.is_none());
    assert!(occupier_report.rent_vs_buy.is_some());
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let backend = ScriptedBackend::repeating(VALID_REPORT, 2);
    let orchestrator = Arc::new(AnalysisOrchestrator::new(&config(), backend.clone()));

    let run = |profile: UserProfile| {
        let orchestrator = orchestrator.clone();
        async move {
            orchestrator
                .analyze(
                    AnalysisRequest {
                        documents: vec![pdf("minutes.pdf", 4)],
                        profile,
                    },
                    &CancellationToken::new(),
                )
                .await
        }
    };

    let (a, b) = tokio::join!(run(occupier()), run(investor()));
    tokio_test::assert_ok!(&a);
    tokio_test::assert_ok!(&b);
    assert_eq!(backend.requests().len(), 2);
}

/// 需要真实的模型服务：LLM_API_KEY=... cargo test -- --ignored
#[tokio::test]
#[ignore]
async fn test_live_single_document() {
    strata_forecast::utils::logging::init(true);

    let config = Config::from_env();
    let orchestrator = AnalysisOrchestrator::from_config(&config);

    let report = orchestrator
        .analyze(
            AnalysisRequest {
                documents: vec![SourceDocument::new(
                    "notes.txt",
                    "text/plain",
                    b"AGM 2024: members resolved to raise a special levy for waterproofing.".to_vec(),
                )],
                profile: occupier(),
            },
            &CancellationToken::new(),
        )
        .await;

    assert!(report.is_ok(), "实时调用应成功: {:?}", report.err());
}
