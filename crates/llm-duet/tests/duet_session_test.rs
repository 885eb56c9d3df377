//! Turn-taking behavior of `Duet` against scripted gateways.
//!
//! Covers context growth and mirroring, transcript growth, budget
//! exhaustion, gateway failures with retry, and referee vetoes.

use async_trait::async_trait;
use llm_duet::export::{ExportView, SessionExporter};
use llm_duet::{
    CompletionGateway, CompletionRequest, ConfigError, Duet, DuetConfig, DuetError, ExportError,
    GatewayError, ParticipantConfig, Referee, Role, RunState, Side, StopReason, Verdict,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Test Infrastructure
// ============================================================================

/// Returns scripted results in order, then numbered replies.
#[derive(Default)]
struct ScriptedGateway {
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGateway {
    fn new(script: impl IntoIterator<Item = Result<String, GatewayError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn echo() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(format!("reply {call}")),
        }
    }
}

#[derive(Clone, Default)]
struct CountingExporter {
    calls: Arc<AtomicUsize>,
    seen_transcript_len: Arc<AtomicUsize>,
}

impl SessionExporter for CountingExporter {
    fn export(&self, view: &ExportView<'_>) -> Result<PathBuf, ExportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_transcript_len
            .store(view.transcript.len(), Ordering::SeqCst);
        Ok(PathBuf::from(format!("memory/{}", view.name)))
    }
}

fn config(referee: bool) -> DuetConfig {
    DuetConfig {
        a: ParticipantConfig::new(Side::A, "Alice", "model-a", "You are Alice. Discuss tides."),
        b: ParticipantConfig::new(Side::B, "Bob", "model-b", "You are Bob. Discuss tides."),
        turns: 5,
        referee,
        file_name: "tides".into(),
    }
}

fn timeout() -> GatewayError {
    GatewayError::Timeout(std::time::Duration::from_secs(1))
}

// ============================================================================
// Context and transcript growth
// ============================================================================

#[tokio::test]
async fn test_contexts_grow_by_one_per_exchange_and_mirror() {
    for turns in 1..=6u32 {
        let mut duet = Duet::new(config(false), ScriptedGateway::echo()).unwrap();
        duet.start(turns).unwrap();

        let mut exchanges = 0;
        while !duet.is_stopped() {
            let report = duet.advance().await.unwrap();
            exchanges += 1;

            let speaker = duet.context(report.side);
            let listener = duet.context(report.side.other());
            assert_eq!(speaker.len(), listener.len());
            assert_eq!(speaker.last().role, Role::Assistant);
            assert_eq!(listener.last().role, Role::User);
            assert_eq!(speaker.last().content, listener.last().content);
            assert_eq!(listener.last().content, report.content);
        }

        assert_eq!(exchanges, turns);
        let n = turns as usize;
        assert_eq!(duet.context(Side::A).len(), 1 + n);
        assert_eq!(duet.context(Side::B).len(), 1 + n);
        assert_eq!(duet.transcript().len(), 2 + n);
    }
}

#[tokio::test]
async fn test_contexts_are_role_swapped_mirrors() {
    let mut duet = Duet::new(config(false), ScriptedGateway::echo()).unwrap();
    duet.start(4).unwrap();
    duet.run().await.unwrap();

    let a = duet.context(Side::A).history();
    let b = duet.context(Side::B).history();
    for (ma, mb) in a.iter().zip(b) {
        assert_eq!(ma.content, mb.content);
        assert_ne!(ma.role, mb.role);
    }
    assert_eq!(duet.context(Side::A).system_prompt(), "You are Alice. Discuss tides.");
    assert_eq!(duet.context(Side::B).system_prompt(), "You are Bob. Discuss tides.");
}

#[tokio::test]
async fn test_transcript_labels_follow_speakers() {
    let mut duet = Duet::new(config(false), ScriptedGateway::echo()).unwrap();
    duet.start(3).unwrap();
    duet.run().await.unwrap();

    let labels: Vec<_> = duet
        .transcript()
        .entries()
        .iter()
        .map(|e| e.label.as_str())
        .collect();
    assert_eq!(
        labels,
        vec!["config for Alice:", "config for Bob:", "Alice:", "Bob:", "Alice:"]
    );
}

// ============================================================================
// Budget and stop
// ============================================================================

#[tokio::test]
async fn test_budget_of_three_stops_and_exports_once() {
    let exporter = CountingExporter::default();
    let gateway = ScriptedGateway::echo();
    let mut duet = Duet::new(config(false), gateway.clone())
        .unwrap()
        .with_exporter(exporter.clone());

    duet.start(3).unwrap();
    let reports = duet.run().await.unwrap();

    assert_eq!(reports.len(), 3);
    assert_eq!(gateway.requests().len(), 3);
    assert_eq!(reports[2].stopped, Some(StopReason::BudgetExhausted));
    assert!(reports[..2].iter().all(|r| r.stopped.is_none()));
    assert_eq!(duet.state(), RunState::Stopped);
    assert_eq!(duet.remaining_turns(), 0);
    assert_eq!(exporter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(exporter.seen_transcript_len.load(Ordering::SeqCst), 5);
    assert_eq!(duet.exported_paths(), &[PathBuf::from("memory/tides")]);

    // Stopping again must not export again.
    duet.stop().unwrap();
    assert_eq!(exporter.calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        duet.advance().await,
        Err(DuetError::InvalidState { operation: "advance", .. })
    ));
}

#[tokio::test]
async fn test_user_stop_between_exchanges() {
    let exporter = CountingExporter::default();
    let mut duet = Duet::new(config(false), ScriptedGateway::echo())
        .unwrap()
        .with_exporter(exporter.clone());

    duet.start(5).unwrap();
    duet.advance().await.unwrap();
    duet.stop().unwrap();

    assert_eq!(duet.stop_reason(), Some(StopReason::UserStop));
    assert_eq!(duet.remaining_turns(), 0);
    assert_eq!(duet.transcript().len(), 3);
    assert_eq!(exporter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zero_turns_is_rejected() {
    let mut duet = Duet::new(config(false), ScriptedGateway::echo()).unwrap();
    assert!(matches!(
        duet.start(0),
        Err(DuetError::Config(ConfigError::InvalidTurns(_)))
    ));
    assert_eq!(duet.state(), RunState::Idle);
}

#[tokio::test]
async fn test_empty_system_prompt_never_builds_a_session() {
    let mut cfg = config(false);
    cfg.a.system_prompt = String::new();
    assert!(matches!(
        Duet::new(cfg, ScriptedGateway::echo()),
        Err(ConfigError::EmptySystemPrompt(_))
    ));
}

// ============================================================================
// Gateway failures
// ============================================================================

#[tokio::test]
async fn test_failure_on_second_turn_leaves_one_exchange() {
    let gateway = ScriptedGateway::new([Ok("first".to_string()), Err(timeout())]);
    let exporter = CountingExporter::default();
    let mut duet = Duet::new(config(false), gateway)
        .unwrap()
        .with_exporter(exporter.clone());

    duet.start(5).unwrap();
    duet.advance().await.unwrap();
    let err = duet.advance().await.unwrap_err();

    assert!(matches!(err, DuetError::Gateway(GatewayError::Timeout(_))));
    assert_eq!(duet.state(), RunState::Blocked);
    assert_eq!(duet.context(Side::A).len(), 2);
    assert_eq!(duet.context(Side::B).len(), 2);
    assert_eq!(duet.transcript().len(), 3);
    assert_eq!(duet.transcript().last().unwrap().content, "first");
    assert_eq!(duet.remaining_turns(), 4);
    assert_eq!(duet.next_side(), Side::B);
    assert_eq!(exporter.calls.load(Ordering::SeqCst), 0);

    // Blocked sessions refuse to advance until retried.
    assert!(matches!(
        duet.advance().await,
        Err(DuetError::InvalidState { operation: "advance", .. })
    ));
}

#[tokio::test]
async fn test_retry_resends_same_side() {
    let gateway = ScriptedGateway::new([Err(timeout())]);
    let mut duet = Duet::new(config(false), gateway.clone()).unwrap();

    duet.start(2).unwrap();
    assert!(duet.advance().await.is_err());
    duet.retry().unwrap();
    let report = duet.advance().await.unwrap();

    assert_eq!(report.side, Side::A);
    let requests = gateway.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn test_retry_only_from_blocked_and_stop_from_blocked_exports() {
    let gateway = ScriptedGateway::new([Err(GatewayError::EmptyResponse)]);
    let exporter = CountingExporter::default();
    let mut duet = Duet::new(config(false), gateway)
        .unwrap()
        .with_exporter(exporter.clone());

    assert!(matches!(
        duet.retry(),
        Err(DuetError::InvalidState { operation: "retry", .. })
    ));

    duet.start(3).unwrap();
    assert!(duet.advance().await.is_err());
    duet.stop().unwrap();

    assert_eq!(duet.state(), RunState::Stopped);
    assert_eq!(duet.stop_reason(), Some(StopReason::UserStop));
    assert_eq!(exporter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(exporter.seen_transcript_len.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_run_returns_first_error() {
    let gateway = ScriptedGateway::new([
        Ok("one".to_string()),
        Ok("two".to_string()),
        Err(GatewayError::Http {
            status: 503,
            message: "overloaded".into(),
            retryable: true,
        }),
    ]);
    let mut duet = Duet::new(config(false), gateway).unwrap();
    duet.start(5).unwrap();

    let err = duet.run().await.unwrap_err();
    match err {
        DuetError::Gateway(err) => assert!(err.is_retryable()),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(duet.transcript().len(), 4);
}

// ============================================================================
// Referee
// ============================================================================

#[tokio::test]
async fn test_referee_veto_stops_at_current_turn() {
    let gateway = ScriptedGateway::new([
        Ok("Tides follow the moon.".to_string()),
        Ok("Yes".to_string()),
        Ok("Let's talk about pizza.".to_string()),
        Ok("No, this has drifted.".to_string()),
    ]);
    let exporter = CountingExporter::default();
    let mut duet = Duet::new(config(true), gateway.clone())
        .unwrap()
        .with_exporter(exporter.clone());

    duet.start(5).unwrap();
    let first = duet.advance().await.unwrap();
    assert_eq!(first.judgement.as_ref().unwrap().verdict, Verdict::Continue);
    assert!(first.stopped.is_none());
    assert_eq!(first.remaining, 4);

    let second = duet.advance().await.unwrap();
    assert!(second.judgement.as_ref().unwrap().is_veto());
    assert_eq!(second.stopped, Some(StopReason::RefereeVeto));
    assert_eq!(second.remaining, 0);

    assert_eq!(duet.state(), RunState::Stopped);
    assert_eq!(duet.stop_reason(), Some(StopReason::RefereeVeto));
    assert!(duet.status().unwrap().contains("No, this has drifted."));
    // The vetoed reply stays recorded.
    assert_eq!(duet.transcript().last().unwrap().content, "Let's talk about pizza.");
    assert_eq!(duet.context(Side::A).len(), 3);
    assert_eq!(exporter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.requests().len(), 4);
}

#[tokio::test]
async fn test_referee_prompt_carries_transcript_and_new_message() {
    let gateway = ScriptedGateway::new([Ok("Waves.".to_string()), Ok("yes".to_string())]);
    let mut duet = Duet::new(config(true), gateway.clone()).unwrap();
    duet.start(1).unwrap();
    duet.advance().await.unwrap();

    let judge = &gateway.requests()[1];
    assert_eq!(judge.model, "model-a");
    assert_eq!(judge.seed, None);
    assert_eq!(judge.messages.len(), 2);
    assert_eq!(judge.messages[0].role, Role::System);
    let prompt = &judge.messages[1].content;
    assert!(prompt.contains("config for Alice: System prompt: You are Alice. Discuss tides."));
    assert!(prompt.contains("Alice: Waves."));
    assert!(prompt.contains("New message:\nWaves."));
    assert!(prompt.ends_with("Reply with just yes or no."));
}

#[tokio::test]
async fn test_dedicated_referee_model() {
    let gateway = ScriptedGateway::new([Ok("Waves.".to_string()), Ok("Yes".to_string())]);
    let mut duet = Duet::new(config(false), gateway.clone())
        .unwrap()
        .with_referee(Referee::new().with_model("judge"));
    duet.start(1).unwrap();
    duet.advance().await.unwrap();
    assert_eq!(gateway.requests()[1].model, "judge");
}

#[tokio::test]
async fn test_referee_failure_applies_nothing_and_retry_repeats_only_the_check() {
    let gateway = ScriptedGateway::new([
        Ok("turn one".to_string()),
        Ok("yes".to_string()),
        Ok("turn two".to_string()),
        Err(timeout()),
        Ok("Yes".to_string()),
    ]);
    let mut duet = Duet::new(config(true), gateway.clone()).unwrap();
    duet.start(5).unwrap();
    duet.advance().await.unwrap();

    assert!(duet.advance().await.is_err());
    assert_eq!(duet.state(), RunState::Blocked);
    // Only the first exchange is in place.
    assert_eq!(duet.context(Side::A).len(), 2);
    assert_eq!(duet.context(Side::B).len(), 2);
    assert_eq!(duet.transcript().len(), 3);
    assert_eq!(duet.transcript().last().unwrap().content, "turn one");
    assert_eq!(duet.remaining_turns(), 4);
    assert_eq!(duet.next_side(), Side::B);

    duet.retry().unwrap();
    let report = duet.advance().await.unwrap();
    assert_eq!(report.side, Side::B);
    assert_eq!(report.content, "turn two");
    assert_eq!(report.remaining, 3);
    assert_eq!(duet.context(Side::A).len(), 3);
    assert_eq!(duet.context(Side::A).last().content, "turn two");
    assert_eq!(duet.transcript().len(), 4);
    assert_eq!(duet.next_side(), Side::A);

    // The reply is not requested again; the judge sees the same prompt.
    let requests = gateway.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[3], requests[4]);
    assert!(requests[4].messages[1].content.contains("Bob: turn two"));
}

#[tokio::test]
async fn test_stop_after_referee_failure_exports_only_judged_exchanges() {
    let gateway = ScriptedGateway::new([
        Ok("turn one".to_string()),
        Ok("yes".to_string()),
        Ok("turn two".to_string()),
        Err(timeout()),
    ]);
    let exporter = CountingExporter::default();
    let mut duet = Duet::new(config(true), gateway)
        .unwrap()
        .with_exporter(exporter.clone());
    duet.start(5).unwrap();
    duet.advance().await.unwrap();
    assert!(duet.advance().await.is_err());

    duet.stop().unwrap();
    assert_eq!(duet.state(), RunState::Stopped);
    assert_eq!(duet.stop_reason(), Some(StopReason::UserStop));
    assert_eq!(duet.context(Side::A).len(), 2);
    assert_eq!(duet.context(Side::B).len(), 2);
    assert_eq!(duet.transcript().last().unwrap().content, "turn one");
    assert_eq!(exporter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(exporter.seen_transcript_len.load(Ordering::SeqCst), 3);
}
