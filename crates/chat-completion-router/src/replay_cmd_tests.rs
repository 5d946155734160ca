use super::*;
use ccr_core::RouteKind;
use ccr_router::CharEstimateCounter;
use std::sync::Arc;

fn router(toml: &str) -> ModelRouter {
    ModelRouter::new(RouterConfig::from_toml_str(toml).expect("parse config"))
        .expect("build router")
        .with_token_counter(Arc::new(CharEstimateCounter))
}

fn selected(steps: &[ReplayStep]) -> Vec<String> {
    steps
        .iter()
        .filter_map(|step| match &step.outcome {
            ReplayOutcome::Select { provider, .. } => Some(provider.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_round_robin_script() {
    let script = r#"
# three candidates, one session
{"op": "select", "candidates": ["a", "b", "c"], "session": "s1"}
{"op": "select", "candidates": ["a", "b", "c"], "session": "s1"}
{"op": "select", "candidates": ["a", "b", "c"], "session": "s1"}
{"op": "select", "candidates": ["a", "b", "c"], "session": "s1"}
"#;
    let steps = run_script(&router(""), script).await.unwrap();
    assert_eq!(selected(&steps), ["a", "b", "c", "a"]);
    assert_eq!(steps[0].line, 3);
}

#[tokio::test]
async fn test_cooldown_replay_with_pinned_clock() {
    let script = r#"
{"op": "select", "candidates": ["a", "b"], "at": "2025-01-01T00:00:00Z"}
{"op": "failure", "provider": "a", "error": {"status": 503}, "at": "2025-01-01T00:00:01Z"}
{"op": "failure", "provider": "a", "error": {"code": "ECONNRESET"}, "at": "2025-01-01T00:00:02Z"}
{"op": "failure", "provider": "a", "error": {"message": "Request timeout"}, "at": "2025-01-01T00:00:03Z"}
{"op": "failure", "provider": "a", "error": {"status": 404}, "at": "2025-01-01T00:00:04Z"}
{"op": "select", "candidates": ["a", "b"], "at": "2025-01-01T00:00:40Z"}
"#;
    let steps = run_script(&router(""), script).await.unwrap();

    let streaks: Vec<(bool, u32)> = steps
        .iter()
        .filter_map(|step| match &step.outcome {
            ReplayOutcome::Failure {
                recorded, streak, ..
            } => Some((*recorded, *streak)),
            _ => None,
        })
        .collect();
    assert_eq!(streaks, [(true, 1), (true, 2), (true, 3), (false, 3)]);

    // 37s after the last failure the cooldown has passed; rotation resumes at
    // the cursor left by the first selection.
    assert_eq!(selected(&steps), ["a", "b"]);
}

#[tokio::test]
async fn test_success_and_reset() {
    let script = r#"
{"op": "success", "provider": "a", "session": "s"}
{"op": "select", "candidates": ["a", "b"], "session": "s"}
{"op": "failure", "provider": "a", "session": "s", "error": {"statusCode": 429}}
{"op": "success", "provider": "a", "session": "s"}
{"op": "reset", "session": "s"}
{"op": "reset", "session": "s"}
"#;
    let steps = run_script(&router(""), script).await.unwrap();
    let outcomes: Vec<&ReplayOutcome> = steps.iter().map(|s| &s.outcome).collect();

    assert!(matches!(
        outcomes[0],
        ReplayOutcome::Success { cleared: false, .. }
    ));
    assert!(matches!(
        outcomes[2],
        ReplayOutcome::Failure {
            recorded: true,
            streak: 1,
            ..
        }
    ));
    assert!(matches!(outcomes[3], ReplayOutcome::Success { cleared: true, .. }));
    assert!(matches!(outcomes[4], ReplayOutcome::Reset { removed: true, .. }));
    assert!(matches!(outcomes[5], ReplayOutcome::Reset { removed: false, .. }));
}

#[tokio::test]
async fn test_route_and_usage_ops() {
    let config = r#"
[router]
default = "d"
longContext = "long"
"#;
    let request = format!(
        r#"{{"model": "claude-sonnet-4", "messages": [{{"role": "user", "content": "{}"}}], "metadata": {{"user_id": "u_session_s9"}}}}"#,
        "x".repeat(4 * 25_000)
    );
    let script = format!(
        "{{\"op\": \"route\", \"request\": {request}}}\n\
         {{\"op\": \"usage\", \"session\": \"s9\", \"usage\": {{\"input_tokens\": 80000}}}}\n\
         {{\"op\": \"route\", \"request\": {request}}}\n"
    );
    let steps = run_script(&router(config), &script).await.unwrap();

    let routes: Vec<RouteKind> = steps
        .iter()
        .filter_map(|step| match &step.outcome {
            ReplayOutcome::Route { decision } => Some(decision.route),
            _ => None,
        })
        .collect();
    assert_eq!(routes, [RouteKind::Default, RouteKind::LongContext]);
}

#[tokio::test]
async fn test_bad_line_reports_line_number() {
    let script = "{\"op\": \"select\", \"candidates\": [\"a\"]}\n{\"op\": \"explode\"}\n";
    let err = run_script(&router(""), script).await.unwrap_err();
    assert!(format!("{err:#}").contains("line 2"));

    let script = "{\"op\": \"select\", \"candidates\": []}\n";
    let err = run_script(&router(""), script).await.unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("line 1"));
    assert!(message.contains("must not be empty"));
}

#[test]
fn test_format_step_text() {
    let step = ReplayStep {
        line: 4,
        outcome: ReplayOutcome::Failure {
            scope: RoutingScope::session("s1"),
            provider: "a".to_string(),
            recorded: false,
            streak: 0,
        },
    };
    assert_eq!(format_step(&step), "4: failure [session:s1] a ignored (streak 0)\n");

    let json = serde_json::to_value(&step).unwrap();
    assert_eq!(json["op"], "failure");
    assert_eq!(json["line"], 4);
    assert_eq!(json["scope"], "session:s1");
}
