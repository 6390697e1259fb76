// crates/akashi-contract/tests/contract_types.rs
// ============================================================================
// Module: Contract Type Tests
// Description: Verifies envelopes, error codes, and wire conversions.
// ============================================================================
//! ## Overview
//! Pins the published wire forms: snake_case error codes with their HTTP
//! status mapping, the `{data, meta}` and `{error, meta}` envelopes, and
//! the trace body to core request conversion.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use akashi_contract::ErrorCode;
use akashi_contract::ErrorEnvelope;
use akashi_contract::ResponseMeta;
use akashi_contract::SuccessEnvelope;
use akashi_contract::TraceBody;
use akashi_contract::TraceData;
use akashi_contract::TraceDecisionBody;
use akashi_core::AgentName;
use akashi_core::DecisionId;
use akashi_core::IdempotencyKey;
use akashi_core::OrgId;
use akashi_core::RunId;
use akashi_core::StoreError;
use akashi_core::Timestamp;
use akashi_core::runtime::PipelineError;
use serde_json::json;

fn meta() -> ResponseMeta {
    ResponseMeta {
        request_id: "req-1".to_string(),
        timestamp: Timestamp::from_unix_micros(1_768_500_000_000_000),
    }
}

#[test]
fn error_codes_serialize_as_stable_snake_case() {
    for (code, label) in [
        (ErrorCode::Validation, "validation"),
        (ErrorCode::Auth, "auth"),
        (ErrorCode::Permission, "permission"),
        (ErrorCode::NotFound, "not_found"),
        (ErrorCode::Conflict, "conflict"),
        (ErrorCode::QuotaExceeded, "quota_exceeded"),
        (ErrorCode::RateLimited, "rate_limited"),
        (ErrorCode::StoreUnavailable, "store_unavailable"),
        (ErrorCode::IndexUnavailable, "index_unavailable"),
        (ErrorCode::Internal, "internal"),
    ] {
        assert_eq!(code.as_str(), label);
        let serialized = serde_json::to_string(&code).expect("serialize");
        assert_eq!(serialized, format!("\"{label}\""));
    }
}

#[test]
fn http_statuses_match_the_published_mapping() {
    assert_eq!(ErrorCode::Validation.http_status(), 400);
    assert_eq!(ErrorCode::Auth.http_status(), 401);
    assert_eq!(ErrorCode::Permission.http_status(), 403);
    assert_eq!(ErrorCode::NotFound.http_status(), 404);
    assert_eq!(ErrorCode::Conflict.http_status(), 409);
    assert_eq!(ErrorCode::QuotaExceeded.http_status(), 429);
    assert_eq!(ErrorCode::StoreUnavailable.http_status(), 503);
    assert_eq!(ErrorCode::Internal.http_status(), 500);
}

#[test]
fn pipeline_errors_map_to_stable_codes() {
    let cases: Vec<(PipelineError, ErrorCode)> = vec![
        (PipelineError::Validation("bad".into()), ErrorCode::Validation),
        (PipelineError::PermissionDenied("role".into()), ErrorCode::Permission),
        (PipelineError::NotFound("run".into()), ErrorCode::NotFound),
        (PipelineError::IdempotencyInFlight, ErrorCode::Conflict),
        (
            PipelineError::QuotaExceeded {
                limit: 2,
                count: 2,
            },
            ErrorCode::QuotaExceeded,
        ),
        (
            PipelineError::Store(StoreError::Unavailable("down".into())),
            ErrorCode::StoreUnavailable,
        ),
        (
            PipelineError::Store(StoreError::Conflict("dup".into())),
            ErrorCode::Conflict,
        ),
        (
            PipelineError::Store(StoreError::Corrupt("hash".into())),
            ErrorCode::Internal,
        ),
    ];
    for (error, expected) in cases {
        assert_eq!(ErrorCode::from(&error), expected, "{error}");
    }
}

#[test]
fn success_envelope_has_the_data_meta_shape() {
    let envelope = SuccessEnvelope {
        data: TraceData {
            run_id: RunId::from_uuid(uuid_from(1)),
            decision_id: DecisionId::from_uuid(uuid_from(2)),
            event_count: 1,
        },
        meta: meta(),
    };
    let value = serde_json::to_value(&envelope).expect("serialize");
    assert!(value.get("data").is_some());
    assert!(value.get("meta").is_some());
    assert_eq!(value["data"]["event_count"], json!(1));
    assert_eq!(value["meta"]["request_id"], json!("req-1"));
    assert_eq!(
        value["meta"]["timestamp"],
        json!("2026-01-15T18:00:00.000000Z"),
        "timestamps render with six fractional digits"
    );
}

#[test]
fn error_envelope_carries_code_and_message() {
    let error = PipelineError::QuotaExceeded {
        limit: 2,
        count: 2,
    };
    let envelope = ErrorEnvelope::from_pipeline(&error, meta());
    let value = serde_json::to_value(&envelope).expect("serialize");
    assert_eq!(value["error"]["code"], json!("quota_exceeded"));
    assert!(
        value["error"]["message"].as_str().is_some_and(|text| text.contains("quota")),
        "message is human-readable"
    );
    assert!(value["error"].get("details").is_none(), "absent details are omitted");
}

#[test]
fn trace_body_converts_into_a_core_request() {
    let body = TraceBody {
        agent_id: AgentName::new("a1"),
        run_id: None,
        decision: TraceDecisionBody {
            decision_type: "db".to_string(),
            outcome: "postgres".to_string(),
            confidence: 0.8,
            reasoning: Some("fits".to_string()),
            alternatives: Vec::new(),
            evidence: Vec::new(),
            embedding: None,
            precedent_ref: None,
            valid_from: None,
        },
        metadata: json!({"ticket": "ENG-1"}),
    };
    let request =
        body.into_request(OrgId::new("org-1"), Some(IdempotencyKey::new("K")));
    assert_eq!(request.org_id, OrgId::new("org-1"));
    assert_eq!(request.agent, AgentName::new("a1"));
    assert_eq!(request.decision.decision_type, "db");
    assert_eq!(request.decision.metadata, json!({"ticket": "ENG-1"}));
    assert_eq!(request.idempotency_key, Some(IdempotencyKey::new("K")));
    assert!(request.events.is_empty());
}

#[test]
fn trace_body_parses_the_wire_form() {
    let raw = json!({
        "agent_id": "a1",
        "decision": {
            "decision_type": "db",
            "outcome": "postgres",
            "confidence": 0.8
        }
    });
    let body: TraceBody = serde_json::from_value(raw).expect("parse");
    assert_eq!(body.agent_id, AgentName::new("a1"));
    assert!(body.run_id.is_none());
    assert!(body.decision.alternatives.is_empty());
}

fn uuid_from(value: u128) -> uuid::Uuid {
    uuid::Uuid::from_u128(value)
}
