use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::catalog::{NO_SECTIONS_AVAILABLE, owned};
use crate::client::OptionClient;
use crate::model::DocChangeResponse;
use crate::upstream::FallbackBackend;
use crate::upstream::testing::ScriptedUpstream;

fn options(request: &CascadeRequest, values: &[&str]) -> CascadeResponse {
    CascadeResponse {
        tag: request.tag().clone(),
        payload: ResponsePayload::Options(owned(values)),
    }
}

fn rows(request: &CascadeRequest, payload: DocChangeResponse) -> CascadeResponse {
    CascadeResponse {
        tag: request.tag().clone(),
        payload: ResponsePayload::Rows(payload),
    }
}

fn payload(detail_df: Vec<Vec<serde_json::Value>>) -> DocChangeResponse {
    DocChangeResponse {
        doc_type: "Legislation".to_string(),
        current_rev: "2024-06-01".to_string(),
        status: owned(&["Not Started", "Reviewed", "Addressed"]),
        detail_df,
        ..DocChangeResponse::default()
    }
}

fn good_row(id: u64) -> Vec<serde_json::Value> {
    vec![
        json!("2024-06-01"),
        json!("Scope"),
        json!(3),
        json!("Scope widened to include contractors."),
        json!("relevant"),
        json!(["SLM 1.05.03"]),
        json!([]),
        json!(id),
        json!("Not Started"),
    ]
}

// Drives the controller to the point where a recency value can be chosen.
fn at_recency() -> (CascadeController, CascadeRequest) {
    let mut controller = CascadeController::new();
    let request = controller.start().unwrap();
    controller.deliver(options(&request, &["Legislation", "Guidance"]));

    let request = controller.select(Stage::DocType, "Legislation").unwrap();
    controller.deliver(options(&request, &["Doc A", "Doc B"]));

    let request = controller.select(Stage::Document, "Doc A").unwrap();
    controller.deliver(options(&request, &["1 month", "3 months", "6 months"]));
    (controller, request)
}

fn resolved() -> CascadeController {
    let (mut controller, _) = at_recency();

    let request = controller.select(Stage::Recency, "3 months").unwrap();
    controller.deliver(options(&request, &["Scope", "Penalties"]));

    let request = controller.select(Stage::Section, "All").unwrap();
    controller.deliver(options(&request, &["relevant", "maybe relevant"]));

    let request = controller.select(Stage::Relevance, "relevant").unwrap();
    assert_eq!(
        controller.deliver(rows(&request, payload(vec![good_row(1), good_row(2)]))),
        Delivery::Applied
    );
    controller
}

#[test]
fn resolving_all_five_stages_populates_rows() {
    let controller = resolved();
    assert_eq!(controller.phase(), &CascadePhase::Resolved);
    assert_eq!(controller.resolution().unwrap().rows.len(), 2);
    assert!(controller.pending().is_none());
}

#[test]
fn setting_a_stage_clears_every_descendant() {
    let mut controller = resolved();

    let request = controller.select(Stage::Recency, "6 months").unwrap();

    let filters = controller.filters();
    assert_eq!(filters.get(Stage::Recency), Some("6 months"));
    assert_eq!(filters.get(Stage::Section), None);
    assert_eq!(filters.get(Stage::Relevance), None);
    assert!(controller.resolution().is_none());
    assert!(controller.options(Stage::Section).is_none());
    assert!(controller.options(Stage::Relevance).is_none());
    assert_eq!(controller.phase(), &CascadePhase::Loading(Stage::Section));
    assert!(matches!(
        request,
        CascadeRequest::Options {
            query: OptionQuery::Sections { ref recency, .. },
            ..
        } if recency == "6 months"
    ));
}

#[test]
fn reselecting_the_same_value_still_clears_descendants() {
    let mut controller = resolved();
    controller.select(Stage::Section, "All").unwrap();
    assert_eq!(controller.filters().get(Stage::Relevance), None);
    assert!(controller.resolution().is_none());
}

#[test]
fn stale_section_options_are_discarded() {
    let (mut controller, _) = at_recency();

    let first = controller.select(Stage::Recency, "1 month").unwrap();
    let second = controller.select(Stage::Recency, "3 months").unwrap();

    assert_eq!(
        controller.deliver(options(&first, &["Introduction"])),
        Delivery::Discarded
    );
    assert!(controller.options(Stage::Section).is_none());

    assert_eq!(
        controller.deliver(options(&second, &["Scope", "Penalties"])),
        Delivery::Applied
    );
    let sections = controller.options(Stage::Section).unwrap();
    assert_eq!(sections.prefix(), ["Legislation", "Doc A", "3 months"]);
    let values: Vec<&str> = sections
        .entries()
        .iter()
        .map(|entry| entry.value.as_str())
        .collect();
    assert_eq!(values, vec!["All", "Scope", "Penalties"]);
}

#[test]
fn superseded_request_with_identical_prefix_is_discarded() {
    let (mut controller, _) = at_recency();

    let first = controller.select(Stage::Recency, "3 months").unwrap();
    let second = controller.select(Stage::Recency, "3 months").unwrap();
    assert_eq!(first.tag().prefix(), second.tag().prefix());
    assert_ne!(first.tag().seq(), second.tag().seq());

    assert_eq!(
        controller.deliver(options(&first, &["Scope"])),
        Delivery::Discarded
    );
    assert_eq!(
        controller.deliver(options(&second, &["Scope"])),
        Delivery::Applied
    );
}

#[test]
fn late_rows_for_an_abandoned_tuple_are_discarded() {
    let (mut controller, _) = at_recency();
    let request = controller.select(Stage::Recency, "3 months").unwrap();
    controller.deliver(options(&request, &["Scope"]));
    let request = controller.select(Stage::Section, "Scope").unwrap();
    controller.deliver(options(&request, &["relevant"]));

    let rows_request = controller.select(Stage::Relevance, "relevant").unwrap();
    controller.select(Stage::Section, "All").unwrap();

    assert_eq!(
        controller.deliver(rows(&rows_request, payload(vec![good_row(1)]))),
        Delivery::Discarded
    );
    assert!(controller.resolution().is_none());
}

#[test]
fn stage_without_resolved_ancestors_is_rejected() {
    let mut controller = CascadeController::new();
    controller.start().unwrap();

    assert_eq!(
        controller.select(Stage::Section, "All").unwrap_err(),
        CascadeError::UnresolvedAncestor {
            stage: Stage::Section,
            missing: Stage::DocType,
        }
    );
    assert!(!controller.is_enabled(Stage::Section));
    assert_eq!(
        controller.select(Stage::DocType, "  ").unwrap_err(),
        CascadeError::EmptyValue {
            stage: Stage::DocType
        }
    );
}

#[test]
fn empty_option_list_yields_a_sentinel_without_advancing() {
    let (mut controller, _) = at_recency();
    let request = controller.select(Stage::Recency, "1 month").unwrap();

    assert_eq!(controller.deliver(options(&request, &[])), Delivery::Applied);

    let sections = controller.options(Stage::Section).unwrap();
    assert!(sections.is_sentinel_only());
    assert_eq!(sections.entries()[0].label, NO_SECTIONS_AVAILABLE);
    assert_eq!(controller.phase(), &CascadePhase::Choosing(Stage::Section));
    assert_eq!(controller.filters().get(Stage::Section), None);
    assert!(controller.pending().is_none());
    assert!(controller.is_enabled(Stage::Section));
}

#[test]
fn malformed_payload_fails_but_keeps_the_tuple() {
    let (mut controller, _) = at_recency();
    let request = controller.select(Stage::Recency, "3 months").unwrap();
    controller.deliver(options(&request, &["Scope"]));
    let request = controller.select(Stage::Section, "All").unwrap();
    controller.deliver(options(&request, &["relevant"]));
    let request = controller.select(Stage::Relevance, "relevant").unwrap();

    let mut short = good_row(1);
    short.truncate(7);
    assert_eq!(
        controller.deliver(rows(&request, payload(vec![short]))),
        Delivery::Applied
    );
    assert!(matches!(controller.phase(), CascadePhase::Failed(_)));
    assert!(controller.filters().resolved().is_some());
    assert!(controller.resolution().is_none());

    let retry = controller.retry().unwrap();
    assert_eq!(controller.phase(), &CascadePhase::Resolving);
    controller.deliver(rows(&retry, payload(vec![good_row(1)])));
    assert_eq!(controller.phase(), &CascadePhase::Resolved);
}

#[test]
fn retry_requires_a_resolved_tuple() {
    let (mut controller, _) = at_recency();
    assert_eq!(controller.retry().unwrap_err(), CascadeError::Unresolved);
}

#[test]
fn payload_of_the_wrong_kind_is_discarded() {
    let (mut controller, _) = at_recency();
    let request = controller.select(Stage::Recency, "3 months").unwrap();
    assert_eq!(
        controller.deliver(rows(&request, payload(Vec::new()))),
        Delivery::Discarded
    );
    assert_eq!(controller.phase(), &CascadePhase::Loading(Stage::Section));
}

#[tokio::test]
async fn slow_superseded_fetch_loses_to_the_current_one() {
    let upstream =
        ScriptedUpstream::default().with_section_delay("1 month", Duration::from_millis(50));
    let client = OptionClient::new(Arc::new(FallbackBackend::new(Box::new(upstream))));
    let (mut controller, _) = at_recency();

    let slow = controller.select(Stage::Recency, "1 month").unwrap();
    let fast = controller.select(Stage::Recency, "3 months").unwrap();

    let slow_fetch = async {
        let response = client.fetch(slow).await;
        (tokio::time::Instant::now(), response)
    };
    let fast_fetch = async {
        let response = client.fetch(fast).await;
        (tokio::time::Instant::now(), response)
    };
    let ((slow_done, slow_response), (fast_done, fast_response)) =
        tokio::join!(slow_fetch, fast_fetch);
    assert!(fast_done <= slow_done);

    assert_eq!(controller.deliver(fast_response), Delivery::Applied);
    assert_eq!(controller.deliver(slow_response), Delivery::Discarded);

    let values: Vec<&str> = controller
        .options(Stage::Section)
        .unwrap()
        .entries()
        .iter()
        .map(|entry| entry.value.as_str())
        .collect();
    assert_eq!(values, vec!["All", "Scope", "Compliance", "Penalties"]);
}
