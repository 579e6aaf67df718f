//! Reconciliation, enrichment and session flows against the in-memory data
//! endpoint.

use serde_json::{json, Value};
use uuid::Uuid;

use sominner_core::config::SupportConfig;
use sominner_core::{SenderType, SessionStatus};
use sominner_rest::{
    CancellationToken, DataApi, Filter, MemoryDataApi, Query, RecordedCall, RestError, Returning,
};
use sominner_support::{SupportError, SupportService};

// =============================================================================
// Helpers
// =============================================================================

fn memory() -> MemoryDataApi {
    MemoryDataApi::new()
        .with_serial_ids("chat_messages")
        .with_now_column("chat_messages", "created_at")
        .with_now_column("chat_sessions", "started_at")
        .with_relation_one("chat_sessions", "customer_contacts", "customer_id")
        .with_relation_many("chat_sessions", "chat_messages", "session_id")
}

fn service(api: &MemoryDataApi) -> SupportService<MemoryDataApi> {
    SupportService::new(api.clone(), SupportConfig::default())
}

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

fn seed_contact(api: &MemoryDataApi, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    api.seed(
        "customer_contacts",
        [json!({"id": id, "full_name": "Ann", "email": email, "source": "website_chat"})],
    );
    id
}

fn seed_session(api: &MemoryDataApi, customer_id: Uuid, status: &str, started_at: &str) -> Uuid {
    let id = Uuid::new_v4();
    api.seed(
        "chat_sessions",
        [json!({"id": id, "customer_id": customer_id, "status": status, "started_at": started_at})],
    );
    id
}

fn writes(api: &MemoryDataApi) -> usize {
    api.calls().iter().filter(|c| c.is_write()).count()
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_without_email_always_creates_contact_and_session() {
    let api = memory();
    let support = service(&api);

    for email in [None, Some(""), Some("   ")] {
        let before_contacts = api.count("customer_contacts");
        let before_sessions = api.count("chat_sessions");
        let result = support
            .create_chat_session("Ann Lee", email, &cancel())
            .await
            .unwrap();
        assert!(!result.is_returning_customer);
        assert!(!result.is_reusing_session);
        assert_eq!(api.count("customer_contacts"), before_contacts + 1);
        assert_eq!(api.count("chat_sessions"), before_sessions + 1);
    }
    // No lookups are made for email-less visitors.
    assert!(api.queries_to("customer_contacts").is_empty());
}

#[tokio::test]
async fn test_placeholder_contact_fields() {
    let api = memory();
    let support = service(&api);
    let result = support
        .create_chat_session("!!!", None, &cancel())
        .await
        .unwrap();

    let contact = &api.rows("customer_contacts")[0];
    let email = contact["email"].as_str().unwrap();
    assert!(email.starts_with("guest-"), "{email}");
    assert!(email.ends_with("@guest.sominnercore.com"));
    let token = &email["guest-".len()..email.find('@').unwrap()];
    assert_eq!(token.len(), 32);
    assert_eq!(contact["source"], json!("website_chat"));

    let session = &api.rows("chat_sessions")[0];
    assert_eq!(session["id"], json!(result.session_id));
    assert_eq!(session["customer_id"], contact["id"]);
    assert_eq!(session["status"], json!("active"));
    assert_eq!(
        session["metadata"],
        json!({"customer_name": "!!!", "customer_email": null})
    );
}

#[tokio::test]
async fn test_returning_customer_with_active_session_reuses_it() {
    let api = memory();
    let customer = seed_contact(&api, "ann@x.io");
    let open = seed_session(&api, customer, "active", "2024-05-01T10:00:00Z");
    let support = service(&api);

    let result = support
        .create_chat_session("Ann", Some("  ann@x.io "), &cancel())
        .await
        .unwrap();

    assert_eq!(result.session_id, open);
    assert!(result.is_returning_customer);
    assert!(result.is_reusing_session);
    assert_eq!(writes(&api), 0);
    assert_eq!(api.count("chat_sessions"), 1);
}

#[tokio::test]
async fn test_waiting_session_counts_as_open_and_newest_wins() {
    let api = memory();
    let customer = seed_contact(&api, "ann@x.io");
    seed_session(&api, customer, "active", "2024-05-01T10:00:00Z");
    let newest = seed_session(&api, customer, "waiting", "2024-06-01T10:00:00Z");
    seed_session(&api, customer, "closed", "2024-07-01T10:00:00Z");
    let support = service(&api);

    let result = support
        .create_chat_session("Ann", Some("ann@x.io"), &cancel())
        .await
        .unwrap();
    assert_eq!(result.session_id, newest);
    assert!(result.is_reusing_session);
}

#[tokio::test]
async fn test_returning_customer_with_only_closed_session_gets_new_session() {
    let api = memory();
    let customer = seed_contact(&api, "ann@x.io");
    let closed = seed_session(&api, customer, "closed", "2024-05-01T10:00:00Z");
    let support = service(&api);

    let result = support
        .create_chat_session("Ann", Some("ann@x.io"), &cancel())
        .await
        .unwrap();

    assert_ne!(result.session_id, closed);
    assert!(result.is_returning_customer);
    assert!(!result.is_reusing_session);
    assert_eq!(api.count("customer_contacts"), 1);
    assert_eq!(api.count("chat_sessions"), 2);
    assert_eq!(api.writes_to("chat_sessions").len(), 1);
    assert!(api.writes_to("customer_contacts").is_empty());

    let created = api
        .rows("chat_sessions")
        .into_iter()
        .find(|row| row["id"] == json!(result.session_id))
        .unwrap();
    assert_eq!(created["customer_id"], json!(customer));
    assert_eq!(created["metadata"]["customer_email"], json!("ann@x.io"));
}

#[tokio::test]
async fn test_unknown_email_creates_contact_with_that_email() {
    let api = memory();
    let support = service(&api);

    let result = support
        .create_chat_session("Bo", Some(" bo@x.io "), &cancel())
        .await
        .unwrap();
    assert!(!result.is_returning_customer);
    assert_eq!(api.rows("customer_contacts")[0]["email"], json!("bo@x.io"));

    // A second visit with the session still open is reattached.
    let again = support
        .create_chat_session("Bo", Some("bo@x.io"), &cancel())
        .await
        .unwrap();
    assert_eq!(again.session_id, result.session_id);
    assert!(again.is_returning_customer && again.is_reusing_session);
    assert_eq!(api.count("customer_contacts"), 1);
}

#[tokio::test]
async fn test_email_match_is_case_sensitive() {
    let api = memory();
    seed_contact(&api, "Ann@X.io");
    let support = service(&api);

    let result = support
        .create_chat_session("Ann", Some("ann@x.io"), &cancel())
        .await
        .unwrap();
    assert!(!result.is_returning_customer);
    assert_eq!(api.count("customer_contacts"), 2);
}

#[tokio::test]
async fn test_lookup_queries_match_backend_dialect() {
    let api = memory();
    let customer = seed_contact(&api, "ann@x.io");
    let support = service(&api);
    support
        .create_chat_session("Ann", Some("ann@x.io"), &cancel())
        .await
        .unwrap();

    let contact_query = &api.queries_to("customer_contacts")[0];
    let params = contact_query.to_params();
    assert!(params.contains(&("email".into(), "eq.ann@x.io".into())));
    assert!(params.contains(&("limit".into(), "1".into())));

    let session_query = &api.queries_to("chat_sessions")[0];
    let params = session_query.to_params();
    assert!(params.contains(&("customer_id".into(), format!("eq.{customer}"))));
    assert!(params.contains(&("or".into(), "(status.eq.active,status.eq.waiting)".into())));
    assert!(params.contains(&("order".into(), "started_at.desc".into())));
    assert!(params.contains(&("limit".into(), "1".into())));
}

#[tokio::test]
async fn test_reconciliation_propagates_remote_fault() {
    let api = memory();
    api.fail_table("customer_contacts", 503, "unavailable");
    let support = service(&api);

    let err = support
        .create_chat_session("Ann", Some("ann@x.io"), &cancel())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SupportError::Rest(RestError::Remote { status: 503, ref body }) if body == "unavailable"
    ));
    assert_eq!(api.count("chat_sessions"), 0);
}

#[tokio::test]
async fn test_reconciliation_honours_cancellation() {
    let api = memory();
    let support = service(&api);
    let token = cancel();
    token.cancel();

    let err = support
        .create_chat_session("Ann", None, &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(api.count("customer_contacts"), 0);
}

// =============================================================================
// Messages and enrichment
// =============================================================================

#[tokio::test]
async fn test_enrichment_batches_distinct_agent_ids() {
    let api = memory();
    let alex = Uuid::new_v4();
    let blake = Uuid::new_v4();
    api.seed(
        "team_members",
        [json!({"id": alex, "display_name": "Alex"})],
    );
    let session = Uuid::new_v4();
    let support = service(&api);

    support
        .add_agent_message(session, "hello", Some(alex), &cancel())
        .await
        .unwrap();
    support
        .add_customer_message(session, "hi", &cancel())
        .await
        .unwrap();
    support
        .add_agent_message(session, "how can I help", Some(alex), &cancel())
        .await
        .unwrap();
    support
        .add_agent_message(session, "handing over", Some(blake), &cancel())
        .await
        .unwrap();

    let details = support.messages(session, &cancel()).await.unwrap();
    let names: Vec<_> = details.iter().map(|d| d.agent_name.as_deref()).collect();
    assert_eq!(names, vec![Some("Alex"), None, Some("Alex"), None]);
    assert_eq!(
        details.iter().map(|d| d.sender_type).collect::<Vec<_>>(),
        vec![
            SenderType::Agent,
            SenderType::Customer,
            SenderType::Agent,
            SenderType::Agent
        ]
    );

    let lookups = api.queries_to("team_members");
    assert_eq!(lookups.len(), 1);
    assert_eq!(
        lookups[0].filters,
        vec![Filter::is_in("id", [alex, blake])]
    );
}

#[tokio::test]
async fn test_messages_are_ordered_by_creation() {
    let api = memory();
    let session = Uuid::new_v4();
    api.seed(
        "chat_messages",
        [
            json!({"id": 2, "session_id": session, "sender_type": "customer", "message": "second", "created_at": "2024-05-01T10:01:00Z"}),
            json!({"id": 1, "session_id": session, "sender_type": "customer", "message": "first", "created_at": "2024-05-01T10:00:00Z"}),
            json!({"id": 3, "session_id": Uuid::new_v4(), "sender_type": "customer", "message": "other", "created_at": "2024-05-01T09:00:00Z"}),
        ],
    );
    let details = service(&api).messages(session, &cancel()).await.unwrap();
    assert_eq!(
        details.iter().map(|d| d.message.as_str()).collect::<Vec<_>>(),
        vec!["first", "second"]
    );
    // Customer-only history needs no agent lookup.
    assert!(api.queries_to("team_members").is_empty());
}

#[tokio::test]
async fn test_history_survives_loosely_typed_rows() {
    let api = memory();
    let session = Uuid::new_v4();
    api.seed(
        "chat_messages",
        [
            json!({"id": 1, "session_id": session, "sender_type": "customer", "message": "hi", "created_at": "2024-05-01T10:00:00.123456"}),
            json!({"id": 2, "session_id": session, "sender_type": "system", "message": null, "created_at": "2024-05-01T10:01:00Z"}),
        ],
    );
    let details = service(&api).messages(session, &cancel()).await.unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].message, "hi");
    assert_eq!(
        details[0].created_at.to_rfc3339(),
        "2024-05-01T10:00:00.123456+00:00"
    );
    assert_eq!(details[1].message, "");
}

#[tokio::test]
async fn test_enrichment_failure_degrades_to_no_names() {
    let api = memory();
    let agent = Uuid::new_v4();
    api.fail_table("team_members", 500, "boom");
    let session = Uuid::new_v4();
    let support = service(&api);
    support
        .add_agent_message(session, "hello", Some(agent), &cancel())
        .await
        .unwrap();

    let details = support.messages(session, &cancel()).await.unwrap();
    assert_eq!(details.len(), 1);
    assert!(details[0].agent_name.is_none());
    assert_eq!(details[0].sender_id, Some(agent));
}

#[tokio::test]
async fn test_message_fetch_failure_is_not_swallowed() {
    let api = memory();
    api.fail_table("chat_messages", 401, "jwt expired");
    let err = service(&api)
        .messages(Uuid::new_v4(), &cancel())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_blank_message_rejected_before_any_call() {
    let api = memory();
    let err = service(&api)
        .add_customer_message(Uuid::new_v4(), "  \n", &cancel())
        .await
        .unwrap_err();
    assert!(matches!(err, SupportError::EmptyMessage));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_insert_round_trip() {
    let api = memory();
    let session = Uuid::new_v4();
    let agent = Uuid::new_v4();
    let created = service(&api)
        .add_agent_message(session, "round trip", Some(agent), &cancel())
        .await
        .unwrap();

    let rows = api
        .query(
            &Query::table("chat_messages").eq("id", created.id),
            &cancel(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["session_id"], json!(session));
    assert_eq!(row["sender_type"], json!("agent"));
    assert_eq!(row["sender_id"], json!(agent));
    assert_eq!(row["message"], json!("round trip"));
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_list_sessions_with_preview() {
    let api = memory();
    let support = service(&api);
    let first = support
        .create_chat_session("Ann", Some("ann@x.io"), &cancel())
        .await
        .unwrap();
    support
        .add_customer_message(first.session_id, "older", &cancel())
        .await
        .unwrap();
    api.seed(
        "chat_messages",
        [json!({
            "session_id": first.session_id,
            "sender_type": "customer",
            "message": "newest",
            "created_at": "2999-01-01T00:00:00Z"
        })],
    );

    let sessions = support.list_sessions(&cancel()).await.unwrap();
    assert_eq!(sessions.len(), 1);
    let summary = &sessions[0];
    assert_eq!(summary.id, first.session_id);
    assert_eq!(summary.customer_name.as_deref(), Some("Ann"));
    assert_eq!(summary.customer_email.as_deref(), Some("ann@x.io"));
    assert_eq!(summary.last_message_preview.as_deref(), Some("newest"));
}

#[tokio::test]
async fn test_close_session_makes_next_visit_start_fresh() {
    let api = memory();
    let support = service(&api);
    let first = support
        .create_chat_session("Ann", Some("ann@x.io"), &cancel())
        .await
        .unwrap();

    support
        .close_session(first.session_id, &cancel())
        .await
        .unwrap();
    let update = api.writes_to("chat_sessions").pop().unwrap();
    assert_eq!(
        update,
        RecordedCall::Update {
            table: "chat_sessions".into(),
            filters: vec![Filter::eq("id", first.session_id)],
            patch: json!({"status": "closed"}),
            returning: Returning::Minimal,
        }
    );

    let second = support
        .create_chat_session("Ann", Some("ann@x.io"), &cancel())
        .await
        .unwrap();
    assert_ne!(second.session_id, first.session_id);
    assert!(second.is_returning_customer);
    assert!(!second.is_reusing_session);
}

#[tokio::test]
async fn test_set_session_status_waiting() {
    let api = memory();
    let customer = seed_contact(&api, "ann@x.io");
    let session = seed_session(&api, customer, "active", "2024-05-01T10:00:00Z");
    service(&api)
        .set_session_status(session, SessionStatus::Waiting, &cancel())
        .await
        .unwrap();
    assert_eq!(api.rows("chat_sessions")[0]["status"], json!("waiting"));
}

// =============================================================================
// Submissions
// =============================================================================

#[tokio::test]
async fn test_update_submission_requires_token() {
    let api = memory();
    let err = service(&api)
        .update_submission_status(Uuid::new_v4(), "resolved", " ", Some("me"), None, &cancel())
        .await
        .unwrap_err();
    assert!(matches!(err, SupportError::MissingAccessToken));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_submissions_list_and_update_as_user() {
    let api = memory();
    let older = Uuid::new_v4();
    let newer = Uuid::new_v4();
    api.seed(
        "customer_submissions",
        [
            json!({"id": older, "full_name": "A", "email": "a@x.io", "status": "new", "submitted_at": "2024-01-01T00:00:00Z"}),
            json!({"id": newer, "full_name": "B", "email": "b@x.io", "status": "new", "submitted_at": "2024-02-01T00:00:00Z", "tags": ["vip"]}),
        ],
    );
    let support = service(&api);

    let listed = support
        .list_submissions(Some("jwt"), &cancel())
        .await
        .unwrap();
    assert_eq!(listed.iter().map(|s| s.id).collect::<Vec<_>>(), vec![newer, older]);
    assert_eq!(listed[0].tags, vec!["vip"]);

    let at = chrono::DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    support
        .update_submission_status(older, "resolved", "jwt", Some("agent@x.io"), Some(at), &cancel())
        .await
        .unwrap();

    let row: Value = api
        .rows("customer_submissions")
        .into_iter()
        .find(|r| r["id"] == json!(older))
        .unwrap();
    assert_eq!(row["status"], json!("resolved"));
    assert_eq!(row["status_updated_by"], json!("agent@x.io"));
    assert_eq!(api.user_tokens(), vec!["jwt".to_string(), "jwt".to_string()]);
}
