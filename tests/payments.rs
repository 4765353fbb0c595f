mod common;

use actix_web::{App, http::StatusCode, test, web};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use uuid::Uuid;

use common::{TestContext, WEBHOOK_SECRET, decimal};
use teamdues::database::Store;
use teamdues::models::payment_record::PaymentStatus;
use teamdues::models::team::TeamRole;
use teamdues::routes::api::scoped_config;
use teamdues::services::webhook::sign_payload;

fn succeeded_event(event_id: &str, record_id: Uuid, amount_minor: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": format!("pi_{event_id}"),
                "amount": amount_minor,
                "currency": "usd",
                "status": "succeeded",
                "metadata": { "payment_record_id": record_id.to_string() }
            }
        }
    }))
    .unwrap()
}

fn signed(body: &[u8]) -> String {
    sign_payload(body, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap()
}

#[actix_web::test]
async fn partial_then_full_payment_settles_record() {
    let ctx = TestContext::new();
    let team_id = Uuid::new_v4();
    let coach = Uuid::new_v4();
    let parent = Uuid::new_v4();
    ctx.store.add_team_member(team_id, coach, TeamRole::Coach);
    ctx.store.add_team_member(team_id, parent, TeamRole::Parent);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    // Coach bills the team.
    let req = test::TestRequest::post()
        .uri("/api/payment-requests")
        .insert_header(ctx.bearer(coach))
        .set_json(json!({
            "teamId": team_id,
            "title": "Spring dues",
            "amount": "175.00",
            "dueDate": (Utc::now() + Duration::days(14)).to_rfc3339(),
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["recordCount"], 1);

    // Parent sees one pending record.
    let req = test::TestRequest::get()
        .uri("/api/payment-records")
        .insert_header(ctx.bearer(parent))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let record = &body["data"][0];
    let record_id: Uuid = serde_json::from_value(record["id"].clone()).unwrap();
    assert_eq!(record["status"], "pending");
    assert_eq!(record["displayStatus"], "pending");
    assert_eq!(decimal(&record["remainingBalance"]), dec!(175.00));

    // Intent for 100.00.
    let req = test::TestRequest::post()
        .uri("/api/payment-intents")
        .insert_header(ctx.bearer(parent))
        .set_json(json!({ "paymentRecordId": record_id, "amount": "100.00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["paymentIntentId"], "pi_test_1");
    assert_eq!(body["clientSecret"], "pi_test_1_secret_abc");
    assert_eq!(ctx.processor.created.lock().unwrap()[0].amount_minor, 10_000);

    // Processor confirms 100.00.
    let event = succeeded_event("evt_1", record_id, 10_000);
    let req = test::TestRequest::post()
        .uri("/api/webhooks/stripe")
        .insert_header(("stripe-signature", signed(&event)))
        .insert_header(("content-type", "application/json"))
        .set_payload(event)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "received": true }));

    let partial = ctx.store.record(record_id).unwrap();
    assert_eq!(partial.status, PaymentStatus::Partial);
    assert_eq!(partial.amount_paid, dec!(100.00));
    assert_eq!(partial.paid_at, None);

    // Remaining 75.00; more than that is refused.
    let req = test::TestRequest::post()
        .uri("/api/payment-intents")
        .insert_header(ctx.bearer(parent))
        .set_json(json!({ "paymentRecordId": record_id, "amount": "80.00" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let event = succeeded_event("evt_2", record_id, 7_500);
    let req = test::TestRequest::post()
        .uri("/api/webhooks/stripe")
        .insert_header(("stripe-signature", signed(&event)))
        .set_payload(event.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let paid = ctx.store.record(record_id).unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert_eq!(paid.amount_paid, dec!(175.00));
    let paid_at = paid.paid_at.expect("paid_at set on settlement");

    // Redelivery of the same event is a no-op.
    let req = test::TestRequest::post()
        .uri("/api/webhooks/stripe")
        .insert_header(("stripe-signature", signed(&event)))
        .set_payload(event)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let after = ctx.store.record(record_id).unwrap();
    assert_eq!(after.amount_paid, dec!(175.00));
    assert_eq!(after.paid_at, Some(paid_at));

    let received: Vec<_> = ctx
        .store
        .notifications_for(parent)
        .into_iter()
        .filter(|n| n.title == "Payment Received")
        .collect();
    assert_eq!(received.len(), 1);

    // Settled records drop out of the outstanding view.
    let req = test::TestRequest::get()
        .uri("/api/payment-records?outstanding=true")
        .insert_header(ctx.bearer(parent))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn webhook_rejects_bad_signatures() {
    let ctx = TestContext::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let event = succeeded_event("evt_forged", Uuid::new_v4(), 100);
    let forged = sign_payload(&event, "whsec_wrong", Utc::now().timestamp()).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/webhooks/stripe")
        .insert_header(("stripe-signature", forged))
        .set_payload(event.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let req = test::TestRequest::post()
        .uri("/api/webhooks/stripe")
        .set_payload(event)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_rejects_malformed_json_and_accepts_unknown_records() {
    let ctx = TestContext::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let garbage = b"{not json".to_vec();
    let req = test::TestRequest::post()
        .uri("/api/webhooks/stripe")
        .insert_header(("stripe-signature", signed(&garbage)))
        .set_payload(garbage)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let orphan = succeeded_event("evt_orphan", Uuid::new_v4(), 500);
    let req = test::TestRequest::post()
        .uri("/api/webhooks/stripe")
        .insert_header(("stripe-signature", signed(&orphan)))
        .set_payload(orphan)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(ctx.store.notification_count(), 0);
}

#[actix_web::test]
async fn intent_requires_identity_and_ownership() {
    let ctx = TestContext::new();
    let team_id = Uuid::new_v4();
    let coach = Uuid::new_v4();
    let parent = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    ctx.store.add_team_member(team_id, coach, TeamRole::Coach);
    ctx.store.add_team_member(team_id, parent, TeamRole::Parent);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/payment-requests")
        .insert_header(ctx.bearer(coach))
        .set_json(json!({
            "teamId": team_id,
            "title": "Tournament",
            "amount": "60.00",
            "dueDate": (Utc::now() + Duration::days(3)).to_rfc3339(),
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    let record_id = ctx.store.records_for_payer(parent).await.unwrap()[0].record.id;

    let body = json!({ "paymentRecordId": record_id, "amount": "10.00" });

    let req = test::TestRequest::post()
        .uri("/api/payment-intents")
        .set_json(body.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/payment-intents")
        .insert_header(("authorization", "Bearer not-a-jwt"))
        .set_json(body.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/payment-intents")
        .insert_header(ctx.bearer(stranger))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Payment record not found");

    let req = test::TestRequest::post()
        .uri("/api/payment-intents")
        .insert_header(ctx.bearer(parent))
        .set_json(json!({ "paymentRecordId": record_id }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    assert!(ctx.processor.created.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn parents_cannot_create_payment_requests() {
    let ctx = TestContext::new();
    let team_id = Uuid::new_v4();
    let parent = Uuid::new_v4();
    ctx.store.add_team_member(team_id, parent, TeamRole::Parent);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/payment-requests")
        .insert_header(ctx.bearer(parent))
        .set_json(json!({
            "teamId": team_id,
            "title": "Snacks",
            "amount": "5.00",
            "dueDate": Utc::now().to_rfc3339(),
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_json_uses_error_envelope() {
    let ctx = TestContext::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/payment-intents")
        .insert_header(ctx.bearer(Uuid::new_v4()))
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"paymentRecordId\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}
