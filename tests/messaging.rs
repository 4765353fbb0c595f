mod common;

use actix_web::{App, http::StatusCode, test, web};
use serde_json::{Value, json};
use uuid::Uuid;

use common::{SERVICE_TOKEN, TestContext};
use teamdues::database::Store;
use teamdues::models::notification::NotificationType;
use teamdues::models::push_subscription::NewPushSubscription;
use teamdues::models::team::TeamRole;
use teamdues::routes::api::scoped_config;

async fn subscribe(ctx: &TestContext, user_id: Uuid, endpoint: &str) {
    ctx.store
        .upsert_push_subscription(NewPushSubscription {
            user_id,
            endpoint: endpoint.to_string(),
            p256dh_key: "BNcRd".to_string(),
            auth_key: "tBHI".to_string(),
        })
        .await
        .unwrap();
}

#[actix_web::test]
async fn blast_to_five_member_team_reaches_four() {
    let ctx = TestContext::new();
    let team_id = Uuid::new_v4();
    let coach = Uuid::new_v4();
    ctx.store.add_team_member(team_id, coach, TeamRole::Coach);
    subscribe(&ctx, coach, "https://push.example/coach").await;

    let mut others = Vec::new();
    for role in [TeamRole::Parent, TeamRole::Parent, TeamRole::Parent, TeamRole::Player] {
        let user_id = Uuid::new_v4();
        ctx.store.add_team_member(team_id, user_id, role);
        subscribe(&ctx, user_id, &format!("https://push.example/{user_id}")).await;
        others.push(user_id);
    }

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/blasts")
        .insert_header(ctx.bearer(coach))
        .set_json(json!({
            "teamId": team_id,
            "subject": "Rain delay",
            "message": "Practice starts at 7pm tonight",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["recipientCount"], 4);
    assert!(body["messageId"].is_string());

    assert_eq!(ctx.store.notification_count(), 4);
    assert!(ctx.store.notifications_for(coach).is_empty());
    for user_id in &others {
        let received = ctx.store.notifications_for(*user_id);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, NotificationType::BlastMessage);
    }
    assert_eq!(ctx.push.attempt_count(), 4);
}

#[actix_web::test]
async fn blast_needs_coach_role_and_fields() {
    let ctx = TestContext::new();
    let team_id = Uuid::new_v4();
    let player = Uuid::new_v4();
    ctx.store.add_team_member(team_id, player, TeamRole::Player);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/blasts")
        .insert_header(ctx.bearer(player))
        .set_json(json!({ "teamId": team_id, "subject": "Hi", "message": "Hello" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Only coaches can send blast messages");

    let req = test::TestRequest::post()
        .uri("/api/blasts")
        .insert_header(ctx.bearer(player))
        .set_json(json!({ "teamId": team_id, "subject": "Hi" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    assert!(ctx.store.blasts().is_empty());
}

#[actix_web::test]
async fn push_send_prunes_gone_endpoints() {
    let ctx = TestContext::new();
    let user_id = Uuid::new_v4();
    subscribe(&ctx, user_id, "https://push.example/live").await;
    subscribe(&ctx, user_id, "https://push.example/expired").await;
    ctx.push.answer("https://push.example/expired", 410);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/push/send")
        .insert_header(("authorization", format!("Bearer {SERVICE_TOKEN}")))
        .set_json(json!({
            "userId": user_id,
            "title": "Payment Received",
            "message": "Thanks!",
            "type": "payment_request",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "success": true, "sent": 1, "total": 2 }));

    assert_eq!(ctx.push.attempt_count(), 2);
    let remaining = ctx.store.push_subscriptions_for(user_id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].endpoint, "https://push.example/live");
}

#[actix_web::test]
async fn push_send_is_internal_only() {
    let ctx = TestContext::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let body = json!({ "userId": Uuid::new_v4(), "title": "t", "message": "m" });

    // A user token is not the service token.
    let req = test::TestRequest::post()
        .uri("/api/push/send")
        .insert_header(ctx.bearer(Uuid::new_v4()))
        .set_json(body.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/push/send")
        .set_json(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.push.attempt_count(), 0);
}

#[actix_web::test]
async fn subscriptions_upsert_on_endpoint_and_unsubscribe() {
    let ctx = TestContext::new();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let subscription = json!({
        "endpoint": "https://push.example/device",
        "keys": { "p256dh": "BNcRd", "auth": "tBHI" }
    });

    for user_id in [first, second] {
        let req = test::TestRequest::post()
            .uri("/api/push-subscriptions")
            .insert_header(ctx.bearer(user_id))
            .set_json(subscription.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    // Same browser endpoint now belongs to the second user only.
    assert_eq!(ctx.store.push_subscription_count(), 1);
    assert!(ctx.store.push_subscriptions_for(first).await.unwrap().is_empty());

    let req = test::TestRequest::delete()
        .uri("/api/push-subscriptions")
        .insert_header(ctx.bearer(second))
        .set_json(json!({ "endpoint": "https://push.example/device" }))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["removed"], true);
    assert_eq!(ctx.store.push_subscription_count(), 0);
}

#[actix_web::test]
async fn notifications_list_unread_and_mark_read() {
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

    let req = test::TestRequest::post()
        .uri("/api/blasts")
        .insert_header(ctx.bearer(coach))
        .set_json(json!({ "teamId": team_id, "subject": "Picture day", "message": "Wear jerseys" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/notifications")
        .insert_header(ctx.bearer(parent))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let unread = body["data"].as_array().unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0]["type"], "blast_message");
    let id = unread[0]["id"].as_str().unwrap().to_string();

    // Other users cannot mark it.
    let req = test::TestRequest::post()
        .uri(&format!("/api/notifications/{id}/read"))
        .insert_header(ctx.bearer(coach))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri(&format!("/api/notifications/{id}/read"))
        .insert_header(ctx.bearer(parent))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/notifications")
        .insert_header(ctx.bearer(parent))
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn health_check_needs_no_auth() {
    let ctx = TestContext::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .configure(scoped_config),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body, json!({ "status": "ok" }));
}
