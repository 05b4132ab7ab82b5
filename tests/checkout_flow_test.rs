mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{california_address, response_json, CaptureScript, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
};
use serde_json::{json, Value};
use storefront_api::{
    entities::{
        commerce::{checkout_session, Cart, CartStatus, CheckoutSession, CheckoutSessionStatus},
        Order, OrderItem, Payment, PaymentStatus,
    },
    errors::ServiceError,
    services::{
        commerce::{CompleteCheckoutInput, CreateCheckoutSessionInput},
        payments::CaptureStatus,
    },
};
use uuid::Uuid;

const STORE: &str = "acme";

async fn create_session(app: &TestApp, cart_id: Uuid, body: Value) -> (StatusCode, Value) {
    let cart_header = cart_id.to_string();
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/checkout/sessions", STORE),
            Some(body),
            &[("x-cart-id", cart_header.as_str())],
        )
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn complete(app: &TestApp, session_id: &str) -> (StatusCode, Value) {
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/checkout/complete", STORE),
            Some(json!({ "session_id": session_id, "payment": { "method": "card" } })),
            &[],
        )
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

/// Rewrites the stored risk context so the session now scores 90:
/// high-risk country, disposable email and a bulk quantity.
async fn make_session_risky(app: &TestApp, session_id: &str) {
    let id = Uuid::parse_str(session_id).unwrap();
    CheckoutSession::update_many()
        .col_expr(checkout_session::Column::Country, Expr::value("NG"))
        .col_expr(
            checkout_session::Column::CustomerEmail,
            Expr::value("buyer@mailinator.com"),
        )
        .col_expr(checkout_session::Column::ItemCount, Expr::value(20))
        .filter(checkout_session::Column::Id.eq(id))
        .exec(app.db())
        .await
        .unwrap();
}

async fn session_status(app: &TestApp, session_id: &str) -> CheckoutSessionStatus {
    let id = Uuid::parse_str(session_id).unwrap();
    CheckoutSession::find_by_id(id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap()
        .status
}

/// Two units at 50.00 shipped to California
async fn priced_session(app: &TestApp) -> (Uuid, Uuid, String) {
    let store = app.seed_store(STORE).await;
    let variant = app.seed_variant(&store, "TEE-M", dec!(50.00), 5).await;
    let cart_id = app.cart_with(STORE, &[(variant.id, 2)]).await;

    let (status, body) = create_session(
        app,
        cart_id,
        json!({ "customer_email": "buyer@example.com", "shipping_address": california_address() }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let session_id = body["session_id"].as_str().unwrap().to_string();
    (variant.id, cart_id, session_id)
}

#[tokio::test]
async fn session_prices_subtotal_tax_and_shipping() {
    let app = TestApp::new().await;
    let store = app.seed_store(STORE).await;
    let variant = app.seed_variant(&store, "TEE-M", dec!(50.00), 5).await;
    let cart_id = app.cart_with(STORE, &[(variant.id, 2)]).await;

    let (status, body) = create_session(
        &app,
        cart_id,
        json!({ "shipping_address": california_address() }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["subtotal"], "100.00");
    assert_eq!(body["tax_amount"], "8.50");
    assert_eq!(body["shipping_amount"], "10.00");
    assert_eq!(body["total"], "118.50");
    assert_eq!(body["currency"], "USD");
    assert_eq!(body["risk_score"], 0);
    assert!(body["payment_intent_id"].as_str().unwrap().contains("_pi_"));
}

#[tokio::test]
async fn completion_materializes_order_and_decrements_stock() {
    let app = TestApp::new().await;
    let (variant_id, cart_id, session_id) = priced_session(&app).await;

    let (status, body) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let order_id = Uuid::parse_str(body["order_id"].as_str().unwrap()).unwrap();
    let order = Order::find_by_id(order_id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.total, dec!(118.50));
    assert_eq!(OrderItem::find().count(app.db()).await.unwrap(), 1);

    let payment = Payment::find().one(app.db()).await.unwrap().unwrap();
    assert_eq!(payment.order_id, order_id);
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert_eq!(payment.amount, dec!(118.50));

    assert_eq!(app.stock_of(variant_id).await, 3);
    let cart = Cart::find_by_id(cart_id).one(app.db()).await.unwrap().unwrap();
    assert_eq!(cart.status, CartStatus::Converted);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Completed
    );
    assert_eq!(app.provider.captures(), 1);
}

#[tokio::test]
async fn empty_cart_cannot_open_a_session() {
    let app = TestApp::new().await;
    app.seed_store(STORE).await;
    let cart_id = app.cart_with(STORE, &[]).await;

    let (status, body) = create_session(
        &app,
        cart_id,
        json!({ "shipping_address": california_address() }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["category"], "validation");
    assert_eq!(CheckoutSession::find().count(app.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn missing_cart_header_is_rejected() {
    let app = TestApp::new().await;
    app.seed_store(STORE).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/checkout/sessions", STORE),
            Some(json!({ "shipping_address": california_address() })),
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn risky_cart_is_blocked_before_any_intent() {
    let app = TestApp::new().await;
    let store = app.seed_store(STORE).await;
    let variant = app.seed_variant(&store, "WATCH", dec!(600.00), 5).await;
    let cart_id = app.cart_with(STORE, &[(variant.id, 2)]).await;

    let (status, body) = create_session(
        &app,
        cart_id,
        json!({
            "shipping_address": {
                "line1": "12 Broad St",
                "city": "Lagos",
                "postal_code": "100001",
                "country": "NG"
            }
        }),
    )
    .await;

    // 30 + 20 for value, 25 for destination
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["details"]["risk_score"], 75);
    assert_eq!(CheckoutSession::find().count(app.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn stock_shortfall_at_session_creation_is_a_conflict() {
    let app = TestApp::new().await;
    let store = app.seed_store(STORE).await;
    let variant = app.seed_variant(&store, "MUG", dec!(12.00), 3).await;
    let cart_id = app.cart_with(STORE, &[(variant.id, 3)]).await;
    app.set_stock(variant.id, 1).await;

    let (status, body) = create_session(
        &app,
        cart_id,
        json!({ "shipping_address": california_address() }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["available"], 1);
    assert_eq!(body["details"]["requested"], 3);
}

#[tokio::test]
async fn second_completion_is_a_conflict() {
    let app = TestApp::new().await;
    let (variant_id, _, session_id) = priced_session(&app).await;

    let (first, _) = complete(&app, &session_id).await;
    assert_eq!(first, StatusCode::CREATED);

    let (second, body) = complete(&app, &session_id).await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["category"], "conflict");

    assert_eq!(Order::find().count(app.db()).await.unwrap(), 1);
    assert_eq!(app.stock_of(variant_id).await, 3);
    assert_eq!(app.provider.captures(), 1);
}

#[tokio::test]
async fn declined_capture_rolls_everything_back() {
    let app = TestApp::new().await;
    let (variant_id, cart_id, session_id) = priced_session(&app).await;
    app.provider
        .script_capture(CaptureScript::Status(CaptureStatus::Failed));

    let (status, _) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    assert_eq!(Order::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(OrderItem::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(Payment::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(app.stock_of(variant_id).await, 5);
    let cart = Cart::find_by_id(cart_id).one(app.db()).await.unwrap().unwrap();
    assert_eq!(cart.status, CartStatus::Open);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Failed
    );
}

#[tokio::test]
async fn provider_error_fails_the_session() {
    let app = TestApp::new().await;
    let (variant_id, _, session_id) = priced_session(&app).await;
    app.provider.script_capture(CaptureScript::TransportError);

    let (status, body) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["message"], "Payment provider unavailable");

    assert_eq!(Order::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(app.stock_of(variant_id).await, 5);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Failed
    );
}

#[tokio::test]
async fn requires_action_keeps_the_session_open() {
    let app = TestApp::new().await;
    let (variant_id, _, session_id) = priced_session(&app).await;
    app.provider
        .script_capture(CaptureScript::Status(CaptureStatus::RequiresAction));

    let (status, _) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Pending
    );
    assert_eq!(app.stock_of(variant_id).await, 5);

    // The customer finishes the challenge and retries
    app.provider.script_capture(CaptureScript::Ledger);
    let (retry, _) = complete(&app, &session_id).await;
    assert_eq!(retry, StatusCode::CREATED);
    assert_eq!(app.stock_of(variant_id).await, 3);
}

#[tokio::test]
async fn capture_timeout_reports_unknown_outcome() {
    let app = TestApp::new().await;
    let (variant_id, _, session_id) = priced_session(&app).await;
    app.provider.script_capture(CaptureScript::Stall);

    let (status, body) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["category"], "payment");

    assert_eq!(Order::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(app.stock_of(variant_id).await, 5);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Failed
    );
}

#[tokio::test]
async fn stock_sold_elsewhere_keeps_session_pending() {
    let app = TestApp::new().await;
    let (variant_id, _, session_id) = priced_session(&app).await;
    app.set_stock(variant_id, 1).await;

    let (status, body) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["available"], 1);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Pending
    );
    assert_eq!(app.provider.captures(), 0);

    app.set_stock(variant_id, 4).await;
    let (retry, _) = complete(&app, &session_id).await;
    assert_eq!(retry, StatusCode::CREATED);
    assert_eq!(app.stock_of(variant_id).await, 2);
}

#[tokio::test]
async fn cart_edited_after_session_fails_completion() {
    let app = TestApp::new().await;
    let (variant_id, cart_id, session_id) = priced_session(&app).await;

    app.state
        .services
        .cart
        .add_item(
            STORE,
            cart_id,
            storefront_api::services::commerce::AddToCartInput {
                variant_id,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let (status, _) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Failed
    );
    assert_eq!(app.provider.captures(), 0);
    assert_eq!(app.stock_of(variant_id).await, 5);
}

#[tokio::test]
async fn intent_outage_leaves_no_session() {
    let app = TestApp::new().await;
    let store = app.seed_store(STORE).await;
    let variant = app.seed_variant(&store, "TEE-M", dec!(50.00), 5).await;
    let cart_id = app.cart_with(STORE, &[(variant.id, 1)]).await;
    app.provider.fail_intents(true);

    let err = app
        .state
        .services
        .checkout
        .create_session(
            STORE,
            cart_id,
            serde_json::from_value::<CreateCheckoutSessionInput>(
                json!({ "shipping_address": california_address() }),
            )
            .unwrap(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ExternalServiceError(_));
    assert_eq!(CheckoutSession::find().count(app.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn sessions_are_scoped_to_their_store() {
    let app = TestApp::new().await;
    let (_, _, session_id) = priced_session(&app).await;
    app.seed_store("other").await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stores/other/checkout/sessions/{}", session_id),
            None,
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let err = app
        .state
        .services
        .checkout
        .complete_session(
            "other",
            serde_json::from_value::<CompleteCheckoutInput>(
                json!({ "session_id": session_id, "payment": { "method": "pix" } }),
            )
            .unwrap(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn risk_rejection_at_completion_fails_the_session() {
    let app = TestApp::new().await;
    let (variant_id, _, session_id) = priced_session(&app).await;
    make_session_risky(&app, &session_id).await;

    let (status, body) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["category"], "forbidden");
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Failed
    );
    assert_eq!(app.provider.captures(), 0);
    assert_eq!(app.stock_of(variant_id).await, 5);

    // Terminal: a retry is refused rather than re-scored
    let (retry, _) = complete(&app, &session_id).await;
    assert_eq!(retry, StatusCode::CONFLICT);
    assert_eq!(Order::find().count(app.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn stock_shortfall_is_reported_before_risk() {
    let app = TestApp::new().await;
    let (variant_id, _, session_id) = priced_session(&app).await;
    make_session_risky(&app, &session_id).await;
    app.set_stock(variant_id, 1).await;

    let (status, body) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["available"], 1);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Pending
    );
}

#[tokio::test]
async fn concurrent_completions_yield_one_order() {
    let app = TestApp::new().await;
    let (variant_id, _, session_id) = priced_session(&app).await;

    let ((first, _), (second, _)) = tokio::join!(
        complete(&app, &session_id),
        complete(&app, &session_id)
    );

    let mut statuses = [first, second];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
    assert_eq!(Order::find().count(app.db()).await.unwrap(), 1);
    assert_eq!(Payment::find().count(app.db()).await.unwrap(), 1);
    assert_eq!(app.stock_of(variant_id).await, 3);
    assert_eq!(app.provider.captures(), 1);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Completed
    );
}

#[tokio::test]
async fn failed_payment_write_refunds_the_capture() {
    let app = TestApp::new().await;
    let (variant_id, cart_id, session_id) = priced_session(&app).await;
    app.db()
        .execute_unprepared(
            "CREATE TRIGGER reject_payments BEFORE INSERT ON payments \
             BEGIN SELECT RAISE(ABORT, 'payments unavailable'); END;",
        )
        .await
        .unwrap();

    let (status, body) = complete(&app, &session_id).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["category"], "server");

    assert_eq!(app.provider.captures(), 1);
    assert_eq!(app.provider.refunds(), 1, "capture is refunded");
    assert_eq!(Order::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(OrderItem::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(app.stock_of(variant_id).await, 5);
    let cart = Cart::find_by_id(cart_id).one(app.db()).await.unwrap().unwrap();
    assert_eq!(cart.status, CartStatus::Open);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Failed
    );
}

#[tokio::test]
async fn payment_token_stands_in_for_a_missing_intent() {
    let app = TestApp::new().await;
    let (_, _, session_id) = priced_session(&app).await;
    let id = Uuid::parse_str(&session_id).unwrap();
    CheckoutSession::update_many()
        .col_expr(
            checkout_session::Column::PaymentIntentId,
            Expr::value(Option::<String>::None),
        )
        .filter(checkout_session::Column::Id.eq(id))
        .exec(app.db())
        .await
        .unwrap();

    let (without_token, _) = complete(&app, &session_id).await;
    assert_eq!(without_token, StatusCode::BAD_REQUEST);
    assert_eq!(
        session_status(&app, &session_id).await,
        CheckoutSessionStatus::Failed
    );
}

#[tokio::test]
async fn payment_token_completes_a_session_without_intent() {
    let app = TestApp::new().await;
    let (_, _, session_id) = priced_session(&app).await;
    let id = Uuid::parse_str(&session_id).unwrap();
    let intent_id = CheckoutSession::find_by_id(id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap()
        .payment_intent_id
        .unwrap();
    CheckoutSession::update_many()
        .col_expr(
            checkout_session::Column::PaymentIntentId,
            Expr::value(Option::<String>::None),
        )
        .filter(checkout_session::Column::Id.eq(id))
        .exec(app.db())
        .await
        .unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/stores/{}/checkout/complete", STORE),
            Some(json!({
                "session_id": session_id,
                "payment": { "method": "card", "token": intent_id }
            })),
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let payment = Payment::find().one(app.db()).await.unwrap().unwrap();
    assert_eq!(payment.provider_transaction_id, intent_id);
}

#[tokio::test]
async fn stored_amounts_read_back_exactly() {
    let app = TestApp::new().await;
    let store = app.seed_store(STORE).await;
    let variant = app.seed_variant(&store, "MUG", dec!(19.99), 5).await;

    let order_id = app.place_order(STORE, &[(variant.id, 3)]).await;

    let item = OrderItem::find().one(app.db()).await.unwrap().unwrap();
    assert_eq!(item.unit_price, dec!(19.99));
    assert_eq!(item.total_price, dec!(59.97));

    let order = Order::find_by_id(order_id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.subtotal, dec!(59.97));
    assert_eq!(order.tax_amount, dec!(5.10));
    assert_eq!(order.total, dec!(75.07));

    let payment = Payment::find().one(app.db()).await.unwrap().unwrap();
    assert_eq!(payment.amount, dec!(75.07));
    assert_eq!(payment.refunded_amount, dec!(0));
}
