mod common;

use assert_matches::assert_matches;
use common::{california_address, TestApp};
use futures::future::join_all;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use storefront_api::{
    entities::{
        commerce::{CheckoutSession, CheckoutSessionStatus},
        Order,
    },
    errors::ServiceError,
    services::commerce::{
        inventory_gate, CompleteCheckoutInput, CreateCheckoutSessionInput,
    },
};
use uuid::Uuid;

const STORE: &str = "last-unit";

fn session_input() -> CreateCheckoutSessionInput {
    serde_json::from_value(json!({ "shipping_address": california_address() })).unwrap()
}

fn complete_input(session_id: Uuid) -> CompleteCheckoutInput {
    serde_json::from_value(json!({ "session_id": session_id, "payment": { "method": "card" } }))
        .unwrap()
}

#[tokio::test]
async fn two_buyers_one_unit_exactly_one_order() {
    let app = TestApp::new().await;
    let store = app.seed_store(STORE).await;
    let variant = app.seed_variant(&store, "RARE", dec!(99.00), 1).await;

    let checkout = &app.state.services.checkout;
    let mut sessions = Vec::new();
    for _ in 0..2 {
        let cart_id = app.cart_with(STORE, &[(variant.id, 1)]).await;
        let created = checkout
            .create_session(STORE, cart_id, session_input())
            .await
            .unwrap();
        sessions.push(created.session_id);
    }

    let (first, second) = tokio::join!(
        checkout.complete_session(STORE, complete_input(sessions[0])),
        checkout.complete_session(STORE, complete_input(sessions[1])),
    );

    let outcomes = [first, second];
    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = outcomes.into_iter().find_map(Result::err).unwrap();
    assert_matches!(loser, ServiceError::InsufficientStock { available: 0, .. });

    assert_eq!(app.stock_of(variant.id).await, 0);
    assert_eq!(Order::find().count(app.db()).await.unwrap(), 1);
    assert_eq!(app.provider.captures(), 1);

    let mut pending = 0;
    for id in sessions {
        let session = CheckoutSession::find_by_id(id)
            .one(app.db())
            .await
            .unwrap()
            .unwrap();
        if session.status == CheckoutSessionStatus::Pending {
            pending += 1;
        }
    }
    assert_eq!(pending, 1, "the losing session stays open for a restock");
}

#[tokio::test]
async fn guarded_decrement_never_goes_negative() {
    let app = TestApp::new().await;
    let store = app.seed_store(STORE).await;
    let variant = app.seed_variant(&store, "BATCH", dec!(5.00), 3).await;

    let attempts = (0..8).map(|_| inventory_gate::reserve(app.db(), variant.id, 1));
    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    for err in results.into_iter().filter_map(Result::err) {
        assert_matches!(err, ServiceError::InsufficientStock { requested: 1, available: 0, .. });
    }
    assert_eq!(app.stock_of(variant.id).await, 0);
}

#[tokio::test]
async fn reserve_rejects_non_positive_quantities() {
    let app = TestApp::new().await;
    let store = app.seed_store(STORE).await;
    let variant = app.seed_variant(&store, "ZERO", dec!(5.00), 3).await;

    let err = inventory_gate::reserve(app.db(), variant.id, 0)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(app.stock_of(variant.id).await, 3);
}

#[tokio::test]
async fn missing_variant_counts_as_out_of_stock() {
    let app = TestApp::new().await;
    let ghost = Uuid::new_v4();

    let err = inventory_gate::ensure_available(
        app.db(),
        &[inventory_gate::StockRequirement {
            variant_id: ghost,
            quantity: 1,
        }],
    )
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock { available: 0, .. });
    assert_eq!(inventory_gate::available(app.db(), ghost).await.unwrap(), None);
}
