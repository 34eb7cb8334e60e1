// Contract tests for the PagoFácil notification endpoint
//
// The gateway only understands its fixed acknowledgment envelope:
// { "error": 0|1, "status": 1|0, "message": "...", "values": true|false }

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::{http::StatusCode, test, App};
use cobranza::core::AppError;
use cobranza::gateways::GatewayTransactionStatus;
use cobranza::payments::PaymentMethod;
use cobranza::reconciliation::models::webhook::{
    MSG_ALREADY_PROCESSED, MSG_FAILED, MSG_INVALID_PAYLOAD, MSG_NOT_FOUND, MSG_PROCESSED,
};
use cobranza::receivables::ReceivableStatus;
use rust_decimal_macros::dec;
use serde_json::Value;

const WEBHOOK_PATH: &str = "/api/pagofacil/webhook";

macro_rules! init_app {
    ($app:expr) => {
        test::init_service(App::new().configure(|cfg| cobranza::configure(cfg, &$app.services))).await
    };
}

fn assert_envelope(body: &Value, error: i64, message: &str) {
    assert_eq!(body["error"], error);
    assert_eq!(body["status"], 1 - error);
    assert_eq!(body["message"], message);
    assert_eq!(body["values"], error == 0);
}

#[actix_web::test]
async fn test_completed_notification_is_processed() {
    let app = helpers::test_app();
    let service = init_app!(app);
    let created = helpers::open_receivable(&app, "V-600", dec!(200.00), 2).await;
    let transaction = helpers::issue_qr(&app, "V-600", None, None).await;

    let req = test::TestRequest::post()
        .uri(WEBHOOK_PATH)
        .set_json(helpers::webhook_body(&transaction.internal_transaction_id, "Completado"))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_envelope(&body, 0, MSG_PROCESSED);

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert_eq!(stored.status, GatewayTransactionStatus::Completed);

    let payments = app.services.payments.list_for_sale("V-600").await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].method, PaymentMethod::Qr);

    let receivable = app.services.receivables.get(&created.receivable.id).await.unwrap();
    assert_eq!(receivable.status, ReceivableStatus::Paid);
}

#[actix_web::test]
async fn test_duplicate_notification_is_acknowledged_once() {
    let app = helpers::test_app();
    let service = init_app!(app);
    helpers::open_receivable(&app, "V-601", dec!(200.00), 2).await;
    let transaction = helpers::issue_qr(&app, "V-601", None, Some(dec!(80.00))).await;

    for expected in [MSG_PROCESSED, MSG_ALREADY_PROCESSED] {
        let req = test::TestRequest::post()
            .uri(WEBHOOK_PATH)
            .set_json(helpers::webhook_body(&transaction.internal_transaction_id, "Completado"))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_envelope(&body, 0, expected);
    }

    let payments = app.services.payments.list_for_sale("V-601").await.unwrap();
    assert_eq!(payments.len(), 1);
}

#[actix_web::test]
async fn test_lookup_by_external_id() {
    let app = helpers::test_app();
    let service = init_app!(app);
    helpers::open_receivable(&app, "V-602", dec!(100.00), 1).await;
    let transaction = helpers::issue_qr(&app, "V-602", None, None).await;
    let external_id = transaction.external_transaction_id.clone().unwrap();

    let req = test::TestRequest::post()
        .uri(WEBHOOK_PATH)
        .set_json(helpers::webhook_body(&external_id, "Pago exitoso"))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert!(stored.payment_id.is_some());
}

#[actix_web::test]
async fn test_unknown_pedido_is_not_found() {
    let app = helpers::test_app();
    let service = init_app!(app);

    let req = test::TestRequest::post()
        .uri(WEBHOOK_PATH)
        .set_json(helpers::webhook_body("V-404-1700000000", "Completado"))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_envelope(&body, 1, MSG_NOT_FOUND);
}

#[actix_web::test]
async fn test_malformed_payload_is_bad_request() {
    let app = helpers::test_app();
    let service = init_app!(app);

    for payload in [
        "not json at all".to_string(),
        r#"{"PedidoID":"V-1-1700000000","Estado":"Completado"}"#.to_string(),
        r#"{"PedidoID":"  ","Fecha":"2025-03-10","Hora":"10:00:00","MetodoPago":"QR","Estado":"Completado"}"#
            .to_string(),
    ] {
        let req = test::TestRequest::post()
            .uri(WEBHOOK_PATH)
            .insert_header(("content-type", "application/json"))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_envelope(&body, 1, MSG_INVALID_PAYLOAD);
    }
}

#[actix_web::test]
async fn test_processing_failure_is_server_error() {
    let app = helpers::test_app();
    let service = init_app!(app);
    helpers::open_receivable(&app, "V-603", dec!(100.00), 1).await;
    let transaction = helpers::issue_qr(&app, "V-603", None, None).await;

    app.store
        .fail_next_commit(AppError::internal("disk full"))
        .await;

    let req = test::TestRequest::post()
        .uri(WEBHOOK_PATH)
        .set_json(helpers::webhook_body(&transaction.internal_transaction_id, "Completado"))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = test::read_body_json(resp).await;
    assert_envelope(&body, 1, MSG_FAILED);
    // Internal details stay out of the acknowledgment
    assert!(!body.to_string().contains("disk full"));

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert_eq!(stored.status, GatewayTransactionStatus::Pending);
    assert!(stored.error_message.is_some());
}

#[actix_web::test]
async fn test_pending_notification_is_audit_only() {
    let app = helpers::test_app();
    let service = init_app!(app);
    helpers::open_receivable(&app, "V-604", dec!(100.00), 1).await;
    let transaction = helpers::issue_qr(&app, "V-604", None, None).await;

    let req = test::TestRequest::post()
        .uri(WEBHOOK_PATH)
        .set_json(helpers::webhook_body(&transaction.internal_transaction_id, "En proceso"))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert_eq!(stored.status, GatewayTransactionStatus::Pending);
    assert_eq!(stored.response_data.as_array().map(Vec::len), Some(2));
    assert!(app.services.payments.list_for_sale("V-604").await.unwrap().is_empty());
}
