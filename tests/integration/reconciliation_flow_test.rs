// Integration tests for QR issuance and gateway reconciliation

#[path = "../helpers/mod.rs"]
mod helpers;

use serde_json::json;

use cobranza::core::traits::LedgerStore;
use cobranza::core::AppError;
use cobranza::gateways::{GatewayTransactionStatus, QrRequest};
use cobranza::installments::InstallmentStatus;
use cobranza::payments::PaymentMethod;
use cobranza::receivables::ReceivableStatus;
use cobranza::reconciliation::{EventSource, GatewayEvent, WebhookPayload};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Build the event the webhook controller would hand to the reconciler
fn webhook_event(app: &helpers::TestApp, pedido_id: &str, estado: &str) -> GatewayEvent {
    let body = helpers::webhook_body(pedido_id, estado).to_string();
    let (payload, raw) = WebhookPayload::parse(body.as_bytes()).unwrap();
    payload.into_event(&app.clock, raw)
}

fn reconciler(app: &helpers::TestApp) -> &cobranza::reconciliation::Reconciler {
    app.services.webhook.reconciler()
}

#[tokio::test]
async fn test_issue_qr_for_sale_balance() {
    let app = helpers::test_app();
    helpers::open_receivable(&app, "V-200", dec!(300.00), 3).await;

    let transaction = helpers::issue_qr(&app, "V-200", None, None).await;

    assert_eq!(transaction.status, GatewayTransactionStatus::Pending);
    assert_eq!(transaction.amount, dec!(300.00));
    assert_eq!(transaction.external_transaction_id.as_deref(), Some("PF-1"));
    assert!(transaction.internal_transaction_id.starts_with("V-200-"));
    assert!(transaction.qr_image.is_some());
    assert!(transaction.payment_id.is_none());

    let requests = app.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, dec!(300.00));
    assert_eq!(requests[0].order_lines[0].product, "Venta V-200");

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert_eq!(stored.response_data.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_duplicate_completed_delivery_creates_one_payment() {
    let app = helpers::test_app();
    let created = helpers::open_receivable(&app, "V-201", dec!(300.00), 3).await;
    let transaction = helpers::issue_qr(&app, "V-201", None, Some(dec!(150.00))).await;

    let first = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "Completado"))
        .await
        .unwrap();
    assert!(!first.already_processed);
    assert_eq!(first.status, GatewayTransactionStatus::Completed);

    let payment = first.payment.expect("completed event creates a payment");
    assert_eq!(payment.method, PaymentMethod::Qr);
    assert_eq!(payment.amount, dec!(150.00));
    assert_eq!(payment.reference, "PF-1");
    assert_eq!(payment.recorded_by, "gateway");
    assert_eq!(
        payment.notes.as_deref(),
        Some("Pago procesado por PagoFácil QR - Método: QR Simple")
    );

    let second = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "Completado"))
        .await
        .unwrap();
    assert!(second.already_processed);
    assert!(second.payment.is_none());

    let payments = app.services.payments.list_for_sale("V-201").await.unwrap();
    assert_eq!(payments.len(), 1);

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert_eq!(stored.payment_id.as_deref(), Some(payment.id.as_str()));
    assert_eq!(stored.payment_method_name.as_deref(), Some("QR Simple"));
    assert!(stored.paid_at.is_some());

    let receivable = app.services.receivables.get(&created.receivable.id).await.unwrap();
    assert_eq!(receivable.paid_amount, dec!(150.00));
    assert_eq!(receivable.status, ReceivableStatus::Partial);
}

#[tokio::test]
async fn test_installment_qr_pays_that_installment() {
    let app = helpers::test_app();
    let created = helpers::open_receivable(&app, "V-202", dec!(300.00), 3).await;
    let third = created.installments[2].id.clone();

    let transaction = helpers::issue_qr(&app, "V-202", Some(&third), None).await;
    assert_eq!(transaction.amount, dec!(100.00));
    assert_eq!(transaction.installment_id.as_deref(), Some(third.as_str()));
    assert!(transaction.internal_transaction_id.starts_with("CUOTA-"));
    assert_eq!(
        app.gateway.requests()[0].order_lines[0].product,
        "Cuota #3 - Venta V-202"
    );

    reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "exitoso"))
        .await
        .unwrap();

    let installments = app
        .services
        .installments
        .list(&created.receivable.id)
        .await
        .unwrap();
    assert_eq!(installments[0].status, InstallmentStatus::Pending);
    assert_eq!(installments[1].status, InstallmentStatus::Pending);
    assert_eq!(installments[2].status, InstallmentStatus::Paid);

    let again = app
        .services
        .qr
        .request_qr(QrRequest {
            sale_ref: "V-202".to_string(),
            installment_id: Some(third),
            amount: None,
            payment_method_id: 4,
            customer: helpers::customer(),
        })
        .await;
    assert!(matches!(again, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_failed_completion_is_recorded_and_redelivery_succeeds() {
    let app = helpers::test_app();
    helpers::open_receivable(&app, "V-203", dec!(100.00), 2).await;
    let transaction = helpers::issue_qr(&app, "V-203", None, None).await;

    app.store
        .fail_next_commit(AppError::internal("connection reset"))
        .await;

    let result = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "Completado"))
        .await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert_eq!(stored.status, GatewayTransactionStatus::Pending);
    assert!(stored.payment_id.is_none());
    assert!(stored.error_message.as_deref().unwrap().contains("connection reset"));
    assert!(app.services.payments.list_for_sale("V-203").await.unwrap().is_empty());

    let retried = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "Completado"))
        .await
        .unwrap();
    assert!(retried.payment.is_some());

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert_eq!(stored.status, GatewayTransactionStatus::Completed);
    assert!(stored.error_message.is_none());
    assert_eq!(app.services.payments.list_for_sale("V-203").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_poll_reconciles_completed_status() {
    let app = helpers::test_app();
    let created = helpers::open_receivable(&app, "V-204", dec!(200.00), 2).await;
    let transaction = helpers::issue_qr(&app, "V-204", None, None).await;

    let pending = app.services.qr.check_status(&transaction.id).await.unwrap();
    assert_eq!(pending.status, GatewayTransactionStatus::Pending);
    assert!(pending.payment.is_none());

    app.gateway.set_status(
        &transaction.internal_transaction_id,
        2,
        Some("2025-03-10"),
        Some("20:00:00"),
    );

    let outcome = app.services.qr.check_status(&transaction.id).await.unwrap();
    assert_eq!(outcome.status, GatewayTransactionStatus::Completed);
    let payment = outcome.payment.unwrap();
    assert_eq!(payment.paid_at.to_rfc3339(), "2025-03-11T00:00:00+00:00");

    let receivable = app.services.receivables.get(&created.receivable.id).await.unwrap();
    assert_eq!(receivable.status, ReceivableStatus::Paid);

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    let sources: Vec<&str> = stored
        .response_data
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|entry| entry["source"].as_str())
        .collect();
    assert_eq!(sources, vec!["qr_request", "poll", "poll"]);
}

#[tokio::test]
async fn test_gateway_failure_persists_nothing() {
    let app = helpers::test_app();
    helpers::open_receivable(&app, "V-205", dec!(100.00), 1).await;
    app.gateway.fail_next_qr("service unavailable");

    let result = app
        .services
        .qr
        .request_qr(QrRequest {
            sale_ref: "V-205".to_string(),
            installment_id: None,
            amount: None,
            payment_method_id: 4,
            customer: helpers::customer(),
        })
        .await;

    assert!(matches!(result, Err(AppError::ExternalGateway(_))));
    assert!(app.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_qr_amount_above_outstanding_is_rejected_before_gateway() {
    let app = helpers::test_app();
    helpers::open_receivable(&app, "V-206", dec!(100.00), 1).await;

    let result = app
        .services
        .qr
        .request_qr(QrRequest {
            sale_ref: "V-206".to_string(),
            installment_id: None,
            amount: Some(dec!(100.01)),
            payment_method_id: 4,
            customer: helpers::customer(),
        })
        .await;

    assert!(matches!(result, Err(AppError::InvalidPaymentAmount(_))));
    assert!(app.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_cancel_only_pending_transactions() {
    let app = helpers::test_app();
    helpers::open_receivable(&app, "V-207", dec!(100.00), 1).await;
    let transaction = helpers::issue_qr(&app, "V-207", None, None).await;

    let cancelled = app.services.qr.cancel(&transaction.id).await.unwrap();
    assert_eq!(cancelled.status, GatewayTransactionStatus::Cancelled);

    let again = app.services.qr.cancel(&transaction.id).await;
    assert!(matches!(again, Err(AppError::Validation(_))));

    // A late completion on a cancelled QR is audited but not applied
    let outcome = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "Completado"))
        .await
        .unwrap();
    assert_eq!(outcome.status, GatewayTransactionStatus::Cancelled);
    assert!(outcome.payment.is_none());
    assert!(app.services.payments.list_for_sale("V-207").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_then_completed_is_audit_only() {
    let app = helpers::test_app();
    helpers::open_receivable(&app, "V-208", dec!(100.00), 1).await;
    let transaction = helpers::issue_qr(&app, "V-208", None, None).await;

    let expired = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "QR Expirado"))
        .await
        .unwrap();
    assert_eq!(expired.status, GatewayTransactionStatus::Expired);

    let late = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "Completado"))
        .await
        .unwrap();
    assert_eq!(late.status, GatewayTransactionStatus::Expired);
    assert!(late.payment.is_none());

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert_eq!(stored.response_data.as_array().map(Vec::len), Some(3));
    assert!(app.services.payments.list_for_sale("V-208").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cash_sale_gets_payment_only() {
    let app = helpers::test_app();

    let missing_amount = app
        .services
        .qr
        .request_qr(QrRequest {
            sale_ref: "V-CASH".to_string(),
            installment_id: None,
            amount: None,
            payment_method_id: 4,
            customer: helpers::customer(),
        })
        .await;
    assert!(matches!(missing_amount, Err(AppError::InvalidPaymentAmount(_))));

    let transaction = helpers::issue_qr(&app, "V-CASH", None, Some(dec!(45.50))).await;
    let outcome = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "Completado"))
        .await
        .unwrap();

    let payment = outcome.payment.unwrap();
    assert_eq!(payment.amount, dec!(45.50));
    assert!(app.store.find_receivable_by_sale("V-CASH").await.unwrap().is_none());
    assert!(app.store.allocations().await.is_empty());
}

#[tokio::test]
async fn test_unknown_transaction_is_not_found() {
    let app = helpers::test_app();

    let result = reconciler(&app)
        .reconcile(GatewayEvent {
            lookup_key: "V-404-1700000000".to_string(),
            status: GatewayTransactionStatus::Completed,
            occurred_at: None,
            method_name: None,
            source: EventSource::Webhook,
            raw: json!({ "PedidoID": "V-404-1700000000" }),
        })
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_deleting_qr_payment_keeps_transaction_completed() {
    let app = helpers::test_app();
    let created = helpers::open_receivable(&app, "V-209", dec!(100.00), 2).await;
    let transaction = helpers::issue_qr(&app, "V-209", None, Some(dec!(50.00))).await;

    let outcome = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "Completado"))
        .await
        .unwrap();
    let payment = outcome.payment.unwrap();

    app.services.payments.delete_payment(&payment.id).await.unwrap();

    let receivable = app.services.receivables.get(&created.receivable.id).await.unwrap();
    assert_eq!(receivable.paid_amount, Decimal::ZERO);

    // Redelivery must not bring the payment back
    let redelivered = reconciler(&app)
        .reconcile(webhook_event(&app, &transaction.internal_transaction_id, "Completado"))
        .await
        .unwrap();
    assert!(redelivered.already_processed);
    assert!(app.services.payments.list_for_sale("V-209").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_webhooks_and_polls_post_one_payment() {
    let app = helpers::test_app();
    let created = helpers::open_receivable(&app, "V-220", dec!(300.00), 3).await;
    let transaction = helpers::issue_qr(&app, "V-220", None, Some(dec!(200.00))).await;
    let internal_id = transaction.internal_transaction_id.clone();
    app.gateway
        .set_status(&internal_id, 2, Some("2025-03-10"), Some("10:00:00"));

    let mut handles = Vec::new();
    for i in 0..8 {
        if i % 2 == 0 {
            let reconciler = reconciler(&app).clone();
            let event = webhook_event(&app, &internal_id, "Completado");
            handles.push(tokio::spawn(async move { reconciler.reconcile(event).await }));
        } else {
            let qr = app.services.qr.clone();
            let transaction_id = transaction.id.clone();
            handles.push(tokio::spawn(async move { qr.check_status(&transaction_id).await }));
        }
    }

    let mut posted = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.status, GatewayTransactionStatus::Completed);
        match outcome.payment {
            Some(payment) => posted.push(payment),
            None => assert!(outcome.already_processed),
        }
    }
    assert_eq!(posted.len(), 1);

    let payments = app.services.payments.list_for_sale("V-220").await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].id, posted[0].id);

    let allocations: Vec<_> = app
        .store
        .allocations()
        .await
        .into_iter()
        .filter(|a| a.payment_id == posted[0].id)
        .collect();
    assert_eq!(allocations.len(), 2);
    assert_eq!(allocations.iter().map(|a| a.amount).sum::<Decimal>(), dec!(200.00));

    let receivable = app.services.receivables.get(&created.receivable.id).await.unwrap();
    assert_eq!(receivable.paid_amount, dec!(200.00));
    assert_eq!(receivable.outstanding_amount, dec!(100.00));

    let stored = app.services.qr.get(&transaction.id).await.unwrap();
    assert_eq!(stored.payment_id.as_deref(), Some(posted[0].id.as_str()));
}
