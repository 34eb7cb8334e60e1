pub mod controllers;
pub mod models;
pub mod services;

pub use controllers::{configure, WebhookController};
pub use models::{AckEnvelope, WebhookPayload};
pub use services::{EventSource, GatewayEvent, ReconcileOutcome, Reconciler};
