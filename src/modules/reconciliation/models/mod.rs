pub mod webhook;

pub use webhook::{AckEnvelope, WebhookPayload};
