pub mod reconciler;

pub use reconciler::{EventSource, GatewayEvent, ReconcileOutcome, Reconciler, GATEWAY_RECORDER};
