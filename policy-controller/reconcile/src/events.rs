use netpol_controller_core::PolicyKey;

/// Publishes events about NetworkPolicies.
///
/// Publishing is fire-and-forget: implementations must not block the caller and report their own
/// failures.
pub trait EventRecorder: Send + Sync {
    fn warn(&self, policy: &PolicyKey, reason: &'static str, note: String);
}

/// Discards all events.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRecorder;

impl EventRecorder for NoopRecorder {
    fn warn(&self, _: &PolicyKey, _: &'static str, _: String) {}
}
