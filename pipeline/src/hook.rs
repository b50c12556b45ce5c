use bytes::Bytes;
use std::sync::Arc;

pub type SharedHook = Arc<dyn Hook>;

/// Subscriber notified with the rendered bytes of every record it is registered for
pub trait Hook: Send + Sync {
    /// unique per level in the registry, registering the same name again replaces the hook
    fn name(&self) -> &str;
    fn publish(&self, bytes: &Bytes);
}

/// for tests where the data can be dropped
pub struct NullHook {}

impl Hook for NullHook {
    fn name(&self) -> &str {
        "null"
    }

    fn publish(&self, _bytes: &Bytes) {}
}
