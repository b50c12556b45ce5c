//! Hook sending each rendered record to a tokio channel
use batchlog_pipeline::hook::Hook;
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;

pub struct ForwardingHook {
    name: String,
    sender: UnboundedSender<Bytes>,
}

impl ForwardingHook {
    pub fn new(name: impl Into<String>, sender: UnboundedSender<Bytes>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl Hook for ForwardingHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, bytes: &Bytes) {
        // nobody is listening anymore
        if self.sender.send(bytes.clone()).is_err() {
            tracing::trace!(hook = %self.name, "receiver dropped, record discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_forwards_and_ignores_closed_receiver() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let hook = ForwardingHook::new("audit", sender);
        assert_eq!(hook.name(), "audit");
        hook.publish(&Bytes::from_static(b"one"));
        assert_eq!(receiver.try_recv().unwrap(), Bytes::from_static(b"one"));

        drop(receiver);
        assert!(hook.is_closed());
        hook.publish(&Bytes::from_static(b"two"));
    }
}
