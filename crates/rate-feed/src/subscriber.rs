//! Rate subscribers

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use jewar_core::RateTable;

/// Something that wants every published rate table.
///
/// Every subscriber notified for a cycle receives the same `Arc`. Errors are
/// logged by the service and never stop delivery to other subscribers.
pub trait RateSubscriber: Send + Sync {
    fn receive(&self, rates: Arc<RateTable>) -> anyhow::Result<()>;
}

impl<F> RateSubscriber for F
where
    F: Fn(Arc<RateTable>) -> anyhow::Result<()> + Send + Sync,
{
    fn receive(&self, rates: Arc<RateTable>) -> anyhow::Result<()> {
        self(rates)
    }
}

/// Forwards tables into a bounded channel
pub struct ChannelSubscriber {
    tx: mpsc::Sender<Arc<RateTable>>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::Sender<Arc<RateTable>>) -> Self {
        Self { tx }
    }
}

impl RateSubscriber for ChannelSubscriber {
    fn receive(&self, rates: Arc<RateTable>) -> anyhow::Result<()> {
        self.tx
            .try_send(rates)
            .map_err(|e| anyhow::anyhow!("channel subscriber rejected update: {}", e))
    }
}

/// Handle identifying a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}
