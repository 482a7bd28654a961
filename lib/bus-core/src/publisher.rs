//! Outbound seam to the transport

use async_trait::async_trait;
use bus_api::Envelope;

/// Outbound side of the transport, called by the router to emit
/// callback envelopes.
///
/// Fire-and-forget from the router's perspective: `publish` is awaited
/// once per callback and never retried; delivery guarantees beyond the
/// hand-off belong to the transport.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, envelope: Envelope) -> anyhow::Result<()>;
}
