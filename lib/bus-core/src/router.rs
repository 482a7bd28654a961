//! Router: dispatches delivered envelopes to registered endpoints

use crate::endpoint::DispatchError;
use crate::{BusError, EndpointRegistry, Publisher, Result};
use bus_api::{Envelope, Failure, Operation};
use std::mem;
use std::sync::Arc;
use tracing::{debug, warn};

/// What became of a routed envelope.
///
/// Discards are expected in a multi-consumer broadcast topology, so the
/// router reports them as outcomes rather than errors; the transport
/// adapter may count them but must not treat them as failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A handler (or callback hook) ran and no acknowledgement was due
    Handled,
    /// A handler ran and exactly one callback envelope was published
    Acknowledged,
    /// The envelope named recipients and this node is not among them
    NotTarget,
    /// No endpoint is registered under the envelope's endpoint id
    UnknownEndpoint,
    /// The endpoint's accept filter refused the envelope's source
    SourceRefused,
}

/// Router is the single entry point invoked once per delivered
/// envelope. It owns the registry and the outbound publisher and runs
/// synchronously on the delivering task; it introduces no queue or
/// worker pool of its own.
pub struct Router {
    registry: EndpointRegistry,
    publisher: Arc<dyn Publisher>,
    node_name: String,
}

impl Router {
    /// Create a router for the node named `node_name`
    pub fn new(
        registry: EndpointRegistry,
        publisher: Arc<dyn Publisher>,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            publisher,
            node_name: node_name.into(),
        }
    }

    /// The registry this router dispatches against
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// This node's name, used for the target filter
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Route one delivered envelope.
    ///
    /// Filtering happens before any endpoint code runs: envelopes not
    /// addressed to this node, addressed to an unknown endpoint, or from
    /// a refused source are discarded without error. When the request
    /// named its recipients the handler runs under a capture boundary
    /// and exactly one callback envelope is published, success or
    /// failure. Broadcast handler failures propagate to the caller; the
    /// transport's error channel owns them.
    pub async fn route(&self, mut envelope: Envelope) -> Result<RouteOutcome> {
        if !envelope.targets.is_empty()
            && !envelope.targets.iter().any(|target| target == &self.node_name)
        {
            debug!(
                id = %envelope.id,
                targets = ?envelope.targets,
                "Envelope not addressed to this node, discarding"
            );
            return Ok(RouteOutcome::NotTarget);
        }

        if envelope.is_callback() {
            return self.route_callback(&envelope).await;
        }

        let Some(entry) = self.registry.lookup(&envelope.endpoint_id) else {
            debug!(
                id = %envelope.id,
                endpoint_id = %envelope.endpoint_id,
                "Unknown endpoint, discarding"
            );
            return Ok(RouteOutcome::UnknownEndpoint);
        };

        if !self.registry.is_accepted(&envelope.endpoint_id, &envelope.source) {
            debug!(
                id = %envelope.id,
                endpoint_id = %envelope.endpoint_id,
                source = %envelope.source,
                "Source refused by endpoint accept filter, discarding"
            );
            return Ok(RouteOutcome::SourceRefused);
        }

        let wants_ack = envelope.wants_ack();
        let items = mem::take(&mut envelope.data);
        let result = entry.endpoint.handle(envelope.operation, items).await;

        match result {
            Err(DispatchError::Decode(cause)) => {
                // A routing failure, not a handler failure: the payload
                // never reached the endpoint and is never acknowledged
                Err(BusError::Payload {
                    endpoint_id: envelope.endpoint_id,
                    cause,
                })
            }
            Err(DispatchError::Handler(cause)) if !wants_ack => Err(BusError::Handler {
                endpoint_id: envelope.endpoint_id,
                cause,
            }),
            Err(DispatchError::Handler(cause)) => {
                warn!(
                    id = %envelope.id,
                    endpoint_id = %envelope.endpoint_id,
                    error = %cause,
                    "Handler failed, acknowledging with exception callback"
                );
                let callback = Envelope::callback_failure(
                    &envelope,
                    &self.node_name,
                    Failure::from_error(&cause),
                );
                self.publish(callback).await?;
                Ok(RouteOutcome::Acknowledged)
            }
            Ok(()) if wants_ack => {
                let callback = Envelope::callback_success(&envelope, &self.node_name);
                self.publish(callback).await?;
                Ok(RouteOutcome::Acknowledged)
            }
            Ok(()) => Ok(RouteOutcome::Handled),
        }
    }

    /// Callback correlation is endpoint-scoped: the callback carries the
    /// original endpoint id and is delivered to that endpoint's hooks.
    async fn route_callback(&self, envelope: &Envelope) -> Result<RouteOutcome> {
        let Some(entry) = self.registry.lookup(&envelope.endpoint_id) else {
            debug!(
                id = %envelope.id,
                endpoint_id = %envelope.endpoint_id,
                "Callback for unknown endpoint, discarding"
            );
            return Ok(RouteOutcome::UnknownEndpoint);
        };

        if envelope.operation == Operation::CallbackException {
            // A malformed exception callback still reports a failure,
            // just an unspecified one
            let failure = envelope.failure().unwrap_or_default();
            entry
                .endpoint
                .callback_failure(&envelope.id, &envelope.source, &failure)
                .await;
        } else {
            entry
                .endpoint
                .callback_success(&envelope.id, &envelope.source)
                .await;
        }
        Ok(RouteOutcome::Handled)
    }

    async fn publish(&self, callback: Envelope) -> Result<()> {
        debug!(
            id = %callback.id,
            operation = callback.operation.code(),
            targets = ?callback.targets,
            "Publishing callback envelope"
        );
        self.publisher
            .publish(callback)
            .await
            .map_err(BusError::Publish)
    }
}
