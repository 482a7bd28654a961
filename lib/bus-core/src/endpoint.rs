//! Endpoint capability contract and registration

use async_trait::async_trait;
use bus_api::{Failure, Operation};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// A named handler for one resource type on the bus.
///
/// Implementations own their item type; the router decodes each
/// envelope's payload into `Item` before any handler runs, so handler
/// bodies never see raw JSON. Handlers are application code and report
/// failures as `anyhow::Error`; the router decides whether a failure is
/// acknowledged back to the sender or propagated to the transport.
///
/// The router gives no serialization guarantee across envelopes aimed
/// at the same endpoint; handlers needing one must lock internally.
#[async_trait]
pub trait BusEndpoint: Send + Sync + 'static {
    /// Payload item type carried by envelopes for this endpoint
    type Item: DeserializeOwned + Send;

    /// Startup hook, called once while the registry is built
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle added resources
    async fn insert(&self, items: Vec<Self::Item>) -> anyhow::Result<()>;

    /// Handle modified resources; delegates to `insert` by default
    async fn modify(&self, items: Vec<Self::Item>) -> anyhow::Result<()> {
        self.insert(items).await
    }

    /// Handle loaded (bulk-synced) resources; delegates to `insert` by default
    async fn load(&self, items: Vec<Self::Item>) -> anyhow::Result<()> {
        self.insert(items).await
    }

    /// Handle deleted resources
    async fn delete(&self, items: Vec<Self::Item>) -> anyhow::Result<()>;

    /// Acknowledgement arrived: the request with `id` succeeded on `source`
    async fn on_callback_success(&self, _id: &str, _source: &str) {}

    /// Acknowledgement arrived: the request with `id` failed on `source`
    async fn on_callback_failure(&self, _id: &str, _source: &str, _failure: &Failure) {}
}

/// Why a dispatch attempt did not complete normally. Payload decode
/// failures never reach the handler and must stay distinguishable from
/// handler failures, which may be acknowledged back to the sender.
#[derive(Debug)]
pub(crate) enum DispatchError {
    Decode(serde_json::Error),
    Handler(anyhow::Error),
}

/// Object-safe view of a registered endpoint. The typed adapter owns
/// the payload codec, so the registry never inspects item types.
#[async_trait]
pub(crate) trait ErasedEndpoint: Send + Sync {
    async fn init(&self) -> anyhow::Result<()>;
    async fn handle(&self, operation: Operation, items: Vec<Value>)
        -> std::result::Result<(), DispatchError>;
    async fn callback_success(&self, id: &str, source: &str);
    async fn callback_failure(&self, id: &str, source: &str, failure: &Failure);
}

struct TypedEndpoint<E>(E);

#[async_trait]
impl<E: BusEndpoint> ErasedEndpoint for TypedEndpoint<E> {
    async fn init(&self) -> anyhow::Result<()> {
        self.0.init().await
    }

    async fn handle(
        &self,
        operation: Operation,
        items: Vec<Value>,
    ) -> std::result::Result<(), DispatchError> {
        let items: Vec<E::Item> = serde_json::from_value(Value::Array(items))
            .map_err(DispatchError::Decode)?;

        let result = match operation {
            Operation::Modify => self.0.modify(items).await,
            Operation::Load => self.0.load(items).await,
            Operation::Delete => self.0.delete(items).await,
            // Add, plus unrecognized codes as a defensive default
            _ => self.0.insert(items).await,
        };
        result.map_err(DispatchError::Handler)
    }

    async fn callback_success(&self, id: &str, source: &str) {
        self.0.on_callback_success(id, source).await;
    }

    async fn callback_failure(&self, id: &str, source: &str, failure: &Failure) {
        self.0.on_callback_failure(id, source, failure).await;
    }
}

/// One endpoint's registration: identity, init ordering, and accept
/// filter, supplied to [`EndpointRegistry::build`](crate::EndpointRegistry::build)
/// at startup.
pub struct EndpointRegistration {
    pub(crate) endpoint_id: String,
    pub(crate) order: i32,
    pub(crate) accept_sources: Vec<String>,
    pub(crate) endpoint: Arc<dyn ErasedEndpoint>,
}

impl EndpointRegistration {
    /// Register `endpoint` under `endpoint_id` with default ordering
    /// and an empty (accept-all) source filter
    pub fn new<E: BusEndpoint>(endpoint_id: impl Into<String>, endpoint: E) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            order: 0,
            accept_sources: Vec::new(),
            endpoint: Arc::new(TypedEndpoint(endpoint)),
        }
    }

    /// Initialization order; lower orders are initialized first, ties
    /// preserve registration order
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Restrict this endpoint to envelopes from the given source nodes.
    /// An endpoint with no restriction accepts every source.
    pub fn accept<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept_sources = sources.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Order {
        sku: String,
    }

    type CallLog = Arc<Mutex<Vec<(String, Vec<String>)>>>;

    #[derive(Default)]
    struct RecordingEndpoint {
        calls: CallLog,
    }

    impl RecordingEndpoint {
        fn record(&self, method: &str, items: &[Order]) {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), items.iter().map(|o| o.sku.clone()).collect()));
        }
    }

    #[async_trait]
    impl BusEndpoint for RecordingEndpoint {
        type Item = Order;

        async fn insert(&self, items: Vec<Order>) -> anyhow::Result<()> {
            self.record("insert", &items);
            Ok(())
        }

        async fn delete(&self, items: Vec<Order>) -> anyhow::Result<()> {
            self.record("delete", &items);
            Ok(())
        }
    }

    fn erased() -> (Arc<dyn ErasedEndpoint>, CallLog) {
        let endpoint = RecordingEndpoint::default();
        let calls = endpoint.calls.clone();
        (EndpointRegistration::new("orders", endpoint).endpoint, calls)
    }

    fn order_json(sku: &str) -> Value {
        serde_json::json!({ "sku": sku })
    }

    #[tokio::test]
    async fn test_default_delegation_to_insert() {
        let (endpoint, calls) = erased();

        endpoint
            .handle(Operation::Modify, vec![order_json("A")])
            .await
            .unwrap();
        endpoint
            .handle(Operation::Load, vec![order_json("B")])
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("insert".to_string(), vec!["A".to_string()]),
                ("insert".to_string(), vec!["B".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_dispatches_to_delete() {
        let (endpoint, calls) = erased();
        endpoint
            .handle(Operation::Delete, vec![order_json("A")])
            .await
            .unwrap();
        assert_eq!(calls.lock().unwrap()[0].0, "delete");
    }

    #[tokio::test]
    async fn test_decode_failure_never_reaches_handler() {
        let (endpoint, calls) = erased();

        let result = endpoint
            .handle(Operation::Add, vec![serde_json::json!({ "sku": 42 })])
            .await;
        assert!(matches!(result, Err(DispatchError::Decode(_))));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_operation_dispatches_as_insert() {
        let (endpoint, calls) = erased();
        endpoint
            .handle(Operation::Other(42), vec![order_json("A")])
            .await
            .unwrap();
        assert_eq!(calls.lock().unwrap()[0].0, "insert");
    }

    #[test]
    fn test_registration_builder() {
        let registration = EndpointRegistration::new("orders", RecordingEndpoint::default())
            .order(5)
            .accept(["node-a", "node-b"]);
        assert_eq!(registration.endpoint_id, "orders");
        assert_eq!(registration.order, 5);
        assert_eq!(registration.accept_sources, vec!["node-a", "node-b"]);
    }
}
