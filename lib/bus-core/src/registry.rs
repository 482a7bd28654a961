//! Endpoint registry built once at startup

use crate::endpoint::{EndpointRegistration, ErasedEndpoint};
use crate::{BusError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A registered endpoint together with its accept filter
pub(crate) struct RegistryEntry {
    pub(crate) endpoint: Arc<dyn ErasedEndpoint>,
    pub(crate) accept_sources: Vec<String>,
}

/// EndpointRegistry maps endpoint ids to their registered handlers.
///
/// Built once at process startup and immutable thereafter, so lookups
/// need no locking however concurrently the transport delivers.
pub struct EndpointRegistry {
    endpoints: HashMap<String, RegistryEntry>,
}

impl EndpointRegistry {
    /// Build the registry from the startup registration list.
    ///
    /// Registrations are initialized in ascending `order` (stable: ties
    /// keep registration order). A duplicate endpoint id or a failing
    /// `init` aborts the build; a partially initialized registry is
    /// never returned.
    pub async fn build(mut registrations: Vec<EndpointRegistration>) -> Result<Self> {
        registrations.sort_by_key(|registration| registration.order);

        let mut endpoints = HashMap::with_capacity(registrations.len());
        for registration in &registrations {
            if endpoints.contains_key(&registration.endpoint_id) {
                return Err(BusError::DuplicateEndpoint(registration.endpoint_id.clone()));
            }
            endpoints.insert(
                registration.endpoint_id.clone(),
                RegistryEntry {
                    endpoint: registration.endpoint.clone(),
                    accept_sources: registration.accept_sources.clone(),
                },
            );
        }

        for registration in &registrations {
            registration.endpoint.init().await.map_err(|cause| BusError::Init {
                endpoint_id: registration.endpoint_id.clone(),
                cause,
            })?;
            debug!("Initialized endpoint: {}", registration.endpoint_id);
        }

        Ok(Self { endpoints })
    }

    /// Look up an endpoint by id; absence is not an error by itself
    pub(crate) fn lookup(&self, endpoint_id: &str) -> Option<&RegistryEntry> {
        self.endpoints.get(endpoint_id)
    }

    /// Whether the endpoint accepts envelopes from `source`. An empty
    /// accept set means accept-all; an unknown endpoint accepts nothing.
    pub fn is_accepted(&self, endpoint_id: &str, source: &str) -> bool {
        match self.lookup(endpoint_id) {
            Some(entry) => {
                entry.accept_sources.is_empty()
                    || entry.accept_sources.iter().any(|accepted| accepted == source)
            }
            None => false,
        }
    }

    /// Whether an endpoint is registered under `endpoint_id`
    pub fn contains(&self, endpoint_id: &str) -> bool {
        self.endpoints.contains_key(endpoint_id)
    }

    /// Number of registered endpoints
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BusEndpoint;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type InitLog = Arc<Mutex<Vec<String>>>;

    struct LoggingEndpoint {
        name: String,
        init_log: InitLog,
        fail_init: bool,
    }

    impl LoggingEndpoint {
        fn new(name: &str, init_log: &InitLog) -> Self {
            Self {
                name: name.to_string(),
                init_log: init_log.clone(),
                fail_init: false,
            }
        }

        fn failing(name: &str, init_log: &InitLog) -> Self {
            Self {
                fail_init: true,
                ..Self::new(name, init_log)
            }
        }
    }

    #[async_trait]
    impl BusEndpoint for LoggingEndpoint {
        type Item = serde_json::Value;

        async fn init(&self) -> anyhow::Result<()> {
            self.init_log.lock().unwrap().push(self.name.clone());
            if self.fail_init {
                anyhow::bail!("init failed for {}", self.name);
            }
            Ok(())
        }

        async fn insert(&self, _items: Vec<serde_json::Value>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn delete(&self, _items: Vec<serde_json::Value>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_init_follows_order_ascending() {
        let log: InitLog = Arc::new(Mutex::new(Vec::new()));
        let registry = EndpointRegistry::build(vec![
            EndpointRegistration::new("late", LoggingEndpoint::new("late", &log)).order(10),
            EndpointRegistration::new("early", LoggingEndpoint::new("early", &log)).order(-5),
            EndpointRegistration::new("middle", LoggingEndpoint::new("middle", &log)),
        ])
        .await
        .unwrap();

        assert_eq!(registry.endpoint_count(), 3);
        assert_eq!(*log.lock().unwrap(), vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn test_order_ties_keep_registration_order() {
        let log: InitLog = Arc::new(Mutex::new(Vec::new()));
        EndpointRegistry::build(vec![
            EndpointRegistration::new("first", LoggingEndpoint::new("first", &log)),
            EndpointRegistration::new("second", LoggingEndpoint::new("second", &log)),
            EndpointRegistration::new("third", LoggingEndpoint::new("third", &log)),
        ])
        .await
        .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_fatal() {
        let log: InitLog = Arc::new(Mutex::new(Vec::new()));
        let result = EndpointRegistry::build(vec![
            EndpointRegistration::new("orders", LoggingEndpoint::new("a", &log)),
            EndpointRegistration::new("orders", LoggingEndpoint::new("b", &log)),
        ])
        .await;

        assert!(matches!(result, Err(BusError::DuplicateEndpoint(id)) if id == "orders"));
        // Duplicate detection runs before any init
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_failure_is_fatal() {
        let log: InitLog = Arc::new(Mutex::new(Vec::new()));
        let result = EndpointRegistry::build(vec![EndpointRegistration::new(
            "orders",
            LoggingEndpoint::failing("orders", &log),
        )])
        .await;

        assert!(matches!(result, Err(BusError::Init { endpoint_id, .. }) if endpoint_id == "orders"));
    }

    #[tokio::test]
    async fn test_accept_filter() {
        let log: InitLog = Arc::new(Mutex::new(Vec::new()));
        let registry = EndpointRegistry::build(vec![
            EndpointRegistration::new("open", LoggingEndpoint::new("open", &log)),
            EndpointRegistration::new("picky", LoggingEndpoint::new("picky", &log))
                .accept(["node-a"]),
        ])
        .await
        .unwrap();

        assert!(registry.is_accepted("open", "anyone"));
        assert!(registry.is_accepted("picky", "node-a"));
        assert!(!registry.is_accepted("picky", "node-b"));
        assert!(!registry.is_accepted("missing", "node-a"));
    }

    #[tokio::test]
    async fn test_contains_and_lookup() {
        let log: InitLog = Arc::new(Mutex::new(Vec::new()));
        let registry = EndpointRegistry::build(vec![EndpointRegistration::new(
            "orders",
            LoggingEndpoint::new("orders", &log),
        )])
        .await
        .unwrap();

        assert!(registry.contains("orders"));
        assert!(!registry.contains("missing"));
        assert!(registry.lookup("orders").is_some());
        assert!(registry.lookup("missing").is_none());
    }
}
