//! Demo bus node: two in-process nodes exchanging order envelopes
//! over a loopback channel standing in for the transport.

use anyhow::Result;
use async_trait::async_trait;
use bus_api::{Envelope, Failure, Operation};
use bus_core::{BusEndpoint, EndpointRegistration, EndpointRegistry, Publisher, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::init as tracing_init;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Order {
    sku: String,
}

/// In-memory order store backing the "orders" endpoint
struct OrdersEndpoint {
    node: String,
    store: Mutex<HashMap<String, Order>>,
}

impl OrdersEndpoint {
    fn new(node: &str) -> Self {
        Self {
            node: node.to_string(),
            store: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BusEndpoint for OrdersEndpoint {
    type Item = Order;

    async fn init(&self) -> Result<()> {
        info!("[{}] orders endpoint ready", self.node);
        Ok(())
    }

    async fn insert(&self, items: Vec<Order>) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        for order in items {
            info!("[{}] storing order {}", self.node, order.sku);
            store.insert(order.sku.clone(), order);
        }
        Ok(())
    }

    async fn delete(&self, items: Vec<Order>) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        for order in items {
            if store.remove(&order.sku).is_none() {
                anyhow::bail!("order {} not found", order.sku);
            }
            info!("[{}] removed order {}", self.node, order.sku);
        }
        Ok(())
    }

    async fn on_callback_success(&self, id: &str, source: &str) {
        info!("[{}] request {} acknowledged by {}", self.node, id, source);
    }

    async fn on_callback_failure(&self, id: &str, source: &str, failure: &Failure) {
        warn!(
            "[{}] request {} failed on {}: {}",
            self.node, id, source, failure.message
        );
    }
}

/// Loopback publisher: hands callback envelopes back to the channel
/// that feeds every node, the way a broker topic would.
struct LoopbackPublisher {
    tx: mpsc::Sender<Envelope>,
}

#[async_trait]
impl Publisher for LoopbackPublisher {
    async fn publish(&self, envelope: Envelope) -> Result<()> {
        self.tx.send(envelope).await?;
        Ok(())
    }
}

async fn build_node(node: &str, publisher: Arc<dyn Publisher>) -> Result<Router> {
    let registry = EndpointRegistry::build(vec![EndpointRegistration::new(
        "orders",
        OrdersEndpoint::new(node),
    )])
    .await?;
    Ok(Router::new(registry, publisher, node))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    info!("Starting demo bus nodes...");

    let (tx, mut rx) = mpsc::channel::<Envelope>(16);
    let publisher: Arc<dyn Publisher> = Arc::new(LoopbackPublisher { tx: tx.clone() });

    let routers = vec![
        build_node("node-a", publisher.clone()).await?,
        build_node("node-b", publisher.clone()).await?,
    ];

    // A broadcast add reaching both nodes, no acknowledgement
    tx.send(Envelope::request(
        "orders",
        Operation::Add,
        "node-b",
        vec![],
        &[Order { sku: "X".into() }],
    )?)
    .await?;

    // An acknowledged delete aimed at node-a; the sku is unknown there
    // so node-b gets an exception callback
    tx.send(Envelope::request(
        "orders",
        Operation::Delete,
        "node-b",
        vec!["node-a".to_string()],
        &[Order { sku: "missing".into() }],
    )?)
    .await?;

    // Fan each delivered envelope out to every node, as the transport
    // would; stop once the loopback has drained
    while let Ok(Some(envelope)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
    {
        for router in &routers {
            match router.route(envelope.clone()).await {
                Ok(outcome) => {
                    debug!("[{}] routed {}: {:?}", router.node_name(), envelope.id, outcome);
                }
                Err(e) => {
                    error!("[{}] routing error: {}", router.node_name(), e);
                }
            }
        }
    }

    info!("Loopback drained, shutting down");
    Ok(())
}
