//! Bookkeeping-only service runtime.
//!
//! Tracks which services are "running" and hands each one a port on the
//! loopback host. No process or container is started.

use crate::config::ServiceConfig;
use crate::error::{AimaError, Result};
use crate::service::{generate_service_id, ModelService, ResourceClass, ServiceProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct Instance {
    replicas: u32,
    port: u16,
}

pub struct LocalServiceProvider {
    host: String,
    next_port: AtomicU16,
    instances: RwLock<HashMap<String, Instance>>,
}

impl Default for LocalServiceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalServiceProvider {
    pub fn new() -> Self {
        Self::with_base_port(ServiceConfig::BASE_PORT)
    }

    pub fn with_base_port(base_port: u16) -> Self {
        Self {
            host: ServiceConfig::ENDPOINT_HOST.to_string(),
            next_port: AtomicU16::new(base_port),
            instances: RwLock::new(HashMap::new()),
        }
    }

    fn allocate_port(&self) -> Result<u16> {
        let port = self.next_port.fetch_add(1, Ordering::SeqCst);
        if port == u16::MAX {
            return Err(AimaError::internal("no free service ports left"));
        }
        Ok(port)
    }

    /// Replica count of a running service.
    pub async fn replicas(&self, service_id: &str) -> Option<u32> {
        self.instances
            .read()
            .await
            .get(service_id)
            .map(|i| i.replicas)
    }
}

#[async_trait]
impl ServiceProvider for LocalServiceProvider {
    async fn create(
        &self,
        model_id: &str,
        resource_class: ResourceClass,
        replicas: u32,
    ) -> Result<ModelService> {
        Ok(ModelService::new(
            generate_service_id(),
            model_id,
            resource_class,
            replicas,
        ))
    }

    async fn start(&self, service: &ModelService) -> Result<Option<String>> {
        let mut instances = self.instances.write().await;
        let port = match instances.get(&service.id) {
            Some(existing) => existing.port,
            None => self.allocate_port()?,
        };
        instances.insert(
            service.id.clone(),
            Instance {
                replicas: service.replicas,
                port,
            },
        );
        debug!("Service {} listening on port {}", service.id, port);
        Ok(Some(format!("http://{}:{}", self.host, port)))
    }

    async fn stop(&self, service: &ModelService, _force: bool) -> Result<()> {
        self.instances.write().await.remove(&service.id);
        Ok(())
    }

    async fn scale(&self, service: &ModelService, replicas: u32) -> Result<()> {
        if let Some(instance) = self.instances.write().await.get_mut(&service.id) {
            instance.replicas = replicas;
        }
        Ok(())
    }

    async fn is_running(&self, service_id: &str) -> bool {
        self.instances.read().await.contains_key(service_id)
    }
}
