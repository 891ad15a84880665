//! Service domain types.

use crate::ids::{generate_id, unix_now};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[default]
    Creating,
    Running,
    Stopped,
    Failed,
}

impl ServiceStatus {
    pub const ALL: [ServiceStatus; 4] = [
        ServiceStatus::Creating,
        ServiceStatus::Running,
        ServiceStatus::Stopped,
        ServiceStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Creating => "creating",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size class of a service's resource allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Small,
    #[default]
    Medium,
    Large,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 3] = [
        ResourceClass::Small,
        ResourceClass::Medium,
        ResourceClass::Large,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Small => "small",
            ResourceClass::Medium => "medium",
            ResourceClass::Large => "large",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }
}

/// A deployed model-serving service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelService {
    pub id: String,
    pub name: String,
    pub model_id: String,
    pub status: ServiceStatus,
    pub replicas: u32,
    pub resource_class: ResourceClass,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub active_replicas: u32,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ModelService {
    /// New `creating` record named `service-<id>`.
    pub fn new(
        id: impl Into<String>,
        model_id: impl Into<String>,
        resource_class: ResourceClass,
        replicas: u32,
    ) -> Self {
        let id = id.into();
        let now = unix_now();
        Self {
            name: format!("service-{}", id),
            id,
            model_id: model_id.into(),
            status: ServiceStatus::Creating,
            replicas,
            resource_class,
            endpoints: Vec::new(),
            active_replicas: 0,
            config: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = unix_now().max(self.created_at);
    }
}

pub fn generate_service_id() -> String {
    generate_id("svc")
}

/// Filter and pagination for service listings. `limit == 0` means unlimited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceFilter {
    pub status: Option<ServiceStatus>,
    pub model_id: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl ServiceFilter {
    pub fn matches(&self, service: &ModelService) -> bool {
        self.status.is_none_or(|s| service.status == s)
            && self
                .model_id
                .as_deref()
                .is_none_or(|m| service.model_id == m)
    }
}
