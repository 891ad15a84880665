//! Process-wide catalogue of units.
//!
//! Writers register during bootstrap; the gateway and introspection endpoints
//! read. Lookups are hash-map hits. Resources are resolved by exact URI first,
//! then through the first factory whose pattern accepts the URI.

use crate::error::{AimaError, Result};
use crate::unit::{Command, Query, Resource, ResourceFactory, UnitInfo, UnitKind};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Default)]
struct Tables {
    commands: HashMap<String, Arc<dyn Command>>,
    queries: HashMap<String, Arc<dyn Query>>,
    resources: HashMap<String, Arc<dyn Resource>>,
    factories: Vec<Arc<dyn ResourceFactory>>,
}

/// Unit counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryCounts {
    pub commands: usize,
    pub queries: usize,
    pub resources: usize,
    pub resource_factories: usize,
}

/// Registry of commands, queries, resources and resource factories.
#[derive(Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        // Every write is a single insert, so a poisoned table is still consistent.
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================
    // Registration
    // ========================================

    pub fn register_command(&self, command: Arc<dyn Command>) -> Result<()> {
        let name = command.name().to_string();
        let mut tables = self.write();
        if tables.commands.contains_key(&name) {
            return Err(AimaError::UnitAlreadyExists { name });
        }
        debug!("Registered command {}", name);
        tables.commands.insert(name, command);
        Ok(())
    }

    pub fn register_query(&self, query: Arc<dyn Query>) -> Result<()> {
        let name = query.name().to_string();
        let mut tables = self.write();
        if tables.queries.contains_key(&name) {
            return Err(AimaError::UnitAlreadyExists { name });
        }
        debug!("Registered query {}", name);
        tables.queries.insert(name, query);
        Ok(())
    }

    pub fn register_resource(&self, resource: Arc<dyn Resource>) -> Result<()> {
        let uri = resource.uri();
        let mut tables = self.write();
        if tables.resources.contains_key(&uri) {
            return Err(AimaError::UnitAlreadyExists { name: uri });
        }
        debug!("Registered resource {}", uri);
        tables.resources.insert(uri, resource);
        Ok(())
    }

    pub fn register_resource_factory(&self, factory: Arc<dyn ResourceFactory>) -> Result<()> {
        let pattern = factory.pattern().to_string();
        let mut tables = self.write();
        if tables.factories.iter().any(|f| f.pattern() == pattern) {
            return Err(AimaError::UnitAlreadyExists { name: pattern });
        }
        debug!("Registered resource factory {}", pattern);
        tables.factories.push(factory);
        Ok(())
    }

    // ========================================
    // Lookup
    // ========================================

    pub fn get_command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.read().commands.get(name).cloned()
    }

    pub fn get_query(&self, name: &str) -> Option<Arc<dyn Query>> {
        self.read().queries.get(name).cloned()
    }

    /// Resolve a resource URI, manufacturing one through a factory if needed.
    ///
    /// Returns `None` when nothing matches; a factory that accepts the URI but
    /// fails to build it propagates its error.
    pub fn get_resource(&self, uri: &str) -> Result<Option<Arc<dyn Resource>>> {
        let factory = {
            let tables = self.read();
            if let Some(resource) = tables.resources.get(uri) {
                return Ok(Some(resource.clone()));
            }
            tables.factories.iter().find(|f| f.can_create(uri)).cloned()
        };

        match factory {
            Some(f) => f.create(uri).map(Some),
            None => Ok(None),
        }
    }

    // ========================================
    // Introspection
    // ========================================

    pub fn counts(&self) -> RegistryCounts {
        let tables = self.read();
        RegistryCounts {
            commands: tables.commands.len(),
            queries: tables.queries.len(),
            resources: tables.resources.len(),
            resource_factories: tables.factories.len(),
        }
    }

    /// Describe every command and query, sorted by name.
    pub fn describe_all(&self) -> Vec<UnitInfo> {
        let tables = self.read();
        let mut infos: Vec<UnitInfo> = tables
            .commands
            .values()
            .map(|c| UnitInfo::describe(UnitKind::Command, c.as_ref()))
            .chain(
                tables
                    .queries
                    .values()
                    .map(|q| UnitInfo::describe(UnitKind::Query, q.as_ref())),
            )
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name).then(a.kind.to_string().cmp(&b.kind.to_string())));
        infos
    }

    /// Describe one command or query by name (commands win on a clash).
    pub fn describe(&self, name: &str) -> Option<UnitInfo> {
        let tables = self.read();
        if let Some(c) = tables.commands.get(name) {
            return Some(UnitInfo::describe(UnitKind::Command, c.as_ref()));
        }
        tables
            .queries
            .get(name)
            .map(|q| UnitInfo::describe(UnitKind::Query, q.as_ref()))
    }

    /// Commands and queries of one domain, sorted by name.
    pub fn list_by_domain(&self, domain: &str) -> Vec<UnitInfo> {
        self.describe_all()
            .into_iter()
            .filter(|u| u.domain == domain)
            .collect()
    }

    /// Registered static resource URIs and factory patterns, sorted.
    pub fn resource_uris(&self) -> Vec<String> {
        let tables = self.read();
        let mut uris: Vec<String> = tables
            .resources
            .keys()
            .cloned()
            .chain(tables.factories.iter().map(|f| f.pattern().to_string()))
            .collect();
        uris.sort();
        uris
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::unit::{UnitContext, UnitDescriptor};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Echo {
        name: &'static str,
        domain: &'static str,
    }

    impl UnitDescriptor for Echo {
        fn name(&self) -> &str {
            self.name
        }
        fn domain(&self) -> &str {
            self.domain
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn input_schema(&self) -> Schema {
            Schema::object()
        }
        fn output_schema(&self) -> Schema {
            Schema::object()
        }
    }

    #[async_trait]
    impl Command for Echo {
        async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
            Ok(input)
        }
    }

    #[async_trait]
    impl Query for Echo {
        async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
            Ok(input)
        }
    }

    struct Thing(String);

    #[async_trait]
    impl Resource for Thing {
        fn uri(&self) -> String {
            self.0.clone()
        }
        fn domain(&self) -> &str {
            "thing"
        }
        fn schema(&self) -> Schema {
            Schema::object()
        }
        async fn get(&self, _ctx: &UnitContext) -> Result<Value> {
            Ok(json!({"uri": self.0}))
        }
    }

    struct ThingFactory;

    impl ResourceFactory for ThingFactory {
        fn pattern(&self) -> &str {
            "asms://thing/*"
        }
        fn can_create(&self, uri: &str) -> bool {
            uri.strip_prefix("asms://thing/").is_some_and(|id| !id.is_empty())
        }
        fn create(&self, uri: &str) -> Result<Arc<dyn Resource>> {
            Ok(Arc::new(Thing(uri.to_string())))
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        registry
            .register_command(Arc::new(Echo { name: "a.run", domain: "a" }))
            .unwrap();
        let err = registry
            .register_command(Arc::new(Echo { name: "a.run", domain: "a" }))
            .unwrap_err();
        assert_eq!(err.code(), "UNIT_ALREADY_EXISTS");

        // Same name in a different kind is allowed.
        registry
            .register_query(Arc::new(Echo { name: "a.run", domain: "a" }))
            .unwrap();
    }

    #[test]
    fn test_lookup_by_kind() {
        let registry = Registry::new();
        registry
            .register_query(Arc::new(Echo { name: "m.list", domain: "m" }))
            .unwrap();
        assert!(registry.get_query("m.list").is_some());
        assert!(registry.get_command("m.list").is_none());
    }

    #[test]
    fn test_list_by_domain_sorted() {
        let registry = Registry::new();
        for name in ["m.zeta", "m.alpha", "m.mid"] {
            registry
                .register_command(Arc::new(Echo { name, domain: "m" }))
                .unwrap();
        }
        registry
            .register_query(Arc::new(Echo { name: "c.get", domain: "c" }))
            .unwrap();

        let names: Vec<String> = registry
            .list_by_domain("m")
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["m.alpha", "m.mid", "m.zeta"]);
        assert_eq!(registry.counts().commands, 3);
        assert_eq!(registry.counts().queries, 1);
    }

    #[test]
    fn test_resource_resolution_prefers_static_then_factory() {
        let registry = Registry::new();
        registry
            .register_resource(Arc::new(Thing("asms://thing/fixed".into())))
            .unwrap();
        registry
            .register_resource_factory(Arc::new(ThingFactory))
            .unwrap();

        assert!(registry.get_resource("asms://thing/fixed").unwrap().is_some());
        let made = registry.get_resource("asms://thing/abc").unwrap().unwrap();
        assert_eq!(made.uri(), "asms://thing/abc");
        assert!(registry.get_resource("asms://other/x").unwrap().is_none());
        assert!(registry.get_resource("asms://thing/").unwrap().is_none());
        assert_eq!(
            registry.resource_uris(),
            vec!["asms://thing/*", "asms://thing/fixed"]
        );
    }
}
