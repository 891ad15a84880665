//! Registration of every domain unit.

use crate::catalog::{self, EngineAssets, RecipeStore};
use crate::error::Result;
use crate::events::EventPublisher;
use crate::inference::{self, InferenceProvider};
use crate::model::{self, ModelProvider, ModelStore};
use crate::registry::Registry;
use crate::service::{self, ServiceProvider, ServiceStore};
use std::sync::Arc;
use tracing::debug;

/// Everything the units are built from.
pub(crate) struct Wiring {
    pub models: Arc<dyn ModelStore>,
    pub recipes: Arc<dyn RecipeStore>,
    pub services: Arc<dyn ServiceStore>,
    pub model_provider: Option<Arc<dyn ModelProvider>>,
    pub inference_provider: Option<Arc<dyn InferenceProvider>>,
    pub service_provider: Option<Arc<dyn ServiceProvider>>,
    pub engine_assets: EngineAssets,
    pub events: Arc<dyn EventPublisher>,
}

pub(crate) fn register_units(registry: &Registry, w: &Wiring) -> Result<()> {
    register_model(registry, w)?;
    register_catalog(registry, w)?;
    register_service(registry, w)?;
    register_inference(registry, w)?;

    let counts = registry.counts();
    debug!(
        "Registered {} commands, {} queries, {} resources, {} resource factories",
        counts.commands, counts.queries, counts.resources, counts.resource_factories
    );
    Ok(())
}

fn register_model(registry: &Registry, w: &Wiring) -> Result<()> {
    let store = &w.models;
    let provider = &w.model_provider;
    let events = &w.events;

    registry.register_command(Arc::new(
        model::CreateCommand::new(store.clone()).with_events(events.clone()),
    ))?;
    registry.register_command(Arc::new(
        model::DeleteCommand::new(store.clone())
            .with_provider(provider.clone())
            .with_events(events.clone()),
    ))?;
    registry.register_command(Arc::new(
        model::PullCommand::new(store.clone(), provider.clone()).with_events(events.clone()),
    ))?;
    registry.register_command(Arc::new(
        model::ImportCommand::new(store.clone(), provider.clone()).with_events(events.clone()),
    ))?;
    registry.register_command(Arc::new(
        model::VerifyCommand::new(store.clone(), provider.clone()).with_events(events.clone()),
    ))?;

    registry.register_query(Arc::new(model::GetQuery::new(store.clone())))?;
    registry.register_query(Arc::new(model::ListQuery::new(store.clone())))?;
    registry.register_query(Arc::new(model::SearchQuery::new(provider.clone())))?;
    registry.register_query(Arc::new(model::EstimateResourcesQuery::new(
        store.clone(),
        provider.clone(),
    )))?;

    registry.register_resource(Arc::new(model::CompatibilityResource::new()))?;
    registry.register_resource_factory(Arc::new(model::ModelResourceFactory::new(store.clone())))?;
    Ok(())
}

fn register_catalog(registry: &Registry, w: &Wiring) -> Result<()> {
    let store = &w.recipes;
    let events = &w.events;

    registry.register_command(Arc::new(
        catalog::CreateRecipeCommand::new(store.clone()).with_events(events.clone()),
    ))?;
    registry.register_command(Arc::new(
        catalog::ValidateRecipeCommand::new().with_assets(w.engine_assets.clone()),
    ))?;
    registry.register_command(Arc::new(
        catalog::ApplyRecipeCommand::new(store.clone()).with_events(events.clone()),
    ))?;

    registry.register_query(Arc::new(
        catalog::MatchQuery::new(store.clone()).with_events(events.clone()),
    ))?;
    registry.register_query(Arc::new(catalog::GetQuery::new(store.clone())))?;
    registry.register_query(Arc::new(catalog::ListQuery::new(store.clone())))?;
    registry.register_query(Arc::new(
        catalog::CheckStatusQuery::new(store.clone()).with_model_store(w.models.clone()),
    ))?;
    registry.register_query(Arc::new(catalog::EnginesQuery::new(w.engine_assets.clone())))?;

    registry.register_resource(Arc::new(catalog::RecipesResource::new(store.clone())))?;
    registry.register_resource_factory(Arc::new(catalog::RecipeResourceFactory::new(
        store.clone(),
    )))?;
    Ok(())
}

fn register_service(registry: &Registry, w: &Wiring) -> Result<()> {
    let store = &w.services;
    let provider = &w.service_provider;
    let events = &w.events;

    registry.register_command(Arc::new(
        service::CreateCommand::new(store.clone(), provider.clone())
            .with_model_store(w.models.clone())
            .with_events(events.clone()),
    ))?;
    registry.register_command(Arc::new(
        service::StartCommand::new(store.clone(), provider.clone()).with_events(events.clone()),
    ))?;
    registry.register_command(Arc::new(
        service::StopCommand::new(store.clone(), provider.clone()).with_events(events.clone()),
    ))?;
    registry.register_command(Arc::new(
        service::ScaleCommand::new(store.clone(), provider.clone()).with_events(events.clone()),
    ))?;
    registry.register_command(Arc::new(
        service::DeleteCommand::new(store.clone(), provider.clone()).with_events(events.clone()),
    ))?;

    registry.register_query(Arc::new(service::GetQuery::new(store.clone())))?;
    registry.register_query(Arc::new(service::ListQuery::new(store.clone())))?;

    registry.register_resource(Arc::new(service::ServicesResource::new(store.clone())))?;
    registry.register_resource_factory(Arc::new(service::ServiceResourceFactory::new(
        store.clone(),
    )))?;
    Ok(())
}

fn register_inference(registry: &Registry, w: &Wiring) -> Result<()> {
    let provider = &w.inference_provider;
    registry.register_command(Arc::new(inference::ChatCommand::new(provider.clone())))?;
    registry.register_command(Arc::new(inference::EmbedCommand::new(provider.clone())))?;
    registry.register_query(Arc::new(inference::ModelsQuery::new(provider.clone())))?;
    Ok(())
}
