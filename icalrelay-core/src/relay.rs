//! Rendering profiles: load the base calendar, run the pipeline.

use std::sync::Arc;

use tracing::info;

use crate::config::ConfigStore;
use crate::document::CalendarDocument;
use crate::engine::{Engine, ErrorPolicy, Pipeline, PipelineReport};
use crate::error::RelayResult;
use crate::ics::generate_ics;
use crate::source::{Fetcher, Source};

/// A rendered profile and what its pipeline did.
#[derive(Debug)]
pub struct RenderedProfile {
    pub document: CalendarDocument,
    pub report: PipelineReport,
}

impl RenderedProfile {
    pub fn to_ics(&self) -> String {
        generate_ics(&self.document)
    }
}

pub struct Relay {
    store: Arc<ConfigStore>,
    engine: Engine,
}

impl Relay {
    pub fn new(store: Arc<ConfigStore>, engine: Engine) -> Self {
        Relay { store, engine }
    }

    /// A relay whose fetches use the configured `fetch_timeout`.
    pub async fn from_store(store: Arc<ConfigStore>) -> RelayResult<Self> {
        let timeout = store.read(|c| c.server.fetch_timeout()).await?;
        Ok(Relay::new(store, Engine::new(Fetcher::with_timeout(timeout))))
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Build the calendar a profile serves.
    ///
    /// The profile is read once at the start; later configuration changes
    /// do not affect a render in progress.
    pub async fn render_profile(
        &self,
        name: &str,
        policy: ErrorPolicy,
    ) -> RelayResult<RenderedProfile> {
        let profile = self.store.read(|c| c.profile(name).cloned()).await?;
        let source = Source::parse(&profile.source);

        if policy == ErrorPolicy::Abort {
            if let Err(errors) = Pipeline::validate(&profile.modules) {
                return Ok(RenderedProfile {
                    document: CalendarDocument::new(),
                    report: PipelineReport::rejected(errors),
                });
            }
        }

        let mut document = source.load(self.engine.fetcher()).await?;
        let base_events = document.event_count();

        let report = self
            .engine
            .run_invocations(&mut document, &profile.modules, policy)
            .await;

        info!(
            profile = name,
            %source,
            base_events,
            events = document.event_count(),
            "Rendered profile"
        );

        Ok(RenderedProfile { document, report })
    }
}
