//! Match-and-dispatch of Graphviz code blocks.
//!
//! The [`Dispatcher`] keeps exactly one registration with the host's block
//! processor pipeline, keyed on the configured target identifier. The
//! installed processor snapshots the settings at registration time; changing
//! settings takes effect on the next explicit [`Dispatcher::reload`].

use std::sync::Arc;

use crate::config::{Renderer, Settings};
use crate::fence::{opening_fence_line, parse_fence_line};
use crate::host::{
    BlockProcessor, BlockProcessorHost, OutputRegion, RegionContent, Registration, RenderTask,
    SectionContext,
};
use crate::strategy::{D3Renderer, DotRenderer, GraphRenderer};

/// Owns the active settings and the live processor registration.
pub struct Dispatcher {
    settings: Settings,
    dot: Arc<dyn GraphRenderer>,
    d3: Arc<dyn GraphRenderer>,
    registration: Option<Registration>,
}

impl Dispatcher {
    /// Create a dispatcher using the built-in renderers.
    pub fn new(settings: Settings) -> Self {
        Self::with_renderers(
            settings,
            Arc::new(DotRenderer::new()),
            Arc::new(D3Renderer::new()),
        )
    }

    /// Create a dispatcher with custom strategy A (`dot`) and strategy B
    /// (`d3_graphviz`) renderers.
    pub fn with_renderers(
        settings: Settings,
        dot: Arc<dyn GraphRenderer>,
        d3: Arc<dyn GraphRenderer>,
    ) -> Self {
        Self {
            settings,
            dot,
            d3,
            registration: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the cached settings.
    ///
    /// The installed processor keeps using the old settings until
    /// [`reload`](Self::reload) is called.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// The key of the live registration, if any.
    pub fn registered_language(&self) -> Option<&str> {
        self.registration.as_ref().map(Registration::language)
    }

    /// Tear down the current registration and install a new one keyed on
    /// the current target identifier.
    pub fn reload(&mut self, host: &dyn BlockProcessorHost) {
        self.unload();

        let target = self.settings.codeblock_language.clone();
        let processor = GraphvizProcessor {
            settings: Arc::new(self.settings.clone()),
            dot: self.dot.clone(),
            d3: self.d3.clone(),
        };
        let registration = host.register_block_processor(&target, Arc::new(processor));
        tracing::debug!(
            target_language = %target,
            renderer = self.settings.renderer.as_str(),
            "Registered Graphviz block processor"
        );
        self.registration = Some(registration);
    }

    /// Remove the live registration, if any.
    pub fn unload(&mut self) {
        if let Some(registration) = self.registration.take() {
            tracing::debug!(target_language = %registration.language(), "Unregistering block processor");
            registration.unregister();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.unload();
    }
}

/// The processor installed with the host for one settings snapshot.
struct GraphvizProcessor {
    settings: Arc<Settings>,
    dot: Arc<dyn GraphRenderer>,
    d3: Arc<dyn GraphRenderer>,
}

impl GraphvizProcessor {
    fn strategy(&self) -> Arc<dyn GraphRenderer> {
        match self.settings.renderer {
            Renderer::Dot => self.dot.clone(),
            Renderer::D3Graphviz => self.d3.clone(),
        }
    }
}

impl BlockProcessor for GraphvizProcessor {
    /// Must be called from within a tokio runtime.
    fn process(
        &self,
        source: &str,
        region: &OutputRegion,
        ctx: &dyn SectionContext,
    ) -> Option<RenderTask> {
        let Some(section) = ctx.section_info() else {
            tracing::debug!("No section info for code block, skipping");
            return None;
        };

        let fence = opening_fence_line(&section.text, section.line_start).and_then(parse_fence_line);
        let Some(fence) = fence else {
            tracing::debug!(line = section.line_start, "Not a fenced block, skipping");
            return None;
        };

        if !fence.matches_target(&self.settings.codeblock_language) {
            return None;
        }

        let renderer = self.strategy();
        let settings = self.settings.clone();
        let source = source.to_string();
        let region = region.clone();
        let generation = region.generation();

        Some(tokio::spawn(async move {
            let content = match renderer.render(&source, &settings).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(
                        renderer = settings.renderer.as_str(),
                        error = %e,
                        "Graphviz render failed"
                    );
                    RegionContent::Error(e.to_string())
                }
            };
            if !region.fill(generation, content) {
                tracing::debug!(generation, "Discarding stale Graphviz render");
            }
        }))
    }
}
