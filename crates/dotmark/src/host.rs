//! Capabilities a host application provides to dotmark.
//!
//! The host owns the document render pipeline and the editor. dotmark only
//! depends on the two registration points below, so any host (the bundled
//! [`MarkdownHost`](crate::MarkdownHost), an editor integration, a test mock)
//! can drive it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::ImageFormat;
use crate::suggest::EditorSuggest;

/// Handle for a render started by a block processor.
///
/// The processor never awaits it; hosts may.
pub type RenderTask = tokio::task::JoinHandle<()>;

/// Location of a code block within its enclosing section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    /// Full text of the section containing the block
    pub text: String,
    /// Zero-based line offset of the opening fence within `text`
    pub line_start: usize,
}

/// Per-block context supplied by the host during a render pass.
pub trait SectionContext {
    /// Section info for the block, if the host can provide it.
    ///
    /// May be `None` during partial re-renders.
    fn section_info(&self) -> Option<SectionInfo>;
}

/// A processor that the host offers code blocks to.
pub trait BlockProcessor: Send + Sync {
    /// Handle one code block.
    ///
    /// Must not block: rendering happens on a spawned task whose handle is
    /// returned. Returns `None` when the block is skipped.
    fn process(
        &self,
        source: &str,
        region: &OutputRegion,
        ctx: &dyn SectionContext,
    ) -> Option<RenderTask>;
}

/// Type alias for a shared block processor.
pub type BoxedProcessor = Arc<dyn BlockProcessor>;

/// The host's code block processing pipeline.
pub trait BlockProcessorHost {
    /// Install `processor` for blocks keyed by `language`.
    ///
    /// The host does not support re-keying: to change the key, drop the
    /// returned registration with [`Registration::unregister`] and register
    /// again.
    fn register_block_processor(&self, language: &str, processor: BoxedProcessor)
    -> Registration;
}

/// The host's editor suggestion pipeline.
pub trait EditorSuggestHost {
    /// Install an editor suggestion provider.
    fn register_editor_suggest(&self, provider: Arc<dyn EditorSuggest>);
}

/// A live registration with the host; unregisters on request.
pub struct Registration {
    language: String,
    unregister: Box<dyn FnOnce() + Send>,
}

impl Registration {
    /// Create a registration that runs `unregister` when torn down.
    pub fn new(language: impl Into<String>, unregister: impl FnOnce() + Send + 'static) -> Self {
        Self {
            language: language.into(),
            unregister: Box::new(unregister),
        }
    }

    /// The key this registration was installed under.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Remove the processor from the host.
    pub fn unregister(self) {
        (self.unregister)()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

/// What a render produced for a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionContent {
    /// An image artifact from the `dot` executable
    Image { format: ImageFormat, data: Vec<u8> },
    /// Ready-to-embed markup
    Html(String),
    /// d3-graphviz markup; the page must load [`head_scripts`](crate::head_scripts)
    ClientGraph(String),
    /// Inline placeholder for a failed render
    Error(String),
}

#[derive(Default)]
struct RegionInner {
    generation: AtomicU64,
    content: Mutex<Option<RegionContent>>,
}

/// The output area for one code block.
///
/// Regions are shared between the host and in-flight render tasks. Each time
/// the host reuses a region for a new render pass it calls [`begin_pass`],
/// which bumps the generation; renders started against an older generation
/// are discarded when they complete.
///
/// [`begin_pass`]: OutputRegion::begin_pass
#[derive(Clone, Default)]
pub struct OutputRegion {
    inner: Arc<RegionInner>,
}

impl OutputRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Start a new render pass: clear content and invalidate in-flight renders.
    pub fn begin_pass(&self) -> u64 {
        let mut content = self.lock();
        *content = None;
        self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Write content if `generation` is still current.
    ///
    /// Returns `false` (and writes nothing) for stale renders.
    pub fn fill(&self, generation: u64, value: RegionContent) -> bool {
        let mut content = self.lock();
        if self.generation() != generation {
            return false;
        }
        *content = Some(value);
        true
    }

    /// A copy of the current content.
    pub fn content(&self) -> Option<RegionContent> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<RegionContent>> {
        // A poisoned region only means a writer panicked mid-assignment of an Option.
        self.inner
            .content
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for OutputRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputRegion")
            .field("generation", &self.generation())
            .field("content", &self.content())
            .finish()
    }
}
