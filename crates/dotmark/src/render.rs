//! Markdown render pipeline that hosts block processors.
//!
//! [`MarkdownHost`] is a [`BlockProcessorHost`]: each render pass offers every
//! code block in the document to every registered processor, waits for the
//! renders those processors started, and assembles HTML. Blocks no processor
//! filled are emitted as plain `<pre><code>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::handler::{raw_code_html, region_html};
use crate::host::{
    BlockProcessorHost, BoxedProcessor, OutputRegion, RegionContent, Registration, SectionContext,
    SectionInfo,
};
use crate::strategy::head_scripts;

/// A rendered markdown document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Rendered HTML body
    pub html: String,

    /// Markup the page head needs, e.g. d3-graphviz script tags
    pub head: String,

    /// Number of code blocks a processor rendered
    pub rendered_blocks: usize,
}

type ProcessorMap = DashMap<u64, (String, BoxedProcessor)>;

/// Renders markdown documents, offering code blocks to registered processors.
///
/// Output regions are kept across render passes so that a render still in
/// flight from an earlier pass cannot overwrite the current one.
#[derive(Default)]
pub struct MarkdownHost {
    processors: Arc<ProcessorMap>,
    next_id: AtomicU64,
    regions: Mutex<Vec<OutputRegion>>,
}

/// A code block found while scanning the document.
struct CodeBlock {
    /// Index of the replacement slot in the event list
    slot: usize,
    language: String,
    code: String,
    /// Line of the opening fence; `None` for indented blocks
    line_start: Option<usize>,
}

struct BlockContext<'a> {
    text: &'a str,
    line_start: Option<usize>,
}

impl SectionContext for BlockContext<'_> {
    fn section_info(&self) -> Option<SectionInfo> {
        self.line_start.map(|line_start| SectionInfo {
            text: self.text.to_string(),
            line_start,
        })
    }
}

impl MarkdownHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of the live registrations, in registration order.
    pub fn registered_languages(&self) -> Vec<String> {
        self.snapshot().into_iter().map(|(lang, _)| lang).collect()
    }

    fn snapshot(&self) -> Vec<(String, BoxedProcessor)> {
        let mut entries: Vec<(u64, String, BoxedProcessor)> = self
            .processors
            .iter()
            .map(|entry| {
                let (lang, processor) = entry.value();
                (*entry.key(), lang.clone(), processor.clone())
            })
            .collect();
        entries.sort_by_key(|(id, _, _)| *id);
        entries
            .into_iter()
            .map(|(_, lang, processor)| (lang, processor))
            .collect()
    }

    /// Claim `count` regions for a new render pass.
    fn begin_pass(&self, count: usize) -> Vec<OutputRegion> {
        let mut regions = self
            .regions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        regions.truncate(count);
        for region in regions.iter() {
            region.begin_pass();
        }
        while regions.len() < count {
            regions.push(OutputRegion::new());
        }
        regions.clone()
    }

    /// Run a render pass over `markdown`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn render(&self, markdown: &str) -> Document {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_HEADING_ATTRIBUTES;

        // 1. Collect events, replacing each code block with a placeholder slot
        let mut events: Vec<Event<'_>> = Vec::new();
        let mut blocks: Vec<CodeBlock> = Vec::new();
        let mut in_code_block = false;

        for (event, range) in Parser::new_ext(markdown, options).into_offset_iter() {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let (language, line_start) = match &kind {
                        CodeBlockKind::Fenced(info) => (
                            info.split_whitespace().next().unwrap_or("").to_string(),
                            Some(markdown[..range.start].matches('\n').count()),
                        ),
                        CodeBlockKind::Indented => (String::new(), None),
                    };
                    blocks.push(CodeBlock {
                        slot: events.len(),
                        language,
                        code: String::new(),
                        line_start,
                    });
                    events.push(Event::Html(CowStr::Borrowed("")));
                    in_code_block = true;
                }
                Event::Text(text) if in_code_block => {
                    if let Some(block) = blocks.last_mut() {
                        block.code.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                }
                other => events.push(other),
            }
        }

        // 2. Offer each block to every processor and wait for the renders
        let processors = self.snapshot();
        let regions = self.begin_pass(blocks.len());
        let mut tasks = Vec::new();

        for (block, region) in blocks.iter().zip(&regions) {
            let ctx = BlockContext {
                text: markdown,
                line_start: block.line_start,
            };
            for (_, processor) in &processors {
                if let Some(task) = processor.process(&block.code, region, &ctx) {
                    tasks.push(task);
                }
            }
        }

        tracing::debug!(
            blocks = blocks.len(),
            renders = tasks.len(),
            "Render pass dispatched"
        );

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Render task did not complete");
            }
        }

        // 3. Fill placeholder slots and generate HTML
        let mut rendered_blocks = 0;
        let mut needs_client_scripts = false;

        for (block, region) in blocks.iter().zip(&regions) {
            let html = match region.content() {
                Some(content) => {
                    rendered_blocks += 1;
                    needs_client_scripts |= matches!(content, RegionContent::ClientGraph(_));
                    region_html(&content)
                }
                None => raw_code_html(&block.language, &block.code),
            };
            events[block.slot] = Event::Html(CowStr::from(html));
        }

        let mut html = String::with_capacity(markdown.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, events.into_iter());

        Document {
            html,
            head: if needs_client_scripts {
                head_scripts()
            } else {
                String::new()
            },
            rendered_blocks,
        }
    }
}

impl BlockProcessorHost for MarkdownHost {
    fn register_block_processor(
        &self,
        language: &str,
        processor: BoxedProcessor,
    ) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.processors
            .insert(id, (language.to_string(), processor));
        tracing::debug!(id, language, "Block processor registered");

        let processors = self.processors.clone();
        Registration::new(language, move || {
            processors.remove(&id);
        })
    }
}
