//! # dotmark
//!
//! Renders Graphviz code blocks embedded in markdown documents.
//!
//! dotmark intercepts fenced code blocks whose language token or bracketed
//! label equals a configured target identifier, and renders them with one of
//! two strategies:
//! - **dot**: the native `dot` executable, producing a PNG or SVG image
//! - **d3_graphviz**: client-side layout, emitting a container and a script for d3-graphviz
//!
//! It also provides an editor suggestion provider that inserts graph skeletons
//! for each Graphviz layout engine when `` ```dot `` is typed in an empty block.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dotmark::{MarkdownHost, Plugin, Settings};
//!
//! let host = MarkdownHost::new();
//! let mut plugin = Plugin::new(Settings::default());
//! plugin.load(&host, &editor_host);
//!
//! let doc = host.render("```dot\ndigraph { a -> b }\n```\n").await;
//! println!("{}", doc.html);
//! ```

mod config;
mod dispatch;
mod fence;
mod handler;
mod host;
mod plugin;
mod render;
mod strategy;
mod suggest;

pub use config::{CONFIG_DIR, CONFIG_FILE, ImageFormat, Renderer, Settings, discover_settings};
pub use dispatch::Dispatcher;
pub use fence::{FenceLine, opening_fence_line, parse_fence_line};
pub use handler::raw_code_html;
pub use host::{
    BlockProcessor, BlockProcessorHost, BoxedProcessor, EditorSuggestHost, OutputRegion,
    Registration, RegionContent, RenderTask, SectionContext, SectionInfo,
};
pub use plugin::Plugin;
pub use render::{Document, MarkdownHost};
pub use strategy::{D3_SOURCES, D3Renderer, DotRenderer, GraphRenderer, head_scripts};
pub use suggest::{
    Editor, EditorSuggest, Key, KeyChord, LAYOUT_ENGINES, LayoutSuggest, Modifier, Position,
    SuggestPopup, TextBuffer, TriggerInfo, layout_skeleton,
};

/// Error type for dotmark operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings could not be loaded or are invalid
    #[error("settings error: {0}")]
    Config(String),

    /// Settings file could not be parsed or written as JSON
    #[error("settings JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The external renderer could not be started
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The renderer ran but rejected the graph description
    #[error("{renderer} renderer failed: {message}")]
    Renderer { renderer: String, message: String },
}

/// Result type alias for dotmark operations.
pub type Result<T> = std::result::Result<T, Error>;
