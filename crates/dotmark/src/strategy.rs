//! Rendering strategies for matched Graphviz blocks.
//!
//! - [`DotRenderer`] runs the native `dot` executable out of process and
//!   returns the image it writes to stdout.
//! - [`D3Renderer`] emits a container element and a script that lays out and
//!   renders the graph client-side with d3-graphviz.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::{ImageFormat, Settings};
use crate::host::RegionContent;
use crate::{Error, Result};

/// Scripts the page must load for [`D3Renderer`] output to render.
pub const D3_SOURCES: [&str; 3] = [
    "https://d3js.org/d3.v5.min.js",
    "https://unpkg.com/@hpcc-js/wasm@0.3.11/dist/index.min.js",
    "https://unpkg.com/d3-graphviz@3.0.5/build/d3-graphviz.js",
];

/// `<script>` tags for [`D3_SOURCES`], in load order.
pub fn head_scripts() -> String {
    D3_SOURCES
        .iter()
        .map(|src| format!("<script src=\"{src}\"></script>\n"))
        .collect()
}

/// A strategy that turns graph source into region content.
///
/// # Example
///
/// ```rust,ignore
/// struct Upper;
///
/// impl GraphRenderer for Upper {
///     fn render<'a>(
///         &'a self,
///         source: &'a str,
///         _settings: &'a Settings,
///     ) -> Pin<Box<dyn Future<Output = Result<RegionContent>> + Send + 'a>> {
///         Box::pin(async move { Ok(RegionContent::Html(source.to_uppercase())) })
///     }
/// }
/// ```
pub trait GraphRenderer: Send + Sync {
    /// Render graph source.
    ///
    /// # Arguments
    /// * `source` - The raw code block content (a DOT program)
    /// * `settings` - Settings at the time the block was dispatched
    fn render<'a>(
        &'a self,
        source: &'a str,
        settings: &'a Settings,
    ) -> Pin<Box<dyn Future<Output = Result<RegionContent>> + Send + 'a>>;
}

/// Renders with the native `dot` executable.
///
/// Invokes `<dot_path> -T<format>` with the graph on stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotRenderer;

impl DotRenderer {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, source: &str, dot_path: &str, format: ImageFormat) -> Result<Vec<u8>> {
        let format_arg = format!("-T{}", format.as_str());
        tracing::debug!(program = %dot_path, format = %format.as_str(), "Running dot");

        let mut child = Command::new(dot_path)
            .arg(&format_arg)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: dot_path.to_string(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| Error::Renderer {
            renderer: "dot".into(),
            message: "stdin was not captured".into(),
        })?;
        let input = source.as_bytes().to_vec();
        // Feed stdin while collecting stdout so large graphs can't fill both pipes.
        let write = async move { stdin.write_all(&input).await };
        let (write_result, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Renderer {
                renderer: "dot".into(),
                message: format!(
                    "exit code {:?}: {}",
                    output.status.code(),
                    stderr.trim()
                ),
            });
        }
        write_result?;

        Ok(output.stdout)
    }
}

impl GraphRenderer for DotRenderer {
    fn render<'a>(
        &'a self,
        source: &'a str,
        settings: &'a Settings,
    ) -> Pin<Box<dyn Future<Output = Result<RegionContent>> + Send + 'a>> {
        Box::pin(async move {
            let data = self
                .run(source, &settings.dot_path, settings.image_format)
                .await?;
            Ok(RegionContent::Image {
                format: settings.image_format,
                data,
            })
        })
    }
}

/// Renders client-side with d3-graphviz.
///
/// Each render gets its own container id.
#[derive(Debug, Default)]
pub struct D3Renderer {
    next_id: AtomicU64,
}

impl D3Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn markup(&self, source: &str) -> Result<String> {
        let id = format!("graphviz-d3-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        // A JSON string is a valid JS string literal; `</` is split so the
        // source can't close the script element.
        let literal = serde_json::to_string(source)?.replace("</", "<\\/");
        Ok(format!(
            "<div class=\"graphviz-d3\" id=\"{id}\"></div>\n\
             <script>d3.select(\"#{id}\").graphviz().renderDot({literal});</script>\n"
        ))
    }
}

impl GraphRenderer for D3Renderer {
    fn render<'a>(
        &'a self,
        source: &'a str,
        _settings: &'a Settings,
    ) -> Pin<Box<dyn Future<Output = Result<RegionContent>> + Send + 'a>> {
        Box::pin(async move { Ok(RegionContent::ClientGraph(self.markup(source)?)) })
    }
}
