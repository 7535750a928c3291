//! One-shot commands: render, config, suggest.

use std::cell::RefCell;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use dotmark::{
    CONFIG_DIR, CONFIG_FILE, Document, EditorSuggest, EditorSuggestHost, MarkdownHost, Plugin,
    Position, SuggestPopup, TextBuffer, discover_settings,
};
use eyre::{Result, WrapErr, eyre};
use owo_colors::OwoColorize;

use crate::args::{ConfigAction, ConfigArgs, RenderArgs, SuggestArgs};

/// Collects the suggestion providers a plugin registers.
#[derive(Default)]
pub struct EditorRegistry {
    providers: RefCell<Vec<Arc<dyn EditorSuggest>>>,
}

impl EditorRegistry {
    pub fn providers(&self) -> Vec<Arc<dyn EditorSuggest>> {
        self.providers.borrow().clone()
    }
}

impl EditorSuggestHost for EditorRegistry {
    fn register_editor_suggest(&self, provider: Arc<dyn EditorSuggest>) {
        self.providers.borrow_mut().push(provider);
    }
}

/// Resolve the settings file: explicit path, discovered file, or the default
/// location under the working directory.
pub fn settings_path(explicit: Option<Utf8PathBuf>) -> Result<Utf8PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let cwd = std::env::current_dir().wrap_err("failed to read working directory")?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|p| eyre!("working directory is not UTF-8: {}", p.display()))?;
    Ok(discover_settings(&cwd).unwrap_or_else(|| cwd.join(CONFIG_DIR).join(CONFIG_FILE)))
}

/// Load the plugin and register it with a fresh markdown host.
pub fn load_plugin(config: Option<Utf8PathBuf>) -> Result<(MarkdownHost, Plugin, EditorRegistry)> {
    let path = settings_path(config)?;
    let mut plugin =
        Plugin::load_from(&path).wrap_err_with(|| format!("failed to load settings from {path}"))?;
    let host = MarkdownHost::new();
    let editors = EditorRegistry::default();
    plugin.load(&host, &editors);
    Ok((host, plugin, editors))
}

/// Render a markdown file once.
pub async fn render(config: Option<Utf8PathBuf>, args: RenderArgs) -> Result<()> {
    let (host, _plugin, _editors) = load_plugin(config)?;
    let html = render_file(&host, &args.input, args.standalone).await?;

    match &args.output {
        Some(output) => {
            std::fs::write(output, html).wrap_err_with(|| format!("failed to write {output}"))?;
            tracing::info!(input = %args.input, output = %output, "Rendered");
        }
        None => print!("{html}"),
    }
    Ok(())
}

pub async fn render_file(host: &MarkdownHost, input: &Utf8Path, standalone: bool) -> Result<String> {
    let markdown =
        std::fs::read_to_string(input).wrap_err_with(|| format!("failed to read {input}"))?;
    let doc = host.render(&markdown).await;
    tracing::debug!(%input, rendered_blocks = doc.rendered_blocks, "Render pass complete");

    Ok(if standalone {
        page(&doc, input.file_stem().unwrap_or("document"))
    } else {
        doc.html
    })
}

/// Wrap a rendered document in a complete HTML page.
pub fn page(doc: &Document, title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}</head>\n<body>\n{}</body>\n</html>\n",
        html_escape::encode_text(title),
        doc.head,
        doc.html
    )
}

/// Show or change settings.
pub fn config(config: Option<Utf8PathBuf>, args: ConfigArgs) -> Result<()> {
    let path = settings_path(config)?;

    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let plugin = Plugin::load_from(&path)?;
            println!("{} {}", "settings:".dimmed(), path);
            for (key, value) in plugin.settings().entries() {
                println!("  {:<18} {}", key.cyan(), value);
            }
        }
        ConfigAction::Path => println!("{path}"),
        ConfigAction::Set { key, value } => {
            let host = MarkdownHost::new();
            let mut plugin = Plugin::load_from(&path)?;
            plugin.update_setting(&key, &value, &host)?;
            println!("{} {} = {}", "saved".green(), key, value);
        }
    }
    Ok(())
}

/// Drive the layout suggestion popup against a file.
pub fn suggest(config: Option<Utf8PathBuf>, args: SuggestArgs) -> Result<()> {
    let (_host, _plugin, editors) = load_plugin(config)?;
    let provider = editors
        .providers()
        .into_iter()
        .next()
        .ok_or_else(|| eyre!("no suggestion provider registered"))?;

    let text = std::fs::read_to_string(&args.file)
        .wrap_err_with(|| format!("failed to read {}", args.file))?;
    let mut buffer = TextBuffer::new(&text);

    let line = args
        .line
        .checked_sub(1)
        .ok_or_else(|| eyre!("line numbers start at 1"))?;
    let cursor: Position = buffer
        .end_of_line(line)
        .ok_or_else(|| eyre!("{} has no line {}", args.file, args.line))?;

    let mut popup = SuggestPopup::new(provider);
    popup.update(cursor, &buffer);
    if !popup.is_triggered() {
        return Err(eyre!(
            "line {} is not an empty ```dot block (the next line must be ```)",
            args.line
        ));
    }

    let Some(engine) = args.engine else {
        for item in popup.rendered_items() {
            println!("{item}");
        }
        return Ok(());
    };

    if !popup.choose(&engine, &mut buffer) {
        return Err(eyre!("unknown layout engine '{engine}'"));
    }

    let edited = buffer.to_string();
    if args.write {
        std::fs::write(&args.file, edited)
            .wrap_err_with(|| format!("failed to write {}", args.file))?;
        tracing::info!(file = %args.file, %engine, "Inserted layout skeleton");
    } else {
        print!("{edited}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_includes_head_and_title() {
        let doc = Document {
            html: "<p>hi</p>\n".into(),
            head: "<script src=\"x.js\"></script>\n".into(),
            rendered_blocks: 0,
        };
        let html = page(&doc, "a<b");
        assert!(html.contains("<title>a&lt;b</title>"));
        assert!(html.contains("<script src=\"x.js\"></script>\n</head>"));
        assert!(html.contains("<body>\n<p>hi</p>\n</body>"));
    }

    #[test]
    fn test_explicit_settings_path_wins() {
        let path = Utf8PathBuf::from("/tmp/custom.json");
        assert_eq!(settings_path(Some(path.clone())).unwrap(), path);
    }

    #[tokio::test]
    async fn test_render_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let settings = root.join("settings.json");
        std::fs::write(&settings, r#"{"renderer":"d3_graphviz"}"#).unwrap();
        let input = root.join("notes.md");
        std::fs::write(&input, "# Notes\n\n```dot\ndigraph { a -> b }\n```\n").unwrap();

        let (host, _plugin, _editors) = load_plugin(Some(settings)).unwrap();
        let html = render_file(&host, &input, true).await.unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>notes</title>"));
        assert!(html.contains("d3-graphviz.js"));
        assert!(html.contains("class=\"graphviz-d3\""));
    }

    #[test]
    fn test_suggest_writes_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let file = root.join("graph.md");
        std::fs::write(&file, "```dot\n```\n").unwrap();

        suggest(
            Some(root.join("settings.json")),
            SuggestArgs {
                file: file.clone(),
                line: 1,
                engine: Some("fdp".into()),
                write: true,
            },
        )
        .unwrap();

        let edited = std::fs::read_to_string(&file).unwrap();
        assert_eq!(edited, "```dot\ngraph f {\n    layout=fdp;\n\n\n}\n```\n");
    }

    #[test]
    fn test_suggest_rejects_non_trigger_line() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let file = root.join("graph.md");
        std::fs::write(&file, "```dot\ndigraph {}\n```\n").unwrap();

        let result = suggest(
            Some(root.join("settings.json")),
            SuggestArgs {
                file,
                line: 1,
                engine: Some("dot".into()),
                write: false,
            },
        );
        assert!(result.is_err());
    }
}
