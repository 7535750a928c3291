//! Command-line arguments.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Render Graphviz code blocks in markdown documents
#[derive(Parser, Debug)]
#[command(name = "dmk", version, about)]
pub struct Cli {
    /// Settings file (default: `.config/dotmark.json`, searched upward)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a markdown file to HTML
    Render(RenderArgs),
    /// Re-render a markdown file whenever it or the settings change
    Watch(WatchArgs),
    /// Show or change settings
    Config(ConfigArgs),
    /// Offer or insert a layout skeleton in an empty ```dot block
    Suggest(SuggestArgs),
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Markdown file to render
    pub input: Utf8PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<Utf8PathBuf>,

    /// Wrap the output in a complete HTML page
    #[arg(long)]
    pub standalone: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Markdown file to render
    pub input: Utf8PathBuf,

    /// Output HTML file
    #[arg(short, long)]
    pub output: Utf8PathBuf,

    /// Debounce delay for file changes, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub debounce_ms: u64,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print all settings
    Show,
    /// Print the settings file path
    Path,
    /// Change a setting (dotPath, codeblockLanguage, renderer, imageFormat)
    Set { key: String, value: String },
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    /// Markdown file to edit
    pub file: Utf8PathBuf,

    /// One-based line holding the ```dot fence (cursor goes to its end)
    #[arg(short, long)]
    pub line: usize,

    /// Layout engine to insert; lists the suggestions when omitted
    #[arg(short, long)]
    pub engine: Option<String>,

    /// Write the result back to the file instead of printing it
    #[arg(short, long)]
    pub write: bool,
}
