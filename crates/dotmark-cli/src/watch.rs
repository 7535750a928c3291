//! Watch mode: re-render on input or settings changes.
//!
//! The parent directories of both files are watched rather than the files
//! themselves, so atomic saves (write to temp, rename over) are still seen.
//! A settings directory that does not exist yet is covered by watching its
//! nearest existing ancestor until it is created.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Result, WrapErr, eyre};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::args::WatchArgs;
use crate::commands::{load_plugin, render_file, settings_path};

/// What a batch of file events touched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Changes {
    input: bool,
    settings: bool,
    /// The settings directory or one of its ancestors was created
    settings_dir: bool,
}

impl Changes {
    fn any(&self) -> bool {
        self.input || self.settings || self.settings_dir
    }

    fn merge(&mut self, other: Changes) {
        self.input |= other.input;
        self.settings |= other.settings;
        self.settings_dir |= other.settings_dir;
    }
}

/// File names to look for in event paths.
struct Targets {
    input: OsString,
    settings: OsString,
    /// Absolute directory the settings file lives in
    settings_dir: PathBuf,
}

impl Targets {
    fn classify(&self, event: &Event) -> Changes {
        // create covers atomic saves, remove is ignored until the file is back
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return Changes::default();
        }

        let mut changes = Changes::default();
        for path in &event.paths {
            if let Some(name) = path.file_name() {
                changes.input |= name == self.input;
                changes.settings |= name == self.settings;
            }
            if matches!(event.kind, EventKind::Create(_)) && self.settings_dir.starts_with(path) {
                changes.settings_dir = true;
            }
        }
        changes
    }
}

fn file_name(path: &Utf8Path) -> Result<OsString> {
    path.file_name()
        .map(OsString::from)
        .ok_or_else(|| eyre!("{path} has no file name"))
}

fn watch_dir(path: &Utf8Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.as_std_path().to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `dir` itself if it exists, else its closest existing ancestor.
fn nearest_existing(dir: &Path) -> PathBuf {
    dir.ancestors()
        .find(|candidate| candidate.is_dir())
        .unwrap_or(dir)
        .to_path_buf()
}

/// Watches the settings directory, or its nearest existing ancestor while
/// the directory is missing.
struct SettingsWatch {
    dir: PathBuf,
    watched: Option<PathBuf>,
}

impl SettingsWatch {
    /// Move the watch closer to the settings directory if more of it exists now.
    ///
    /// Directories already covered by `input_dir` are not watched twice.
    fn refresh(&mut self, watcher: &mut dyn Watcher, input_dir: &Path) -> Result<()> {
        let target = nearest_existing(&self.dir);
        if self.watched.as_deref() == Some(target.as_path()) {
            return Ok(());
        }

        if let Some(old) = self.watched.take()
            && let Err(e) = watcher.unwatch(&old)
        {
            tracing::debug!(dir = %old.display(), error = %e, "Unwatch failed");
        }

        if same_dir(&target, input_dir) {
            return Ok(());
        }
        watcher
            .watch(&target, RecursiveMode::NonRecursive)
            .wrap_err_with(|| format!("failed to watch {}", target.display()))?;
        if target != self.dir {
            tracing::debug!(
                dir = %self.dir.display(),
                watching = %target.display(),
                "Settings directory missing, watching its ancestor"
            );
        }
        self.watched = Some(target);
        Ok(())
    }
}

pub async fn run(config: Option<Utf8PathBuf>, args: WatchArgs) -> Result<()> {
    let settings_file = settings_path(config)?;
    let (host, mut plugin, _editors) = load_plugin(Some(settings_file.clone()))?;

    let input_dir = std::path::absolute(watch_dir(&args.input))
        .wrap_err_with(|| format!("failed to resolve {}", args.input))?;
    let settings_dir = std::path::absolute(watch_dir(&settings_file))
        .wrap_err_with(|| format!("failed to resolve {settings_file}"))?;

    let targets = Targets {
        input: file_name(&args.input)?,
        settings: file_name(&settings_file)?,
        settings_dir: settings_dir.clone(),
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Changes>();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) => {
                let changes = targets.classify(&event);
                if changes.any() {
                    // receiver gone means we are shutting down
                    let _ = tx.send(changes);
                }
            }
            Err(e) => tracing::warn!(error = %e, "File watcher error"),
        }
    })
    .wrap_err("failed to create file watcher")?;

    watcher
        .watch(&input_dir, RecursiveMode::NonRecursive)
        .wrap_err_with(|| format!("failed to watch {}", input_dir.display()))?;
    let mut settings_watch = SettingsWatch {
        dir: settings_dir,
        watched: None,
    };
    settings_watch.refresh(&mut watcher, &input_dir)?;

    write_output(&host, &args).await;
    tracing::info!(input = %args.input, output = %args.output, settings = %settings_file, "Watching for changes");

    let debounce = Duration::from_millis(args.debounce_ms);
    while let Some(first) = rx.recv().await {
        let mut changes = first;
        tokio::time::sleep(debounce).await;
        while let Ok(more) = rx.try_recv() {
            changes.merge(more);
        }

        if changes.settings_dir {
            if let Err(e) = settings_watch.refresh(&mut watcher, &input_dir) {
                tracing::warn!(error = ?e, "Could not follow the settings directory");
            }
            // the file may have been written before the new watch was in place
            changes.settings = true;
        }

        if changes.settings {
            if let Err(e) = plugin.reload_settings(&host) {
                tracing::warn!(error = %e, path = %settings_file, "Keeping previous settings");
                if !changes.input {
                    continue;
                }
            }
        }
        write_output(&host, &args).await;
    }

    Ok(())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

async fn write_output(host: &dotmark::MarkdownHost, args: &WatchArgs) {
    let result = async {
        let html = render_file(host, &args.input, true).await?;
        std::fs::write(&args.output, html)
            .wrap_err_with(|| format!("failed to write {}", args.output))
    }
    .await;

    match result {
        Ok(()) => tracing::info!(output = %args.output, "Rendered"),
        Err(e) => tracing::error!(error = ?e, "Render failed"),
    }
}
