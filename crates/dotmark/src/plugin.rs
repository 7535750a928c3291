//! Plugin lifecycle: settings, processor registration, and editor suggestions.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::Result;
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::host::{BlockProcessorHost, EditorSuggestHost};
use crate::suggest::LayoutSuggest;

/// Ties the dispatcher and the suggestion provider to a host.
pub struct Plugin {
    dispatcher: Dispatcher,
    settings_path: Option<Utf8PathBuf>,
}

impl Plugin {
    /// Create a plugin with in-memory settings that are never persisted.
    pub fn new(settings: Settings) -> Self {
        Self::with_dispatcher(Dispatcher::new(settings), None)
    }

    /// Create a plugin whose settings live in `path`.
    ///
    /// A missing file yields the defaults; edits are saved back to `path`.
    pub fn load_from(path: &Utf8Path) -> Result<Self> {
        let settings = Settings::load(path)?;
        Ok(Self::with_dispatcher(
            Dispatcher::new(settings),
            Some(path.to_path_buf()),
        ))
    }

    pub fn with_dispatcher(dispatcher: Dispatcher, settings_path: Option<Utf8PathBuf>) -> Self {
        Self {
            dispatcher,
            settings_path,
        }
    }

    pub fn settings(&self) -> &Settings {
        self.dispatcher.settings()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Register the block processor and the layout suggestion provider.
    pub fn load(&mut self, blocks: &dyn BlockProcessorHost, editor: &dyn EditorSuggestHost) {
        tracing::debug!("Loading graphviz plugin");
        self.reload_processors(blocks);
        editor.register_editor_suggest(Arc::new(LayoutSuggest::new()));
    }

    /// Re-register the block processor with the current settings.
    pub fn reload_processors(&mut self, blocks: &dyn BlockProcessorHost) {
        self.dispatcher.reload(blocks);
    }

    /// Change one setting by its persisted key and save.
    ///
    /// Changing `codeblockLanguage` re-registers the block processor
    /// immediately. Other settings apply from the next reload. The change is
    /// only applied once it has been saved.
    pub fn update_setting(
        &mut self,
        key: &str,
        value: &str,
        blocks: &dyn BlockProcessorHost,
    ) -> Result<()> {
        let mut settings = self.dispatcher.settings().clone();
        settings.set(key, value)?;
        if let Some(path) = &self.settings_path {
            settings.save(path)?;
        }
        self.dispatcher.set_settings(settings);

        if key == "codeblockLanguage" {
            self.reload_processors(blocks);
        }
        Ok(())
    }

    /// Re-read settings from disk and re-register the block processor.
    ///
    /// Without a settings path this only re-registers.
    pub fn reload_settings(&mut self, blocks: &dyn BlockProcessorHost) -> Result<()> {
        if let Some(path) = &self.settings_path {
            let settings = Settings::load(path)?;
            tracing::info!(%path, target_language = %settings.codeblock_language, "Settings reloaded");
            self.dispatcher.set_settings(settings);
        }
        self.reload_processors(blocks);
        Ok(())
    }

    pub fn settings_path(&self) -> Option<&Utf8Path> {
        self.settings_path.as_deref()
    }

    /// Persist the current settings, if a settings path is known.
    pub fn save(&self) -> Result<()> {
        match &self.settings_path {
            Some(path) => self.dispatcher.settings().save(path),
            None => Ok(()),
        }
    }

    /// Remove the block processor registration.
    pub fn unload(&mut self) {
        tracing::debug!("Unloading graphviz plugin");
        self.dispatcher.unload();
    }
}
