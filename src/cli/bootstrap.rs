//! CLI bootstrap - load settings, install logging, build services.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::settings::{get_with_env_fallback, SettingsManager};
use crate::state::AppState;

use super::args::Args;

/// Everything a CLI command needs.
pub struct CliContext {
    pub state: AppState,
    pub args: Args,
}

/// Initialize the CLI context.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    let settings_manager = match &args.settings {
        Some(path) => SettingsManager::with_path(path.clone()).await,
        None => SettingsManager::new().await,
    }
    .context("Failed to initialize settings manager")?;
    let settings_manager = Arc::new(settings_manager);

    // Ensure settings file exists (creates template on first run)
    if let Err(e) = settings_manager.ensure_settings_file().await {
        tracing::warn!("Failed to create settings template: {}", e);
    }

    let mut settings = settings_manager.get().await;

    // An empty level in the file defers to ROOMFORGE_LOG_LEVEL
    let log_level = if args.verbose {
        "debug".to_string()
    } else {
        get_with_env_fallback(
            &Some(settings.logging.level.clone()),
            &["ROOMFORGE_LOG_LEVEL"],
            Some("info".to_string()),
        )
        .unwrap_or_else(|| "info".to_string())
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("roomforge={}", log_level).parse()?),
        )
        .try_init();

    if let Some(data_dir) = &args.data_dir {
        settings.storage.data_dir = data_dir.clone();
    }

    if args.verbose {
        eprintln!(
            "[cli] Settings loaded from {}",
            settings_manager.path().display()
        );
        eprintln!(
            "[cli] Data directory: {}",
            settings.storage.data_dir.display()
        );
    }

    Ok(CliContext {
        state: AppState::with_settings(settings_manager, &settings),
        args: args.clone(),
    })
}
