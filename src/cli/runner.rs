//! CLI command execution.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::capture::{Capability, RawCaptureSource, ReplayCaptureSource};
use crate::model::Room;
use crate::paths::to_file_uri;
use crate::project::SystemViewer;
use crate::session::CaptureSessionController;

use super::args::{Command, ConfigAction};
use super::bootstrap::CliContext;
use super::output::{run_event_loop, Output};

/// Per-room line in `rooms` output.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub identifier: Uuid,
    pub created_at: DateTime<Utc>,
    pub walls: usize,
    pub doors: usize,
    pub windows: usize,
    pub openings: usize,
    pub floors: usize,
    pub objects: usize,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        let g = &room.geometry;
        Self {
            identifier: room.identifier,
            created_at: room.created_at,
            walls: g.walls.len(),
            doors: g.doors.len(),
            windows: g.windows.len(),
            openings: g.openings.len(),
            floors: g.floors.len(),
            objects: g.objects.len(),
        }
    }
}

/// Result of a command that affects a single path or count.
#[derive(Debug, Clone, Serialize)]
struct Outcome {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

impl Outcome {
    fn new(ok: bool) -> Self {
        Self {
            ok,
            project: None,
            path: None,
            uri: None,
            count: None,
        }
    }
}

/// Run the command selected on the command line.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let output = Output::new(ctx.args.json, ctx.args.quiet);
    let store = &ctx.state.store;

    match &ctx.args.command {
        Command::Capability { replay } => {
            let capability = match replay {
                Some(path) => ReplayCaptureSource::from_file(path).await?.capability(),
                None => Capability::unsupported(
                    "No platform capture source in this build; use `scan --replay`",
                    std::env::consts::OS,
                ),
            };
            output.record(&capability, |c| match &c.reason {
                None => format!("Room capture available ({})", c.os_version),
                Some(reason) => format!("Room capture unavailable: {}", reason),
            })?;
        }

        Command::Projects => {
            let projects = store.list_projects().await?;
            if output.json {
                for project in &projects {
                    output.record(project, |_| String::new())?;
                }
            } else if projects.is_empty() {
                output.progress("No projects");
            } else {
                for project in &projects {
                    let rooms = store.room_count(&store.project(&project.id)?).await?;
                    println!(
                        "{}  {}  {} rooms",
                        project.id,
                        project.created_at.format("%Y-%m-%d %H:%M"),
                        rooms
                    );
                }
            }
        }

        Command::NewProject => {
            let project = store.create_project().await?;
            let outcome = Outcome {
                project: Some(project.id().to_string()),
                path: Some(project.dir().display().to_string()),
                ..Outcome::new(true)
            };
            output.record(&outcome, |o| format!("Created {}", project_label(o)))?;
        }

        Command::DeleteProject { id } => {
            let deleted = store.delete_project(id).await?;
            let outcome = Outcome {
                project: Some(id.clone()),
                ..Outcome::new(deleted)
            };
            output.record(&outcome, |o| {
                if o.ok {
                    format!("Deleted {}", id)
                } else {
                    format!("No project named {}", id)
                }
            })?;
        }

        Command::Scan {
            replay,
            project,
            no_relocalize,
        } => run_scan(ctx, output, replay, project.as_deref(), *no_relocalize).await?,

        Command::Rooms { project } => {
            let project = store.project(project)?;
            let rooms = store.rooms(&project).await?;
            for room in &rooms {
                output.record(&RoomSummary::from(room), |r| {
                    format!(
                        "{}  {}  {} walls, {} doors, {} windows, {} objects",
                        r.identifier,
                        r.created_at.format("%Y-%m-%d %H:%M:%S"),
                        r.walls,
                        r.doors,
                        r.windows,
                        r.objects
                    )
                })?;
            }
            output.progress(&format!("{} rooms", rooms.len()));
        }

        Command::Artifacts { project } => {
            let project = store.project(project)?;
            for artifact in store.list_artifacts(&project).await? {
                output.record(&artifact, |a| {
                    format!(
                        "{}  {}  {} bytes",
                        a.name,
                        a.created_at.format("%Y-%m-%d %H:%M:%S"),
                        a.size
                    )
                })?;
            }
        }

        Command::Read { path } => match store.read_room_metadata(path).await? {
            Some(room) => output.record(&room, |r| {
                serde_json::to_string_pretty(r).unwrap_or_else(|e| e.to_string())
            })?,
            None => anyhow::bail!("Room metadata not found: {}", path),
        },

        Command::Preview { path } => {
            let opened = store.preview(path, &SystemViewer).await;
            let outcome = Outcome {
                path: Some(store.resolve(path).display().to_string()),
                ..Outcome::new(opened)
            };
            output.record(&outcome, |o| {
                if o.ok {
                    "Opened in viewer".to_string()
                } else {
                    "Nothing to preview".to_string()
                }
            })?;
        }

        Command::Clear { project } => {
            let project = store.project(project)?;
            let removed = store.clear_artifacts(&project).await?;
            let outcome = Outcome {
                project: Some(project.id().to_string()),
                count: Some(removed),
                ..Outcome::new(true)
            };
            output.record(&outcome, |o| format!("Removed {} files", o.count.unwrap_or(0)))?;
        }

        Command::Import { source, project } => {
            let outcome = match project {
                Some(id) => {
                    let project = store.project(id)?;
                    let imported = store.import_artifact(&project, source).await?;
                    Outcome {
                        project: Some(project.id().to_string()),
                        path: imported.map(|p| p.display().to_string()),
                        ..Outcome::new(true)
                    }
                }
                None => {
                    let project = store.import_as_new_project(source).await?;
                    Outcome {
                        path: project
                            .as_ref()
                            .map(|p| p.combined_export_path().display().to_string()),
                        project: project.map(|p| p.id().to_string()),
                        ..Outcome::new(true)
                    }
                }
            };
            let outcome = Outcome {
                ok: outcome.path.is_some(),
                uri: outcome
                    .path
                    .as_deref()
                    .and_then(|p| to_file_uri(std::path::Path::new(p))),
                ..outcome
            };
            output.record(&outcome, |o| match &o.path {
                Some(path) => format!("Imported to {}", path),
                None => format!("Source not found: {}", source),
            })?;
        }

        Command::Rebuild { project } => {
            let project = store.project(project)?;
            let report = ctx.state.merger.rebuild(&project).await?;
            output.record(&report, |r| match &r.combined_artifact_path {
                Some(path) => format!(
                    "Rebuilt {} from {} rooms ({:?}): {}",
                    r.project_id,
                    r.room_count,
                    r.outcome,
                    path.display()
                ),
                None => format!("{} has no rooms; nothing exported", r.project_id),
            })?;
        }

        Command::Config { action } => {
            let settings = &ctx.state.settings;
            match action {
                ConfigAction::Path => {
                    let path = settings.path().display().to_string();
                    output.record(&path, |p| p.clone())?;
                }
                ConfigAction::Get { key } => {
                    let value = settings.get_value(key).await?;
                    output.record(&value, |v| v.to_string())?;
                }
                ConfigAction::Set { key, value } => {
                    let parsed = serde_json::from_str(value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.clone()));
                    settings
                        .set_value(key, parsed)
                        .await
                        .with_context(|| format!("Failed to set {}", key))?;
                    let stored = settings.get_value(key).await?;
                    output.record(&stored, |v| format!("{} = {}", key, v))?;
                }
            }
        }
    }

    Ok(())
}

fn project_label(outcome: &Outcome) -> String {
    match (&outcome.project, &outcome.path) {
        (Some(id), Some(path)) => format!("{} ({})", id, path),
        (Some(id), None) => id.clone(),
        _ => String::new(),
    }
}

async fn run_scan(
    ctx: &CliContext,
    output: Output,
    replay: &std::path::Path,
    project: Option<&str>,
    no_relocalize: bool,
) -> Result<()> {
    let store = &ctx.state.store;
    let source: Arc<dyn RawCaptureSource> =
        Arc::new(ReplayCaptureSource::from_file(replay).await?);

    let project = match project {
        Some(id) => store.project(id)?,
        None => store.create_project().await?,
    };
    output.progress(&format!(
        "[scan] Project {} using {}",
        project.id(),
        source.description()
    ));

    let mut services = ctx.state.scan_services(source);
    if no_relocalize {
        services.relocalize = false;
    }
    services.coaching_enabled = false;

    let (controller, event_rx) = CaptureSessionController::new(services, project);
    let controller = Arc::new(controller);
    let output_handle = tokio::spawn(run_event_loop(event_rx, output));

    let mut handle = controller
        .clone()
        .attach()
        .context("Scan session was already attached")?;
    let finished = tokio::select! {
        result = &mut handle => Some(result?),
        _ = tokio::signal::ctrl_c() => None,
    };
    let completion = match finished {
        Some(completion) => completion,
        None => {
            output.progress("[scan] Interrupted, stopping capture");
            controller.detach();
            handle.await?
        }
    };
    drop(controller);

    match output_handle.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::warn!("Output handler error: {}", e),
        Err(e) => tracing::warn!("Output handler panicked: {}", e),
    }

    match completion.error() {
        Some(error) => anyhow::bail!("Scan failed: {}", error),
        None => Ok(()),
    }
}
