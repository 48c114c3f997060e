use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use skier_dev_server::{LiveServer, LiveServerConfig, ReloadHandle, inject_livereload};

use crate::cmd::build::{add_build_args, run_pipeline};
use crate::config::{BuildConfig, SkierConfig};

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Build, serve the output and rebuild on changes")
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Directory to serve"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Port to serve on"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(config: &SkierConfig) -> Result<()> {
    let output_dir = PathBuf::from(&config.serve.output);

    rebuild(&config.build, &output_dir);
    std::fs::create_dir_all(&output_dir)?;

    let server = LiveServer::new(LiveServerConfig {
        host: config.serve.host.clone(),
        port: config.serve.port,
        root: output_dir.clone(),
        open: config.serve.open,
    });
    let reload = server.reload_handle();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("Dev server error: {}", e);
        }
    });

    let build = config.build.clone();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watch_project(build, output_dir, reload).await {
            tracing::error!("Watcher error: {}", e);
        }
    });

    let _ = tokio::try_join!(server_handle, watcher_handle)?;

    Ok(())
}

/// Run the pipeline and inject the reload client. Failures are logged.
fn rebuild(build: &BuildConfig, output_dir: &Path) -> bool {
    match run_pipeline(build) {
        Ok(tasks) => {
            if output_dir.exists()
                && let Err(e) = inject_livereload(output_dir)
            {
                tracing::warn!("Could not inject live reload client: {}", e);
            }
            println!("Rebuilt, {tasks} task(s) run");
            true
        }
        Err(e) => {
            tracing::error!("Build failed: {}", e);
            false
        }
    }
}

/// Whether a changed path should trigger a rebuild.
fn is_source_change(path: &Path, output_dir: &Path) -> bool {
    !path.starts_with(output_dir) && !path.components().any(|c| c.as_os_str() == ".git")
}

async fn watch_project(build: BuildConfig, output_dir: PathBuf, reload: ReloadHandle) -> Result<()> {
    let project_dir = build.project_dir();
    let abs_output = output_dir.canonicalize().unwrap_or_else(|_| output_dir.clone());

    let (tx, mut rx) = tokio::sync::mpsc::channel(100);
    let mut debouncer = new_debouncer(
        Duration::from_millis(300),
        move |res: DebounceEventResult| match res {
            Ok(events) => {
                let _ = tx.blocking_send(events.into_iter().map(|e| e.path).collect::<Vec<_>>());
            }
            Err(e) => tracing::warn!("Watch error: {}", e),
        },
    )?;

    debouncer
        .watcher()
        .watch(&project_dir, notify::RecursiveMode::Recursive)?;
    println!("Watching {} for changes...", project_dir.display());

    while let Some(paths) = rx.recv().await {
        let changed: Vec<PathBuf> = paths
            .into_iter()
            .filter(|path| {
                let abs = path.canonicalize().unwrap_or_else(|_| path.clone());
                is_source_change(&abs, &abs_output)
            })
            .collect();
        if changed.is_empty() {
            continue;
        }
        for path in &changed {
            tracing::debug!(path = %path.display(), "Changed");
        }

        if rebuild(&build, &output_dir) {
            let browsers = reload.reload();
            tracing::debug!(browsers, "Sent reload signal");
        }
    }

    Ok(())
}
