use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use skier_core::{TaskRegistry, load_pipeline};

use crate::config::{BuildConfig, SkierConfig};

/// Flags shared by `build` and `serve`.
pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("pipeline")
                .short('p')
                .long("pipeline")
                .value_name("FILE")
                .help("Pipeline file describing the tasks to run"),
        )
        .arg(
            Arg::new("only")
                .long("only")
                .value_name("TASKS")
                .help("Comma separated list of task names to run"),
        )
        .arg(
            Arg::new("skip")
                .long("skip")
                .value_name("TASKS")
                .help("Comma separated list of task names to skip"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("CLI configuration file")
                .default_value("./skier-cli.toml"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Verbose logging")
                .action(ArgAction::SetTrue),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Run the build pipeline")
}

pub fn execute(config: &SkierConfig) -> Result<()> {
    let tasks = run_pipeline(&config.build)?;
    println!("Build finished, {tasks} task(s) run");
    Ok(())
}

/// Load the pipeline file and run it. Returns the number of tasks run.
pub fn run_pipeline(build: &BuildConfig) -> Result<usize> {
    let registry = TaskRegistry::builtin();
    let (mut context, pipeline) = load_pipeline(&build.pipeline, &registry)?;
    let pipeline = pipeline
        .debug(build.debug)
        .filter(&build.task_filter());

    tracing::debug!(tasks = ?pipeline.task_names(), "Running pipeline");
    let reports = pipeline.run(&mut context)?;
    Ok(reports.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn runs_filtered_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("assets/app.css"), "body {}").unwrap();
        fs::write(
            root.join("skier.toml"),
            format!(
                "[[task]]\nkind = \"copy-static\"\nfrom = '{root}/assets'\nto = '{root}/public'\n\n\
                 [[task]]\nkind = \"generate-sitemap\"\nscanDir = '{root}/public'\noutDir = '{root}/public'\n",
                root = root.display()
            ),
        )
        .unwrap();

        let build = BuildConfig {
            pipeline: root.join("skier.toml").to_string_lossy().to_string(),
            skip: "generate-sitemap".to_string(),
            ..BuildConfig::default()
        };
        assert_eq!(run_pipeline(&build).unwrap(), 1);
        assert!(root.join("public/app.css").exists());
        assert!(!root.join("public/sitemap.xml").exists());
    }

    #[test]
    fn missing_pipeline_file_is_an_error() {
        let build = BuildConfig {
            pipeline: "/definitely/not/here/skier.toml".to_string(),
            ..BuildConfig::default()
        };
        assert!(run_pipeline(&build).is_err());
    }
}
