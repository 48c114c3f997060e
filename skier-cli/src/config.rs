use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use skier_core::TaskFilter;
use skier_core::pipeline::split_task_list;
use std::path::{Path, PathBuf};

/// CLI configuration merged from flags, `SKIER_*` env vars, a config file and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SkierConfig {
    pub build: BuildConfig,
    pub serve: ServeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Pipeline file
    pub pipeline: String,
    /// Comma separated task names to run exclusively
    pub only: String,
    /// Comma separated task names to leave out
    pub skip: String,
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServeConfig {
    /// Directory served by the dev server
    pub output: String,
    pub host: String,
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            pipeline: "./skier.toml".to_string(),
            only: String::new(),
            skip: String::new(),
            debug: false,
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            output: "./public".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
        }
    }
}

impl BuildConfig {
    pub fn task_filter(&self) -> TaskFilter {
        TaskFilter {
            only: split_task_list(&self.only),
            skip: split_task_list(&self.skip),
        }
    }

    /// Directory holding the pipeline file; watched by `serve`.
    pub fn project_dir(&self) -> PathBuf {
        match Path::new(&self.pipeline).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl SkierConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (SKIER_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .try_get_one::<String>("config")
            .unwrap_or(None)
            .cloned()
            .unwrap_or_else(|| "./skier-cli.toml".to_string());

        let mut builder = ConfigBuilder::builder();

        builder = builder.add_source(ConfigBuilder::try_from(&Self::default())?);

        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::from(Path::new(&config_file)));
        }

        builder = builder.add_source(
            Environment::with_prefix("SKIER")
                .prefix_separator("_")
                .separator("__"),
        );

        // Only flags defined for the current subcommand are looked up
        let string_flags = [
            ("pipeline", "build.pipeline"),
            ("only", "build.only"),
            ("skip", "build.skip"),
            ("output", "serve.output"),
            ("host", "serve.host"),
        ];
        for (flag, key) in string_flags {
            if let Some(value) = args.try_get_one::<String>(flag).unwrap_or(None) {
                builder = builder.set_override(key, value.as_str())?;
            }
        }
        if let Some(port) = args.try_get_one::<String>("port").unwrap_or(None)
            && let Ok(port_num) = port.parse::<u16>()
        {
            builder = builder.set_override("serve.port", i64::from(port_num))?;
        }
        for (flag, key) in [("debug", "build.debug"), ("open", "serve.open")] {
            if args.try_get_one::<bool>(flag).unwrap_or(None) == Some(&true) {
                builder = builder.set_override(key, true)?;
            }
        }

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}
