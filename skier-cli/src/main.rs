use anyhow::Result;
use clap::Command;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cmd;
mod config;

use config::SkierConfig;

fn cli() -> Command {
    Command::new("skier")
        .about("Task based static site generator")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::serve::make_subcommand())
}

/// `RUST_LOG` wins; otherwise `--debug` selects debug output.
fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("build", args)) => {
            let config = SkierConfig::load(args)?;
            init_tracing(config.build.debug);
            cmd::build::execute(&config)
        }
        Some(("serve", args)) => {
            let config = SkierConfig::load(args)?;
            init_tracing(config.build.debug);
            cmd::serve::execute(&config).await
        }
        _ => unreachable!("subcommand_required is set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn serve_accepts_build_flags() {
        let matches = cli()
            .try_get_matches_from(["skier", "serve", "--only", "posts", "--port", "4000"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "serve");
        let config = SkierConfig::load(args).unwrap();
        assert_eq!(config.build.only, "posts");
        assert_eq!(config.serve.port, 4000);
    }
}
