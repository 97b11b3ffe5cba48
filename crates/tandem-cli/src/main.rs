//! Tandem CLI. Runs a node, or performs one-shot probe/swap/config commands
//! against the configured peer.

mod cli;
mod cmd;
mod ui;

use crate::cli::{Cli, Commands};
use clap::Parser;

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cmd::config::resolve(cli.config.as_deref(), cli.address, cli.port);
    let code = match cli.command {
        Commands::Run { no_stdin } => cmd::run::cmd_run(config, no_stdin),
        Commands::Probe => cmd::peer::cmd_probe(&config),
        Commands::Swap => cmd::peer::cmd_swap(&config),
        Commands::Config => cmd::config::cmd_config_show(&config, cli.config.as_deref()),
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "tandem",
            "run",
            "--address",
            "10.0.0.2",
            "--port",
            "6000",
            "--no-stdin",
            "--log-json",
        ])
        .expect("run flags should parse");
        assert!(matches!(cli.command, Commands::Run { no_stdin: true }));
        assert_eq!(cli.address.as_deref(), Some("10.0.0.2"));
        assert_eq!(cli.port, Some(6000));
        assert!(cli.log_json);
    }

    #[test]
    fn test_global_config_flag_before_subcommand() {
        let cli = Cli::try_parse_from(["tandem", "--config", "/tmp/t.toml", "probe"])
            .expect("global flag should parse");
        assert!(matches!(cli.command, Commands::Probe));
        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("/tmp/t.toml"))
        );
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["tandem"]).is_err());
        assert!(Cli::try_parse_from(["tandem", "swap", "--port", "0x10"]).is_err());
    }
}
