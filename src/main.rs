use clap::Parser;
use tracing_subscriber::EnvFilter;

use corral::cli::{Cli, Command};
use corral::commands::{self, CreateArgs};
use corral::config;
use corral::session::Session;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("corral=debug")
    } else {
        EnvFilter::from_default_env()
            .add_directive("corral=info".parse().expect("valid log directive"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(cli.config.as_deref())?;
    let session = Session::open(config)?;

    match cli.command {
        Command::Create {
            pattern,
            list,
            dry_run,
            disk_size,
            cloud_init,
            extra_args,
        } => {
            commands::create(
                &session,
                &CreateArgs {
                    pattern: pattern.as_deref(),
                    list,
                    dry_run,
                    disk_size: disk_size.as_deref(),
                    cloud_init: cloud_init.as_deref(),
                    extra_args: &extra_args,
                },
            )?;
        }
        Command::Delete {
            dry_run,
            all,
            names,
        } => {
            commands::delete(&session, &names, all, dry_run)?;
        }
        Command::List { format } => {
            commands::list(&session, format)?;
        }
    }

    Ok(())
}
