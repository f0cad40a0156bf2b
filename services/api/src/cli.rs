use crate::demo::{run_demo, run_rubric_import, DemoArgs, RubricImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use practicum::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Practicum",
    about = "Run the internship placement service or drive it from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Manage the evaluation rubric
    Rubric {
        #[command(subcommand)]
        command: RubricCommand,
    },
    /// Walk an application through to a graded evaluation on an in-memory store
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RubricCommand {
    /// Load rubric items from a CSV export
    Import(RubricImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// SQLite database file; without one the service keeps records in memory
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rubric {
            command: RubricCommand::Import(args),
        } => run_rubric_import(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["practicum-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn rubric_import_takes_csv_and_database() {
        let cli = Cli::try_parse_from([
            "practicum-api",
            "rubric",
            "import",
            "--csv",
            "rubric.csv",
            "--database",
            "placements.db",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Rubric {
                command: RubricCommand::Import(args),
            }) => {
                assert_eq!(args.csv, PathBuf::from("rubric.csv"));
                assert_eq!(args.database, Some(PathBuf::from("placements.db")));
            }
            other => panic!("expected rubric import, got {other:?}"),
        }
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from(["practicum-api", "serve", "--port", "8080"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.database.is_none());
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }
}
