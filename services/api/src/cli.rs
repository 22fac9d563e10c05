use crate::demo::{run_demo, DemoArgs};
use crate::drafts::{run_drafts, run_recover, DraftsCommand, RecoverArgs};
use crate::server;
use admission_portal::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Admission Portal",
    about = "Run the admission portal reference backend and drive its workflows from the command line",
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
    /// Walk one applicant and the office through the whole admission flow
    Demo(DemoArgs),
    /// Inspect or retire the signed-in user's drafts on the configured backend
    Drafts {
        #[command(subcommand)]
        command: DraftsCommand,
    },
    /// Print (and optionally discard) the local recovery copy of the last draft
    Recover(RecoverArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Drafts { command } => run_drafts(command).await,
        Command::Recover(args) => run_recover(args).await,
    }
}
