use crate::runner::{run_diff, run_once, DiffArgs, RunArgs};
use crate::server;
use address_recon::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "address-recon",
    about = "Verify invoice ship-to addresses against USPS Web Tools and record what changed",
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
    /// Reconcile the unchecked rows of the summary export once and exit
    Run(RunArgs),
    /// Compare an address with a verified candidate without calling USPS
    Diff(DiffArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Run one reconciliation batch as soon as the listener is bound
    #[arg(long)]
    pub(crate) run_on_start: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Run(args) => run_once(args).await,
        Command::Diff(args) => run_diff(args),
    }
}
