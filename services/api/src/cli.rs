use crate::demo::{run_demo, run_scan, run_sweep, DemoArgs, ScanArgs, SweepArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use fleet_dataq::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Fleet DataQ Triage",
    about = "Scan violations for DataQ challenge opportunities and track challenge lifecycles",
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
    /// Scan the demo carrier and print the triage summary
    Scan(ScanArgs),
    /// Run the response-deadline sweep and dispatch reminders
    Sweep(SweepArgs),
    /// Walk a challenge from scan through denial and a second round
    Demo(DemoArgs),
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
        Command::Scan(args) => run_scan(args),
        Command::Sweep(args) => run_sweep(args),
        Command::Demo(args) => run_demo(args),
    }
}
