use crate::review::{run_review, run_terms, ReviewArgs, TermsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use loan_console::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Loan Console",
    about = "Review and progress loan applications against the core-banking backend",
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
    /// Load one loan application and optionally submit a decision on it
    Review(ReviewArgs),
    /// Quote monthly repayment and maximum loan for a set of terms
    Terms(TermsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override LOAN_API_BASE_URL
    #[arg(long)]
    pub(crate) backend_url: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Review(args) => run_review(args).await,
        Command::Terms(args) => run_terms(args),
    }
}
