mod cli;
mod infra;
mod review;
mod routes;
mod server;

use loan_console::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
