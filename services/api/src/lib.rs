mod cli;
mod infra;
mod routes;
mod runner;
mod server;

use address_recon::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
