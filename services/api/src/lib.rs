mod cli;
mod demo;
mod drafts;
mod infra;
mod routes;
mod server;

use admission_portal::error::AppError;

pub use infra::{BackendError, PortalBackend, StoredFile};
pub use routes::portal_router;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
