mod error;
mod handlers;
mod routes;

pub use error::ApiError;
pub use routes::router;
