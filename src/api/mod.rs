pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod mutation;
pub mod types;

pub use error::ApiError;
