pub mod api;
pub mod cache;
pub mod config;
pub mod logging;
pub mod query;

pub use api::cached_client::TalentClient;
pub use api::client::{HttpApi, TalentApi};
pub use api::ApiError;
pub use cache::{Invalidation, Key, QueryClient};
pub use query::{QueryState, Subscription};
