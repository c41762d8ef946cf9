pub mod response_repo;

pub use response_repo::{ResponseRepository, ResponseSummary};
