pub mod response;

pub use response::Entity as Response;
