pub mod connection;
pub mod entity;
pub mod error;
pub mod recorder;
pub mod repository;
pub mod schema;

pub use connection::establish_connection;
pub use error::RecorderError;
pub use recorder::ResponseRecorder;
pub use schema::{MigrationReport, SchemaVersion};
