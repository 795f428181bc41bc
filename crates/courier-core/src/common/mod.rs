pub mod deadline;
pub mod error;
pub mod types;

pub use deadline::Deadline;
pub use error::{Error, Result};
pub use types::RecordId;
