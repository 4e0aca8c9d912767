pub mod envelope;
pub mod errors;
pub mod ids;
pub mod session;

pub use envelope::{ApiEnvelope, ClientEnvelope, Response};
pub use errors::RelayError;
pub use ids::ConnId;
pub use session::Session;
