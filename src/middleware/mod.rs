pub mod error;
pub mod logging;

pub use error::{success_response, ErrorResponse};
pub use logging::{request_logging, UuidRequestId, REQUEST_ID_HEADER};
