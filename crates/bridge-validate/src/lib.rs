mod cancellation;
mod error;
mod invocation;
mod request;
mod sanitizer;
mod validator;

pub use cancellation::CancellationScope;
pub use error::ValidationError;
pub use invocation::{BoundValue, ExecutionStatus, Invocation};
pub use request::{Principal, RawRequest};
pub use sanitizer::sanitize_argv_string;
pub use validator::validate;
