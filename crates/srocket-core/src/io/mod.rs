//! Request and response value objects handed to handlers and middleware.

mod event;
mod request;
mod response;
mod status;

pub use event::SEvent;
pub use request::SRequest;
pub use response::{Envelope, SResponse};
pub use status::StatusCode;
