//! Single-argument view of a dispatch cycle.

use super::request::SRequest;
use super::response::SResponse;

/// Request and response bundled together.
///
/// Handlers registered with the event calling convention receive this
/// instead of the two values separately. Both halves are the same objects
/// the middleware chain saw.
#[derive(Debug, Clone)]
pub struct SEvent {
    pub request: SRequest,
    pub response: SResponse,
}

impl SEvent {
    pub fn new(request: SRequest, response: SResponse) -> Self {
        Self { request, response }
    }

    /// Splits the event back into its halves.
    pub fn into_parts(self) -> (SRequest, SResponse) {
        (self.request, self.response)
    }
}
