//! Core types of the request lifecycle.
//!
//! - [`CorrelationContext`] - per-request state shared by every record
//! - [`CorrelationId`] - sortable request identifier
//! - [`RequestFacts`] - request snapshot taken at arrival
//! - [`ResponseState`] - response head, byte meter and completion
//! - [`Iso8601Timestamp`] - record timestamps
//! - [`Error`] - setup errors

mod context;
mod error;
mod id;
mod request;
mod response;
mod timestamp;

pub use context::{CorrelationContext, CorrelationExt};
pub use error::{Error, Result};
pub use id::{CorrelationId, ID_LEN};
pub use request::{AuthenticatedUser, ConnectionInfo, OriginalUri, RemoteAddr, RequestFacts};
pub use response::{ResponseHead, ResponseState};
pub use timestamp::Iso8601Timestamp;
