//! reqtrail - correlated request lifecycle logging for hyper and tower.
//!
//! Every request gets a sortable correlation id and a small set of
//! structured records:
//!
//! - `request received` on arrival
//! - `request finished` once the request body has been read or dropped
//! - `response finished` once the response body has been handed to the
//!   transport, with status, content length and response time
//! - ERROR records for service errors and failed streams
//!
//! # Example
//!
//! ```rust,ignore
//! use reqtrail::{config::Config, ErrorPageLayer, Logger};
//! use tower::ServiceBuilder;
//!
//! let config = Config::from_env()?;
//! reqtrail::logging::init(&config.logging)?;
//! let logger = Logger::from_config(&config.sink)?;
//!
//! let service = ServiceBuilder::new()
//!     .layer(logger.layer())
//!     .layer(ErrorPageLayer::new(render_error))
//!     .layer(logger.error_layer())
//!     .service_fn(handle);
//! ```
//!
//! Handlers reach the context through [`CorrelationExt`]:
//!
//! ```rust,ignore
//! async fn handle<B>(req: Request<B>) -> Result<Response<Full<Bytes>>, Error> {
//!     if let Some(ctx) = req.correlation() {
//!         ctx.identify("user-42");
//!         ctx.log("loading cart");
//!     }
//!     ...
//! }
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod core;
pub mod logger;
pub mod logging;
pub mod metadata;
pub mod middleware;
pub mod record;
pub mod sink;

pub use crate::core::{CorrelationContext, CorrelationExt, CorrelationId, Error, Result};
pub use config::Config;
pub use logger::Logger;
pub use middleware::{ensure, ErrorLayer, ErrorPageLayer, LifecycleLayer, ObservedBody};
pub use record::{Entry, LogRecord, Message};
pub use sink::Sink;
