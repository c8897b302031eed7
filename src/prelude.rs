pub use crate::base::{
    config::Config,
    types::{Err, Res, Void},
};
pub use crate::service::trace::TraceContext;
pub use anyhow::anyhow;
pub use tracing::{debug, error, info, instrument, warn};
