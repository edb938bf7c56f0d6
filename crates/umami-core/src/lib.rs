pub mod api;
pub mod config;
pub mod error;
pub mod filters;
pub mod http;
pub mod params;
pub mod retry;
pub mod session;
pub mod time_range;

pub use api::UmamiClient;
pub use config::{Config, ResolvedConfig, SessionMode};
pub use error::UmamiError;
pub use time_range::{Clock, FixedClock, SystemClock, TimeRange};
