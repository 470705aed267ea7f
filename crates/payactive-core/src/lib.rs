#![deny(clippy::all)]

mod aggregator;
pub mod channels;
pub mod config;
pub mod day;
mod emitter;
pub mod error;
mod logins;
mod paying;
pub mod pipeline;
pub mod store;

pub use aggregator::*;
pub use channels::{canonical_user_id, resolve_channel, segment_key, IdScheme};
pub use config::{ElasticSettings, JobSettings, LoginSource, S3Settings, Settings};
pub use emitter::*;
pub use error::{ConfigError, PipelineError, StoreError};
pub use logins::*;
pub use paying::*;
pub use pipeline::{Computation, Pipeline, RunReport, SegmentCount};
pub use store::{ElasticClient, LoginEvent, ObjectLoginLog};
