pub mod alias;
pub mod backfill;
pub mod config;
pub mod description;
pub mod error;
pub mod extract;
pub mod message;
pub mod notify;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod vendor;

pub use config::Config;
pub use error::{PipelineError, SinkError};
pub use pipeline::{Outcome, Pipeline};
pub use record::AdvisoryRecord;
pub use sink::{AdvisorySink, JsonlStore};
pub use vendor::{SkipReason, Vendor, VendorParser};
