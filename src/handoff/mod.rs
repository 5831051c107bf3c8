//! Plan handoff to the provisioning engine.
//!
//! Finished plans are serialized to JSON and dropped where the engine picks
//! them up, either a local directory or an S3 prefix.

mod engine;
mod local;
mod s3;

pub use engine::{HandoffReceipt, LATEST_PLAN, ProvisioningEngine, create_engine, plan_file};
pub use local::LocalHandoff;
pub use s3::S3Handoff;
