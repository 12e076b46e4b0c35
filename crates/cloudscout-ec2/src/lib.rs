//! EC2 inventory helpers for cloudscout
//!
//! A thin convenience layer over `aws-sdk-ec2`: enumerate and filter
//! instances, volumes, security groups, and Elastic IPs by tag or
//! attribute, with up-front validation of the supplied credentials. The
//! SDK owns all wire semantics; this crate only shapes requests and
//! flattens responses.
//!
//! # Example
//!
//! ```ignore
//! use cloudscout_ec2::{AwsOptions, Ec2, Filter, load_sdk_config};
//!
//! let config = load_sdk_config(&AwsOptions::default()).await;
//! let ec2 = Ec2::new(&config)?;
//!
//! let filter = Filter::new()
//!     .with_tag("Name", "cc001.example.net")
//!     .with("instance-state-name", "running");
//! let instances = ec2.find_instances(&filter).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod tags;

pub use client::{
    AttachVolumeOptions, Ec2, LaunchOptions, WaitConfig, default_block_devices,
};
pub use config::{AwsOptions, load_sdk_config};
pub use error::{Ec2Error, Result};
pub use filter::Filter;
