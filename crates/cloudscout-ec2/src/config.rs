//! AWS configuration loading

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Credential and region selection on top of the default provider chain.
///
/// Unset fields fall back to the standard AWS environment variables and
/// shared config files.
#[derive(Debug, Clone, Default)]
pub struct AwsOptions {
    /// Named profile from the shared AWS config files.
    pub profile: Option<String>,

    /// Region override.
    pub region: Option<String>,
}

/// Load an [`SdkConfig`] through the default provider chain, honoring the
/// given profile and region overrides.
pub async fn load_sdk_config(options: &AwsOptions) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(profile) = &options.profile {
        loader = loader.profile_name(profile);
    }

    if let Some(region) = &options.region {
        loader = loader.region(Region::new(region.clone()));
    }

    loader.load().await
}
