//! EC2 client wrapper
//!
//! Thin facade over [`aws_sdk_ec2::Client`]: validates the supplied
//! configuration up front, then delegates lookups and launches to the
//! service, flattening the reservation-grouped responses into plain
//! sequences.

use std::future::Future;
use std::time::{Duration, Instant};

use aws_config::SdkConfig;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{
    Address, BlockDeviceMapping, EbsInstanceBlockDeviceSpecification,
    IamInstanceProfileSpecification, Instance, InstanceBlockDeviceMappingSpecification,
    InstanceStateName, InstanceType, Placement, Reservation, SecurityGroup, Volume, VolumeState,
    VolumeType,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{Ec2Error, Result};
use crate::filter::Filter;

type AwsFilter = aws_sdk_ec2::types::Filter;

/// Poll cadence for operations that block on a remote state transition.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay between polls.
    pub interval: Duration,

    /// Total time to wait before giving up.
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Options for launching a single instance.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// AMI to launch from.
    pub image_id: String,

    /// Instance type, e.g. `m5.large`.
    pub instance_type: String,

    /// Cloud-init user data, plain text. Encoded for the wire on send.
    pub user_data: String,

    /// Security group name.
    pub security_group: String,

    /// Availability zone for placement.
    pub availability_zone: String,

    /// IAM instance profile name, if the instance needs one.
    pub iam_profile: Option<String>,

    /// Block device map. Defaults to [`default_block_devices`].
    pub block_devices: Vec<BlockDeviceMapping>,
}

impl LaunchOptions {
    pub fn new(
        image_id: impl Into<String>,
        instance_type: impl Into<String>,
        security_group: impl Into<String>,
        availability_zone: impl Into<String>,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            instance_type: instance_type.into(),
            user_data: String::new(),
            security_group: security_group.into(),
            availability_zone: availability_zone.into(),
            iam_profile: None,
            block_devices: default_block_devices(),
        }
    }
}

/// Options for attaching an EBS volume.
#[derive(Debug, Clone)]
pub struct AttachVolumeOptions {
    /// Device path on the instance, e.g. `/dev/sdf`.
    pub device: String,

    /// Volume type for a newly created volume, e.g. `gp3`.
    pub volume_type: String,

    /// Keep the volume after the instance terminates.
    pub keep_on_termination: bool,

    /// Existing volume to attach. Takes priority over `volume_size`.
    pub volume_id: Option<String>,

    /// Size in GiB for a new volume when `volume_id` is unset.
    pub volume_size: Option<i32>,
}

/// Extra devices on larger instance types only show up when they are
/// associated with a block device, and EBS-backed images do not set that
/// up on their own. `sdb` is always `ephemeral0`; further devices follow
/// in order.
pub fn default_block_devices() -> Vec<BlockDeviceMapping> {
    [
        ("ephemeral0", "/dev/sdb"),
        ("ephemeral1", "/dev/sdc"),
        ("ephemeral2", "/dev/sdd"),
        ("ephemeral3", "/dev/sde"),
    ]
    .into_iter()
    .map(|(virtual_name, device_name)| {
        BlockDeviceMapping::builder()
            .virtual_name(virtual_name)
            .device_name(device_name)
            .build()
    })
    .collect()
}

/// A manager for EC2 inventory and lifecycle calls.
///
/// Each instance is bound to the region resolved from the configuration
/// it was constructed with.
#[derive(Debug, Clone)]
pub struct Ec2 {
    client: Client,
    region: String,
    wait: WaitConfig,
}

impl Ec2 {
    /// Build a wrapper from a loaded AWS configuration.
    ///
    /// The configuration is checked before anything else: a credentials
    /// provider and a resolved region must both be present, otherwise
    /// this fails with [`Ec2Error::Config`] without any call being made.
    pub fn new(config: &SdkConfig) -> Result<Self> {
        if config.credentials_provider().is_none() {
            return Err(Ec2Error::Config(
                "no credentials provider in the supplied configuration".to_string(),
            ));
        }

        let region = config
            .region()
            .ok_or_else(|| {
                Ec2Error::Config("no region resolved; set --region or AWS_REGION".to_string())
            })?
            .to_string();

        Ok(Self {
            client: Client::new(config),
            region,
            wait: WaitConfig::default(),
        })
    }

    /// Build a wrapper around an already constructed client.
    pub fn from_client(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
            wait: WaitConfig::default(),
        }
    }

    /// Replace the poll cadence used by the waiting operations.
    #[must_use]
    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// The region this wrapper is bound to.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The underlying SDK client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns the instances matching the search criteria.
    ///
    /// The remote response groups instances by reservation; the groups
    /// are flattened into one sequence in reservation-then-instance
    /// order. An empty filter lists the whole region.
    pub async fn find_instances(&self, filter: &Filter) -> Result<Vec<Instance>> {
        self.describe_instances(filter.as_request_filters(), None).await
    }

    /// Looks up instances by their explicit identifiers.
    pub async fn find_instances_by_id<I, S>(&self, ids: I) -> Result<Vec<Instance>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        self.describe_instances(None, Some(ids)).await
    }

    /// Shorthand for looking up instances by their `Name` tag.
    ///
    /// Matches running and stopped instances only.
    pub async fn find_instances_by_hostname(&self, hostname: &str) -> Result<Vec<Instance>> {
        let filter = Filter::new()
            .with_tag("Name", hostname)
            .with("instance-state-name", "running")
            .with("instance-state-name", "stopped");

        self.find_instances(&filter).await
    }

    async fn describe_instances(
        &self,
        filters: Option<Vec<AwsFilter>>,
        instance_ids: Option<Vec<String>>,
    ) -> Result<Vec<Instance>> {
        tracing::debug!(region = %self.region, ?filters, ?instance_ids, "describing instances");

        let mut pages = self
            .client
            .describe_instances()
            .set_filters(filters)
            .set_instance_ids(instance_ids)
            .into_paginator()
            .send();

        let mut reservations = Vec::new();
        while let Some(page) = pages.try_next().await.map_err(Ec2Error::api)? {
            reservations.extend(page.reservations.unwrap_or_default());
        }

        let instances = flatten_reservations(reservations);
        tracing::info!("found {} instances", instances.len());

        Ok(instances)
    }

    /// Returns the EBS volumes matching the search criteria.
    pub async fn find_volumes(&self, filter: &Filter) -> Result<Vec<Volume>> {
        tracing::debug!(region = %self.region, ?filter, "describing volumes");

        let mut pages = self
            .client
            .describe_volumes()
            .set_filters(filter.as_request_filters())
            .into_paginator()
            .send();

        let mut volumes = Vec::new();
        while let Some(page) = pages.try_next().await.map_err(Ec2Error::api)? {
            volumes.extend(page.volumes.unwrap_or_default());
        }

        tracing::info!("found {} volumes", volumes.len());

        Ok(volumes)
    }

    /// Returns the security groups with the given group name.
    pub async fn find_security_groups(&self, name: &str) -> Result<Vec<SecurityGroup>> {
        let filter = Filter::new().with("group-name", name);
        tracing::debug!(region = %self.region, ?filter, "describing security groups");

        let mut pages = self
            .client
            .describe_security_groups()
            .set_filters(filter.as_request_filters())
            .into_paginator()
            .send();

        let mut groups = Vec::new();
        while let Some(page) = pages.try_next().await.map_err(Ec2Error::api)? {
            groups.extend(page.security_groups.unwrap_or_default());
        }

        tracing::info!("found {} security groups", groups.len());

        Ok(groups)
    }

    /// Finds the Elastic IPs with the given public IP.
    ///
    /// The lookup is unconstrained on the wire and matched locally:
    /// asking the service to filter on an unknown IP is an error, while
    /// an unknown IP here just yields an empty list.
    pub async fn find_addresses(&self, ip: &str) -> Result<Vec<Address>> {
        let output = self
            .client
            .describe_addresses()
            .send()
            .await
            .map_err(Ec2Error::api)?;

        Ok(match_addresses(output.addresses.unwrap_or_default(), ip))
    }

    /// Points an Elastic IP at the given instance, or with `None`
    /// releases whatever addresses currently point at it.
    pub async fn reassign_address(
        &self,
        instance: &Instance,
        address: Option<&Address>,
    ) -> Result<()> {
        let instance_id = instance
            .instance_id()
            .ok_or_else(|| Ec2Error::InvalidArgument("instance has no id".to_string()))?;

        match address {
            Some(address) => {
                let mut request = self.client.associate_address().instance_id(instance_id);
                request = match address.allocation_id() {
                    Some(allocation_id) => request.allocation_id(allocation_id),
                    None => request.set_public_ip(address.public_ip().map(String::from)),
                };
                request.send().await.map_err(Ec2Error::api)?;

                tracing::info!(
                    "associated {} with instance {}",
                    address.public_ip().unwrap_or("address"),
                    instance_id
                );
            }
            None => {
                let current_ip = instance.public_ip_address().ok_or_else(|| {
                    Ec2Error::InvalidArgument(
                        "instance has no public address to release".to_string(),
                    )
                })?;

                for address in self.find_addresses(current_ip).await? {
                    let mut request = self.client.disassociate_address();
                    request = match address.association_id() {
                        Some(association_id) => request.association_id(association_id),
                        None => request.set_public_ip(address.public_ip().map(String::from)),
                    };
                    request.send().await.map_err(Ec2Error::api)?;
                }

                tracing::info!("disassociated {} from instance {}", current_ip, instance_id);
            }
        }

        Ok(())
    }

    /// Launches a single instance and waits for it to reach `running`.
    ///
    /// Returns the refreshed instance record, so the caller sees the
    /// assigned addresses rather than the pending stub.
    pub async fn run_instance(&self, options: &LaunchOptions) -> Result<Instance> {
        let mut request = self
            .client
            .run_instances()
            .image_id(&options.image_id)
            .min_count(1)
            .max_count(1)
            .instance_type(InstanceType::from(options.instance_type.as_str()))
            .user_data(BASE64.encode(&options.user_data))
            .security_groups(&options.security_group)
            .set_block_device_mappings(Some(options.block_devices.clone()))
            .placement(
                Placement::builder()
                    .availability_zone(&options.availability_zone)
                    .build(),
            );

        if let Some(profile) = &options.iam_profile {
            request = request.iam_instance_profile(
                IamInstanceProfileSpecification::builder().name(profile).build(),
            );
        }

        let output = request.send().await.map_err(Ec2Error::api)?;
        let instance_id = output
            .instances()
            .first()
            .and_then(|instance| instance.instance_id())
            .ok_or_else(|| Ec2Error::NotFound("launched instance id".to_string()))?
            .to_string();

        tracing::debug!(instance_id = %instance_id, "waiting for the instance to start");

        let instance = wait_until(
            &self.wait,
            &format!("instance {instance_id} to reach running"),
            || {
                let instance_id = instance_id.clone();
                async move {
                    let found = self.find_instances_by_id([instance_id]).await?;
                    Ok(found.into_iter().find(is_running))
                }
            },
        )
        .await?;

        tracing::info!(
            "started instance {}",
            instance.public_dns_name().unwrap_or(&instance_id)
        );

        Ok(instance)
    }

    /// Attaches an EBS volume to the given instance at the given device.
    ///
    /// With a volume id the existing volume is attached; otherwise a new
    /// volume of `volume_size` GiB is created in the instance's
    /// availability zone first. One of the two is required.
    pub async fn attach_volume(
        &self,
        instance: &Instance,
        options: &AttachVolumeOptions,
    ) -> Result<Volume> {
        let instance_id = instance
            .instance_id()
            .ok_or_else(|| Ec2Error::InvalidArgument("instance has no id".to_string()))?;

        let volume_id = if let Some(volume_id) = &options.volume_id {
            volume_id.clone()
        } else if let Some(size) = options.volume_size {
            let zone = instance
                .placement()
                .and_then(|placement| placement.availability_zone())
                .ok_or_else(|| {
                    Ec2Error::InvalidArgument("instance has no availability zone".to_string())
                })?;

            let created = self
                .client
                .create_volume()
                .size(size)
                .availability_zone(zone)
                .volume_type(VolumeType::from(options.volume_type.as_str()))
                .send()
                .await
                .map_err(Ec2Error::api)?;
            let volume_id = created
                .volume_id
                .ok_or_else(|| Ec2Error::NotFound("created volume id".to_string()))?;

            tracing::debug!(volume_id = %volume_id, "waiting for the new volume");
            self.wait_for_volume_state(&volume_id, VolumeState::Available).await?;

            volume_id
        } else {
            return Err(Ec2Error::InvalidArgument(
                "either volume_id or volume_size is required".to_string(),
            ));
        };

        self.client
            .attach_volume()
            .volume_id(&volume_id)
            .instance_id(instance_id)
            .device(&options.device)
            .send()
            .await
            .map_err(Ec2Error::api)?;

        tracing::debug!(volume_id = %volume_id, "waiting for the volume to attach");
        self.wait_for_volume_state(&volume_id, VolumeState::InUse).await?;

        self.client
            .modify_instance_attribute()
            .instance_id(instance_id)
            .block_device_mappings(
                InstanceBlockDeviceMappingSpecification::builder()
                    .device_name(&options.device)
                    .ebs(
                        EbsInstanceBlockDeviceSpecification::builder()
                            .volume_id(&volume_id)
                            .delete_on_termination(!options.keep_on_termination)
                            .build(),
                    )
                    .build(),
            )
            .send()
            .await
            .map_err(Ec2Error::api)?;

        tracing::info!(
            "attached volume {} to instance {} at {}",
            volume_id,
            instance_id,
            options.device
        );

        let filter = Filter::new().with("volume-id", volume_id.clone());
        self.find_volumes(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Ec2Error::NotFound(format!("volume {volume_id}")))
    }

    async fn wait_for_volume_state(&self, volume_id: &str, target: VolumeState) -> Result<()> {
        let filter = Filter::new().with("volume-id", volume_id);

        wait_until(
            &self.wait,
            &format!("volume {volume_id} to reach {}", target.as_str()),
            || {
                let filter = filter.clone();
                let target = target.clone();
                async move {
                    let volumes = self.find_volumes(&filter).await?;
                    Ok(volumes
                        .iter()
                        .any(|volume| volume.state() == Some(&target))
                        .then_some(()))
                }
            },
        )
        .await
    }
}

/// Poll until `poll` yields a value, or fail with [`Ec2Error::Timeout`]
/// once the configured deadline passes. `what` names the awaited
/// transition in the timeout message.
async fn wait_until<T, F, Fut>(wait: &WaitConfig, what: &str, mut poll: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + wait.timeout;

    loop {
        if let Some(value) = poll().await? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            return Err(Ec2Error::Timeout(what.to_string()));
        }
        tokio::time::sleep(wait.interval).await;
    }
}

/// Client-side match for [`Ec2::find_addresses`]. An unknown IP yields an
/// empty list, where the service-side filter would raise an error.
fn match_addresses(addresses: Vec<Address>, ip: &str) -> Vec<Address> {
    addresses
        .into_iter()
        .filter(|address| address.public_ip() == Some(ip))
        .collect()
}

fn is_running(instance: &Instance) -> bool {
    instance.state().and_then(|state| state.name()) == Some(&InstanceStateName::Running)
}

/// Flatten the reservation grouping of a describe-instances response,
/// preserving reservation-then-instance order.
fn flatten_reservations(reservations: Vec<Reservation>) -> Vec<Instance> {
    reservations
        .into_iter()
        .flat_map(|reservation| reservation.instances.unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::{BehaviorVersion, Region};
    use aws_sdk_ec2::config::{Credentials, SharedCredentialsProvider};

    fn test_credentials() -> SharedCredentialsProvider {
        SharedCredentialsProvider::new(Credentials::new(
            "AKIDEXAMPLE",
            "secret",
            None,
            None,
            "static",
        ))
    }

    fn instance(id: &str) -> Instance {
        Instance::builder().instance_id(id).build()
    }

    #[test]
    fn rejects_config_without_credentials() {
        let config = SdkConfig::builder().build();

        assert!(matches!(Ec2::new(&config), Err(Ec2Error::Config(_))));
    }

    #[test]
    fn rejects_config_without_region() {
        let config = SdkConfig::builder()
            .credentials_provider(test_credentials())
            .build();

        assert!(matches!(Ec2::new(&config), Err(Ec2Error::Config(_))));
    }

    #[test]
    fn accepts_config_with_credentials_and_region() {
        let config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(test_credentials())
            .region(Region::new("us-west-2"))
            .build();

        let ec2 = Ec2::new(&config).unwrap();
        assert_eq!(ec2.region(), "us-west-2");
    }

    #[test]
    fn flattens_reservations_in_order() {
        let first = Reservation::builder().instances(instance("i-0001")).build();
        let second = Reservation::builder()
            .instances(instance("i-0002"))
            .instances(instance("i-0003"))
            .build();

        let flat = flatten_reservations(vec![first, second]);
        let ids: Vec<_> = flat.iter().filter_map(|i| i.instance_id()).collect();

        assert_eq!(ids, ["i-0001", "i-0002", "i-0003"]);
    }

    #[test]
    fn flattens_empty_reservations() {
        let empty = Reservation::builder().build();
        let one = Reservation::builder().instances(instance("i-0001")).build();

        let flat = flatten_reservations(vec![empty, one]);

        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].instance_id(), Some("i-0001"));
    }

    #[test]
    fn default_block_devices_cover_four_ephemerals() {
        let devices = default_block_devices();

        assert_eq!(devices.len(), 4);
        assert_eq!(devices[0].virtual_name(), Some("ephemeral0"));
        assert_eq!(devices[0].device_name(), Some("/dev/sdb"));
        assert_eq!(devices[3].virtual_name(), Some("ephemeral3"));
        assert_eq!(devices[3].device_name(), Some("/dev/sde"));
    }

    #[test]
    fn launch_options_carry_default_block_devices() {
        let options = LaunchOptions::new("ami-123", "m5.large", "web", "us-west-2a");

        assert_eq!(options.block_devices.len(), 4);
        assert!(options.iam_profile.is_none());
        assert!(options.user_data.is_empty());
    }

    #[test]
    fn running_state_detection() {
        let running = Instance::builder()
            .instance_id("i-0001")
            .state(
                aws_sdk_ec2::types::InstanceState::builder()
                    .name(InstanceStateName::Running)
                    .build(),
            )
            .build();
        let pending = Instance::builder()
            .instance_id("i-0002")
            .state(
                aws_sdk_ec2::types::InstanceState::builder()
                    .name(InstanceStateName::Pending)
                    .build(),
            )
            .build();

        assert!(is_running(&running));
        assert!(!is_running(&pending));
        assert!(!is_running(&instance("i-0003")));
    }

    fn address(ip: &str) -> Address {
        Address::builder().public_ip(ip).build()
    }

    #[test]
    fn matches_addresses_by_public_ip() {
        let addresses = vec![address("198.51.100.1"), address("198.51.100.2")];

        let matched = match_addresses(addresses, "198.51.100.2");

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].public_ip(), Some("198.51.100.2"));
    }

    #[test]
    fn unknown_ip_yields_empty_address_list() {
        let addresses = vec![address("198.51.100.1")];

        assert!(match_addresses(addresses, "203.0.113.9").is_empty());
    }

    #[tokio::test]
    async fn wait_until_returns_the_polled_value() {
        let wait = WaitConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(1),
        };

        let mut polls = 0;
        let value = wait_until(&wait, "second poll", || {
            polls += 1;
            let count = polls;
            async move { Ok((count >= 2).then_some(count)) }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn wait_until_times_out() {
        let wait = WaitConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(5),
        };

        let result: Result<()> =
            wait_until(&wait, "volume vol-1 to reach available", || async { Ok(None) }).await;

        match result {
            Err(Ec2Error::Timeout(what)) => assert_eq!(what, "volume vol-1 to reach available"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
