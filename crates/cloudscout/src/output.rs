//! Terminal rendering for lookup results

use aws_sdk_ec2::types::{Address, Instance, SecurityGroup, Volume};
use cloudscout_ec2::tags;
use colored::{ColoredString, Colorize};

pub fn print_instances(instances: &[Instance]) {
    if instances.is_empty() {
        println!("{}", "no matching instances".yellow());
        return;
    }

    for instance in instances {
        let id = instance.instance_id().unwrap_or("-");
        let state = instance
            .state()
            .and_then(|state| state.name())
            .map(|name| name.as_str())
            .unwrap_or("-");
        let instance_type = instance
            .instance_type()
            .map(|instance_type| instance_type.as_str())
            .unwrap_or("-");
        let name = tags::get(instance.tags(), "Name").unwrap_or("-");
        let private_ip = instance.private_ip_address().unwrap_or("-");
        let public_ip = instance.public_ip_address().unwrap_or("-");

        println!(
            "{}  {:<12}  {:<12}  {}  {}  {}",
            id.cyan(),
            render_state(state),
            instance_type,
            name.bold(),
            private_ip,
            public_ip
        );
    }
}

pub fn print_volumes(volumes: &[Volume]) {
    if volumes.is_empty() {
        println!("{}", "no matching volumes".yellow());
        return;
    }

    for volume in volumes {
        let id = volume.volume_id().unwrap_or("-");
        let state = volume
            .state()
            .map(|state| state.as_str())
            .unwrap_or("-");
        let size = volume
            .size()
            .map(|size| format!("{size} GiB"))
            .unwrap_or_else(|| "-".to_string());
        let volume_type = volume
            .volume_type()
            .map(|volume_type| volume_type.as_str())
            .unwrap_or("-");
        let zone = volume.availability_zone().unwrap_or("-");

        println!("{}  {:<10}  {:>8}  {:<4}  {}", id.cyan(), state, size, volume_type, zone);
    }
}

pub fn print_security_groups(groups: &[SecurityGroup]) {
    if groups.is_empty() {
        println!("{}", "no matching security groups".yellow());
        return;
    }

    for group in groups {
        let id = group.group_id().unwrap_or("-");
        let name = group.group_name().unwrap_or("-");
        let description = group.description().unwrap_or("");

        println!("{}  {}  {}", id.cyan(), name.bold(), description);
    }
}

pub fn print_addresses(addresses: &[Address]) {
    if addresses.is_empty() {
        println!("{}", "no matching addresses".yellow());
        return;
    }

    for address in addresses {
        let ip = address.public_ip().unwrap_or("-");
        let allocation = address.allocation_id().unwrap_or("-");
        let instance = address.instance_id().unwrap_or("unassociated");

        println!("{}  {}  {}", ip.cyan(), allocation, instance);
    }
}

fn render_state(state: &str) -> ColoredString {
    match state {
        "running" => state.green(),
        "stopped" | "stopping" | "shutting-down" | "terminated" => state.red(),
        _ => state.yellow(),
    }
}
