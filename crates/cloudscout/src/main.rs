mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cloudscout_ec2::{AwsOptions, Ec2, Filter, load_sdk_config};

#[derive(Parser)]
#[command(name = "cloudscout")]
#[command(about = "Enumerate and filter EC2 inventory", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    aws: AwsArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AwsArgs {
    /// AWS profile from the shared config files
    #[arg(long, env = "AWS_PROFILE", global = true)]
    profile: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION", global = true)]
    region: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List instances matching the given filters
    Instances {
        /// Filter term, `key=value` or a bare tag value; repeatable
        #[arg(short, long = "filter")]
        filters: Vec<String>,
        /// Explicit instance id; repeatable (skips filters)
        #[arg(long = "id")]
        ids: Vec<String>,
    },
    /// List EBS volumes matching the given filters
    Volumes {
        /// Filter term, `key=value` or a bare tag value; repeatable
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },
    /// Look up security groups by group name
    SecurityGroups {
        /// Security group name
        name: String,
    },
    /// Look up Elastic IPs by public IP
    Addresses {
        /// Public IP to look for
        ip: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = load_sdk_config(&AwsOptions {
        profile: cli.aws.profile.clone(),
        region: cli.aws.region.clone(),
    })
    .await;
    let ec2 = Ec2::new(&config)?;

    match cli.command {
        Commands::Instances { filters, ids } => {
            let instances = if ids.is_empty() {
                ec2.find_instances(&Filter::from_terms(&filters)).await?
            } else {
                ec2.find_instances_by_id(ids).await?
            };
            output::print_instances(&instances);
        }
        Commands::Volumes { filters } => {
            let volumes = ec2.find_volumes(&Filter::from_terms(&filters)).await?;
            output::print_volumes(&volumes);
        }
        Commands::SecurityGroups { name } => {
            let groups = ec2.find_security_groups(&name).await?;
            output::print_security_groups(&groups);
        }
        Commands::Addresses { ip } => {
            let addresses = ec2.find_addresses(&ip).await?;
            output::print_addresses(&addresses);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn instances_accepts_repeated_filters() {
        let cli = Cli::parse_from([
            "cloudscout",
            "instances",
            "-f",
            "instance-state-name=running",
            "-f",
            "tag:Name=cc001.example.net",
        ]);

        match cli.command {
            Commands::Instances { filters, ids } => {
                assert_eq!(filters.len(), 2);
                assert!(ids.is_empty());
            }
            _ => panic!("expected instances subcommand"),
        }
    }

    #[test]
    fn region_flag_is_global() {
        let cli = Cli::parse_from(["cloudscout", "instances", "--region", "us-west-2"]);

        assert_eq!(cli.aws.region.as_deref(), Some("us-west-2"));
    }
}
