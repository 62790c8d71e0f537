//! `orgcp`: mirror an organization's control-policy attachments on disk
//! and turn the mirror back into an infrastructure manifest.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use orgcp_mirror::{MirrorConfig, PolicyType};

/// Control policy mirror tool.
#[derive(Parser, Debug)]
#[command(name = "orgcp", about = "Organization control policy mirror")]
struct Cli {
    /// Path to the mirror config file.
    #[arg(long = "config", global = true, default_value = "orgcp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture the organization into the mirror.
    Capture {
        /// Organization snapshot (JSON).
        #[arg(long)]
        org: PathBuf,
        #[arg(long = "policy-type", value_enum, default_value_t = PolicyTypeArg::All)]
        policy_type: PolicyTypeArg,
        /// Only refresh externally managed placeholders.
        #[arg(long)]
        skip_customer_refresh: bool,
        /// Do not write import blocks.
        #[arg(long)]
        skip_imports: bool,
        #[arg(long, default_value = "import_policy_attachments.tf")]
        imports_file: PathBuf,
        #[arg(long, default_value = "import_policies.tf")]
        policy_imports_file: PathBuf,
    },

    /// Resolve the mirror into attachment modules.
    Resolve {
        /// Organization snapshot (JSON).
        #[arg(long)]
        org: PathBuf,
        #[arg(long = "policy-type", value_enum, default_value_t = PolicyTypeArg::All)]
        policy_type: PolicyTypeArg,
        #[arg(long, default_value = "cp_define_attach_auto.tf")]
        output: PathBuf,
        /// Print the attachment maps as JSON instead of writing the manifest.
        #[arg(long)]
        json: bool,
    },

    /// Show version.
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PolicyTypeArg {
    Scp,
    Rcp,
    All,
}

impl PolicyTypeArg {
    fn policy_types(self) -> &'static [PolicyType] {
        match self {
            PolicyTypeArg::Scp => &[PolicyType::ServiceControl],
            PolicyTypeArg::Rcp => &[PolicyType::ResourceControl],
            PolicyTypeArg::All => &PolicyType::ALL,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = MirrorConfig::load(&cli.config)?;

    match cli.command {
        Commands::Capture {
            org,
            policy_type,
            skip_customer_refresh,
            skip_imports,
            imports_file,
            policy_imports_file,
        } => {
            let imports = (!skip_imports).then_some(commands::capture::ImportFiles {
                attachments: imports_file,
                policies: policy_imports_file,
            });
            commands::capture::run(
                &config,
                &org,
                policy_type.policy_types(),
                skip_customer_refresh,
                imports.as_ref(),
            )?;
        }

        Commands::Resolve {
            org,
            policy_type,
            output,
            json,
        } => {
            let target = if json {
                commands::resolve::Output::Json
            } else {
                commands::resolve::Output::Manifest(output)
            };
            commands::resolve::run(&config, &org, policy_type.policy_types(), &target)?;
        }

        Commands::Version => {
            println!("orgcp v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
