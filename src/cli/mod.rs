//! CLI subcommands — bootstrap, push, get, deployment lifecycle.
//!
//! A thin shim over the core: each subcommand marshals its flags into the
//! options the core needs and forwards the result. The bootstrap pipeline
//! (bind, fetch, resolve, assemble, write) lives in `core::assembler`.

use crate::client::http::{self, HttpCatalog, HttpStore};
use crate::client::{self, Store};
use crate::core::assembler;
use crate::core::types::BootstrapOptions;
use anyhow::Result;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve an application into a bootstrap script and write it locally
    Bootstrap {
        /// Catalog base URL
        #[arg(long)]
        address: String,

        /// API key exchanged for a catalog session token
        #[arg(long)]
        apikey: String,

        /// Catalog namespace
        #[arg(short, long)]
        namespace: String,

        /// Application identifier
        #[arg(short, long)]
        application: String,

        /// Deployment identifier
        #[arg(short, long)]
        deployment: String,

        /// Bearer token for the deployment store
        #[arg(long)]
        deployment_token: String,

        /// Store endpoint address (defaults to the catalog address)
        #[arg(long, default_value = "")]
        deployment_address: String,

        /// Run name, used in status keys and the output file name
        #[arg(long)]
        name: Option<String>,

        /// Keep only recipes matching these tags (repeatable; untagged
        /// recipes always match)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Local JSON env file whose entries become export lines
        #[arg(long, default_value = "semilla.env")]
        env_file: PathBuf,

        /// Directory for the generated script
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Store one key/value pair under a deployment
    Push {
        /// Store endpoint address
        #[arg(long)]
        address: String,

        /// Deployment bearer token
        #[arg(long)]
        token: String,

        /// Deployment identifier
        #[arg(short, long)]
        deployment: String,

        key: String,

        value: String,
    },

    /// Read a deployment key, polling until it appears or the timeout
    /// elapses (prints the NotFound sentinel on expiry)
    Get {
        /// Store endpoint address
        #[arg(long)]
        address: String,

        /// Deployment bearer token
        #[arg(long)]
        token: String,

        /// Deployment identifier
        #[arg(short, long)]
        deployment: String,

        key: String,

        /// Poll timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Single read on the legacy deployment path instead of polling
        #[arg(long)]
        no_wait: bool,
    },

    /// Create a deployment (a fresh store scope with its own token)
    CreateDeployment {
        /// Store endpoint address
        #[arg(long)]
        address: String,

        /// User API key
        #[arg(long)]
        apikey: String,
    },

    /// Delete a deployment and its stored keys
    DeleteDeployment {
        /// Store endpoint address
        #[arg(long)]
        address: String,

        /// Deployment bearer token
        #[arg(long)]
        token: String,

        /// Deployment identifier
        #[arg(short, long)]
        deployment: String,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Bootstrap {
            address,
            apikey,
            namespace,
            application,
            deployment,
            deployment_token,
            deployment_address,
            name,
            tags,
            env_file,
            output_dir,
        } => cmd_bootstrap(
            BootstrapOptions {
                url: address,
                apikey,
                namespace,
                application,
                deployment,
                deployment_token,
                deployment_address,
                run_name: name,
                tags,
            },
            &env_file,
            &output_dir,
        ),
        Commands::Push {
            address,
            token,
            deployment,
            key,
            value,
        } => cmd_push(&address, &token, &deployment, &key, &value),
        Commands::Get {
            address,
            token,
            deployment,
            key,
            timeout,
            no_wait,
        } => cmd_get(&address, &token, &deployment, &key, timeout, no_wait),
        Commands::CreateDeployment { address, apikey } => cmd_create_deployment(&address, &apikey),
        Commands::DeleteDeployment {
            address,
            token,
            deployment,
        } => cmd_delete_deployment(&address, &token, &deployment),
    }
}

fn cmd_bootstrap(options: BootstrapOptions, env_file: &Path, output_dir: &Path) -> Result<()> {
    let catalog = HttpCatalog::bind(&options.url, &options.apikey)?;
    let store = HttpStore::new(options.deployment_address(), &options.deployment_token);
    let path = assembler::bootstrap(&catalog, &store, &options, Some(env_file), output_dir)?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_push(address: &str, token: &str, deployment: &str, key: &str, value: &str) -> Result<()> {
    let store = HttpStore::new(address, token);
    store.put(deployment, key, value)?;
    println!("pushed {}", key);
    Ok(())
}

fn cmd_get(
    address: &str,
    token: &str,
    deployment: &str,
    key: &str,
    timeout: u64,
    no_wait: bool,
) -> Result<()> {
    let store = HttpStore::new(address, token);
    let value = if no_wait {
        store.read_once(deployment, key)?
    } else {
        client::poll(&store, deployment, key, Duration::from_secs(timeout))?
    };
    println!("{}", value);
    Ok(())
}

fn cmd_create_deployment(address: &str, apikey: &str) -> Result<()> {
    let deployment = http::create_deployment(address, apikey)?;
    println!("{}", serde_json::to_string_pretty(&deployment)?);
    Ok(())
}

fn cmd_delete_deployment(address: &str, token: &str, deployment: &str) -> Result<()> {
    http::delete_deployment(address, deployment, token)?;
    println!("deployment {} deleted", deployment);
    Ok(())
}
