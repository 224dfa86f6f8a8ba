//! TensorDock CLI - manage TensorDock GPU/CPU servers from the terminal.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tensordock::config::default_config_path;
use tensordock::{
    Config, ConfigFile, ConfigOverrides, DeploySpec, ModifySpec, ServerRecord, TensorDock,
};

/// TensorDock CLI - deploy and manage TensorDock servers.
#[derive(Parser)]
#[command(name = "tensordock")]
#[command(about = "Deploy and manage TensorDock GPU/CPU servers", version)]
struct Cli {
    /// Config file (default is `$HOME/.tensordock.yml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// API key (or set `TENSORDOCK_API_KEY` env var).
    #[arg(long, env = "TENSORDOCK_API_KEY")]
    api_key: Option<String>,

    /// API token (or set `TENSORDOCK_API_TOKEN` env var).
    #[arg(long, env = "TENSORDOCK_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// API base URL (or set `TENSORDOCK_SERVICE_URL` env var).
    #[arg(long, env = "TENSORDOCK_SERVICE_URL")]
    service_url: Option<String>,

    /// Log raw API requests and responses.
    #[arg(long, env = "TENSORDOCK_DEBUG", default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage servers.
    #[command(subcommand)]
    Servers(ServersCommand),

    /// Query stock.
    #[command(subcommand)]
    Stock(StockCommand),

    /// Show billing details.
    Billing,

    /// Save API key/token to the config file.
    Config {
        /// API key.
        #[arg(long)]
        api_key: String,

        /// API token.
        #[arg(long)]
        api_token: String,

        /// API base URL.
        #[arg(long)]
        service_url: Option<String>,
    },
}

impl Commands {
    /// Whether the command calls authenticated endpoints.
    fn needs_credentials(&self) -> bool {
        matches!(self, Self::Servers(_) | Self::Billing)
    }
}

#[derive(Subcommand)]
enum ServersCommand {
    /// List servers.
    List,

    /// Get server info.
    Info {
        /// Server ID.
        server_id: String,
    },

    /// Start a server.
    Start {
        /// Server ID.
        server_id: String,
    },

    /// Stop a server.
    Stop {
        /// Server ID.
        server_id: String,
    },

    /// Restart a server.
    Restart {
        /// Server ID.
        server_id: String,
    },

    /// Delete a server.
    Delete {
        /// Server ID.
        server_id: String,
    },

    /// Deploy a server.
    Deploy {
        /// Server name.
        name: String,

        /// Admin user name.
        admin_user: String,

        /// Admin password.
        admin_pass: String,

        /// Either "gpu" or "cpu".
        #[arg(long, default_value = "gpu")]
        instance_type: String,

        /// GPU model to provision.
        #[arg(long, default_value = "Quadro_4000")]
        gpu_model: String,

        /// Number of GPUs of the chosen model.
        #[arg(long, default_value = "1")]
        gpu_count: u32,

        /// CPU model to provision.
        #[arg(long, default_value = "Intel_Xeon_v4")]
        cpu_model: String,

        /// Number of vCPUs.
        #[arg(long, default_value = "2")]
        vcpus: u32,

        /// GB of RAM.
        #[arg(long, default_value = "4")]
        ram: u32,

        /// GB of networked storage.
        #[arg(long, default_value = "20")]
        storage: u32,

        /// Storage class: io1 or st1.
        #[arg(long, default_value = "io1")]
        storage_class: String,

        /// Operating system.
        #[arg(long, default_value = "Ubuntu 20.04 LTS")]
        os: String,

        /// Location.
        #[arg(long, default_value = "na-us-chi-1")]
        location: String,
    },

    /// Modify a server's hardware.
    ///
    /// The API expects the full configuration on every call, so fields not
    /// given here are filled from the server's current configuration unless
    /// `--partial` is set.
    Modify {
        /// Server ID.
        server_id: String,

        /// Either "gpu" or "cpu".
        #[arg(long)]
        instance_type: Option<String>,

        /// GPU model.
        #[arg(long)]
        gpu_model: Option<String>,

        /// Number of GPUs.
        #[arg(long)]
        gpu_count: Option<u32>,

        /// CPU model.
        #[arg(long)]
        cpu_model: Option<String>,

        /// Number of vCPUs.
        #[arg(long)]
        vcpus: Option<u32>,

        /// GB of RAM.
        #[arg(long)]
        ram: Option<u32>,

        /// GB of storage.
        #[arg(long)]
        storage: Option<u32>,

        /// Send only the given fields.
        #[arg(long, default_value = "false")]
        partial: bool,
    },

    /// Get server deployment status.
    Status {
        /// Server ID.
        server_id: String,
    },

    /// Open the server management panel in a browser.
    Manage {
        /// Server ID.
        server_id: String,
    },

    /// Launch an SSH session with a server.
    Ssh {
        /// Server ID.
        server_id: String,

        /// SSH client executable (e.g. ssh, mosh).
        #[arg(long, default_value = "ssh")]
        bin: String,

        /// User account to log in as.
        #[arg(long, default_value = "user")]
        user: String,

        /// Extra flags passed to the SSH client.
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        extra_flags: String,
    },
}

#[derive(Subcommand)]
enum StockCommand {
    /// List stock.
    List {
        /// Instance type: gpu or cpu.
        #[arg(long = "type", default_value = "gpu")]
        instance_type: String,

        /// Include out-of-stock entries.
        #[arg(long, default_value = "false")]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => default_config_path().context("Could not determine home directory")?,
    };
    let file = ConfigFile::load(&config_path).context("Failed to load config file")?;

    let config = Config::resolve(
        ConfigOverrides {
            api_key: cli.api_key.clone(),
            api_token: cli.api_token.clone(),
            service_url: cli.service_url.clone(),
            debug: cli.debug,
        },
        file.clone(),
    );

    // Initialize logging
    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if file.is_none() {
        warn!(path = %config_path.display(), "config file not found");
    }

    if cli.command.needs_credentials() && config.credentials.is_incomplete() {
        warn!("API key or token not configured, run `tensordock config` first");
    }

    match cli.command {
        Commands::Config {
            api_key,
            api_token,
            service_url,
        } => {
            let mut file = file.unwrap_or_default();
            file.api_key = Some(api_key);
            file.api_token = Some(api_token);
            if service_url.is_some() {
                file.service_url = service_url;
            }
            file.save(&config_path)
                .context("Failed to write config file")?;
            info!(path = %config_path.display(), "config updated");
        }

        Commands::Servers(command) => {
            let client =
                TensorDock::from_config(&config).context("Failed to create TensorDock client")?;
            run_servers(&client, command).await?;
        }

        Commands::Billing => {
            let client =
                TensorDock::from_config(&config).context("Failed to create TensorDock client")?;
            let billing = client.billing().await?;
            println!("Balance: {}", billing.details.balance);
            println!("Hourly Spending Rate: {}", billing.details.hourly_spending_rate);
        }

        Commands::Stock(StockCommand::List { instance_type, all }) => {
            let client =
                TensorDock::from_config(&config).context("Failed to create TensorDock client")?;
            list_stock(&client, &instance_type, all).await?;
        }
    }

    Ok(())
}

async fn run_servers(client: &TensorDock, command: ServersCommand) -> Result<()> {
    match command {
        ServersCommand::List => {
            let response = client.list_servers().await?;

            let mut table = new_table(&["Id", "Name", "Location", "Status"]);
            for server in response.servers.values() {
                table.add_row(vec![
                    Cell::new(&server.id),
                    Cell::new(&server.name),
                    Cell::new(&server.location),
                    Cell::new(&server.status).fg(status_color(&server.status)),
                ]);
            }
            println!("{table}");
        }

        ServersCommand::Info { server_id } => {
            let response = client.get_server(&server_id).await?;
            println!("{}", server_table(&response.server));
        }

        ServersCommand::Start { server_id } => {
            client.start_server(&server_id).await?;
            info!("success");
        }

        ServersCommand::Stop { server_id } => {
            client.stop_server(&server_id).await?;
            info!("success");
        }

        ServersCommand::Restart { server_id } => {
            client.restart_server(&server_id).await?;
            info!("success");
        }

        ServersCommand::Delete { server_id } => {
            client.delete_server(&server_id).await?;
            info!("success");
        }

        ServersCommand::Deploy {
            name,
            admin_user,
            admin_pass,
            instance_type,
            gpu_model,
            gpu_count,
            cpu_model,
            vcpus,
            ram,
            storage,
            storage_class,
            os,
            location,
        } => {
            let spec = DeploySpec {
                name,
                admin_user,
                admin_pass,
                instance_type,
                gpu_model,
                gpu_count,
                cpu_model,
                vcpus,
                ram,
                storage,
                storage_class,
                os,
                location,
            };

            let response = client.deploy_server(&spec).await?;
            println!("{}", response.server.id);
            info!("success");
        }

        ServersCommand::Modify {
            server_id,
            instance_type,
            gpu_model,
            gpu_count,
            cpu_model,
            vcpus,
            ram,
            storage,
            partial,
        } => {
            let mut spec = ModifySpec {
                instance_type,
                gpu_model,
                gpu_count,
                cpu_model,
                vcpus,
                ram,
                storage,
            };

            if !partial {
                let current = client.get_server(&server_id).await?;
                spec = spec.restate(&current.server);
            }

            client.modify_server(&server_id, &spec).await?;
            info!("success");
        }

        ServersCommand::Status { server_id } => {
            let response = client.server_status(&server_id).await?;
            println!("{}", response.status);
        }

        ServersCommand::Manage { server_id } => {
            let response = client.get_server(&server_id).await?;
            let url = response
                .server
                .dashboard_url()
                .with_context(|| format!("Server {server_id} has no dashboard link"))?;
            webbrowser::open(url).with_context(|| format!("Failed to open {url}"))?;
        }

        ServersCommand::Ssh {
            server_id,
            bin,
            user,
            extra_flags,
        } => {
            let response = client.get_server(&server_id).await?;
            let target = format!("{user}@{}", response.server.ip);

            let status = Command::new(&bin)
                .arg(&target)
                .args(extra_flags.split_whitespace())
                .status()
                .with_context(|| format!("Failed to run `{bin}`"))?;

            if !status.success() {
                anyhow::bail!("`{bin} {target}` exited with {status}");
            }
        }
    }

    Ok(())
}

async fn list_stock(client: &TensorDock, instance_type: &str, all: bool) -> Result<()> {
    let table = match instance_type {
        "gpu" => {
            let response = client.gpu_stock().await?;
            let mut table = new_table(&["GPU", "Region", "Available Now", "Available Reserve"]);
            for (model, regions) in &response.stock {
                for (region, stock) in regions {
                    if stock.in_stock() || all {
                        table.add_row(vec![
                            model.clone(),
                            region.clone(),
                            stock.available_now.to_string(),
                            stock.available_reserve.to_string(),
                        ]);
                    }
                }
            }
            table
        }
        "cpu" => {
            let response = client.cpu_stock().await?;
            let mut table = new_table(&["CPU Model", "Region", "Available Now"]);
            for (model, regions) in &response.stock {
                for (region, stock) in regions {
                    if stock.in_stock() || all {
                        table.add_row(vec![
                            model.clone(),
                            region.clone(),
                            stock.available_now.clone(),
                        ]);
                    }
                }
            }
            table
        }
        other => anyhow::bail!("unknown instance type: {other:?}"),
    };

    println!("{table}");
    Ok(())
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        header
            .iter()
            .map(|title| Cell::new(title).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );
    table
}

fn status_color(status: &str) -> Color {
    match status {
        "running" => Color::Green,
        "stopped" => Color::Red,
        "deploying" | "pending" => Color::Yellow,
        _ => Color::White,
    }
}

fn server_table(server: &ServerRecord) -> Table {
    let optional = |value: Option<&String>| value.cloned().unwrap_or_default();
    let rows = [
        ("ID", server.id.clone()),
        ("Name", server.name.clone()),
        ("Location", server.location.clone()),
        ("IP", server.ip.clone()),
        ("Charged Cost", server.cost.charged.to_string()),
        ("Hour-On Cost", server.cost.hour_on.to_string()),
        ("Hour-Off Cost", server.cost.hour_off.to_string()),
        ("Minutes-On", server.cost.minutes_on.to_string()),
        ("Minutes-Off", server.cost.minutes_off.to_string()),
        ("CPU Model", optional(server.cpu_model.as_ref())),
        (
            "GPU Count",
            server.gpu_count.map(|c| c.to_string()).unwrap_or_default(),
        ),
        ("GPU Model", optional(server.gpu_model.as_ref())),
        ("RAM", format!("{}GB", server.ram)),
        ("Status", server.status.clone()),
        ("Storage", format!("{}GB", server.storage)),
        ("Storage Class", server.storage_class.clone()),
        ("Type", server.instance_type.clone()),
        ("vCPUs", server.vcpus.to_string()),
    ];

    let mut table = new_table(&["Property", "Value"]);
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> Commands {
        let argv = std::iter::once("tensordock").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_authenticated_commands_need_credentials() {
        assert!(command(&["billing"]).needs_credentials());
        assert!(command(&["servers", "list"]).needs_credentials());
        assert!(command(&["servers", "status", "srv1"]).needs_credentials());
    }

    #[test]
    fn test_public_commands_skip_credentials() {
        assert!(!command(&["stock", "list", "--type", "cpu"]).needs_credentials());
        assert!(!command(&["config", "--api-key", "k", "--api-token", "t"]).needs_credentials());
    }
}
