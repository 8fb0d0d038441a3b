//! Improv provisioning tool
//!
//! Talks to an Improv device over a serial port (or TCP) to query it and
//! send WiFi credentials. `improv simulate` runs a stand-in device.

mod host;
mod link;
mod simulate;

use clap::{Args, Parser, Subcommand};
use host::Host;
use link::Target;
use log::*;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "improv")]
#[command(about = "Provision WiFi on devices speaking the Improv serial protocol")]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LinkArgs {
    /// Serial device, e.g. /dev/ttyUSB0
    #[arg(short, long, env = "IMPROV_PORT", global = true)]
    port: Option<String>,
    /// Serial baud rate
    #[arg(short, long, default_value = "115200", global = true)]
    baud: u32,
    /// Device address over TCP, e.g. 127.0.0.1:5555 for `improv simulate`
    #[arg(long, env = "IMPROV_TCP", global = true)]
    tcp: Option<String>,
    /// Seconds to wait for each reply from the device
    #[arg(short, long, default_value = "30", global = true)]
    timeout: u64,
}

impl LinkArgs {
    fn target(&self) -> Result<Target, Box<dyn std::error::Error>> {
        match (&self.port, &self.tcp) {
            (Some(path), None) => Ok(Target::Serial { path: path.clone(), baud: self.baud }),
            (None, Some(addr)) => Ok(Target::Tcp(addr.clone())),
            (Some(path), Some(_)) => {
                warn!("Both --port and --tcp provided, using --port");
                Ok(Target::Serial { path: path.clone(), baud: self.baud })
            }
            (None, None) => Err("Either --port or --tcp must be provided".into()),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the device's provisioning state
    State,
    /// Show firmware and hardware details
    Info,
    /// List WiFi networks the device can see
    Scan,
    /// Send WiFi credentials to a device
    Provision {
        /// Network name
        #[arg(short, long, requires = "password", conflicts_with = "file")]
        ssid: Option<String>,
        /// Network password
        #[arg(long, requires = "ssid")]
        password: Option<String>,
        /// WiFi credentials file (SSID on line 1, password on line 2)
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Run a simulated device on a TCP port
    Simulate {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:5555")]
        listen: String,
        /// Scenario file (device info, session settings, visible networks)
        #[arg(long)]
        scenario: Option<String>,
        /// Keep provisioned credentials in this JSON file
        #[arg(long)]
        store: Option<PathBuf>,
        /// Forget stored credentials before starting
        #[arg(long, requires = "store")]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { listen, scenario, store, reset } => {
            let scenario = match scenario {
                Some(path) => simulate::Scenario::load(&path)?,
                None => simulate::Scenario::default(),
            };
            tokio::task::spawn_blocking(move || simulate::run(&listen, scenario, store, reset)).await??;
        }
        command => run_host(&cli.link, command).await?,
    }

    Ok(())
}

async fn run_host(link: &LinkArgs, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let target = link.target()?;
    let (reader, writer) = link::open(&target).await?;
    let mut host = Host::new(reader, writer, Duration::from_secs(link.timeout));

    match command {
        Commands::State => {
            let (state, url) = host.current_state().await?;
            println!("State: {}", state);
            if let Some(url) = url {
                println!("URL:   {}", url);
            }
        }
        Commands::Info => {
            let info = host.device_info().await?;
            for (label, value) in ["Firmware", "Version", "Chip", "Name"].iter().zip(&info) {
                println!("{:<9} {}", format!("{}:", label), value);
            }
        }
        Commands::Scan => {
            let networks = host.scan().await?;
            println!("Found {} networks:", networks.len());
            for n in networks {
                let lock = if n.secured { " [secured]" } else { "" };
                println!("  {} RSSI: {} dBm{}", n.ssid, n.rssi, lock);
            }
        }
        Commands::Provision { ssid, password, file } => {
            let (ssid, password) = match (ssid, password, file) {
                (Some(ssid), Some(password), _) => (ssid, password),
                (_, _, Some(file)) => read_wifi_credentials(&file)?,
                _ => read_wifi_credentials("wifi_credentials.txt")?,
            };
            println!("Sending WiFi credentials...");
            println!("  SSID: {}", ssid);
            let url = host.provision(&ssid, &password).await?;
            println!("Device connected to '{}'", ssid);
            if !url.is_empty() {
                println!("Continue setup at {}", url);
            }
        }
        Commands::Simulate { .. } => return Err("simulate does not talk to a device".into()),
    }

    Ok(())
}

fn read_wifi_credentials(file: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    parse_wifi_credentials(&content)
}

fn parse_wifi_credentials(content: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let mut lines = content.lines();
    let ssid = lines.next().ok_or("Missing SSID in credentials file")?.trim().to_string();
    let password = lines.next().ok_or("Missing password in credentials file")?.trim().to_string();
    if ssid.is_empty() {
        return Err("Empty SSID in credentials file".into());
    }
    Ok((ssid, password))
}
