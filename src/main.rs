use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use meshuart::{MeshConfig, MeshResult, MeshUart, UartConfig};
use meshuart_shared::timing;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Drive a mesh gateway over its serial port.
#[derive(Parser, Debug)]
#[command(name = "meshuart")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial device of the gateway.
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Baud rate.
    #[arg(short, long, default_value_t = meshuart::transport::DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Seconds to wait for the port to open.
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Switch a stone fully on.
    On { stone_id: u8 },
    /// Switch a stone off.
    Off { stone_id: u8 },
    /// Set a stone to a state between 0.0 and 1.0.
    Dim { stone_id: u8, state: f64 },
    /// Broadcast the time; defaults to now.
    SetTime { timestamp: Option<u32> },
    /// Broadcast a no-op.
    NoOp,
    /// Store an iBeacon UUID on a stone.
    IbeaconUuid {
        stone_id: u8,
        uuid: String,
        #[arg(long, default_value_t = 0)]
        index: u8,
    },
    /// Store an iBeacon major on a stone.
    IbeaconMajor {
        stone_id: u8,
        major: u16,
        #[arg(long, default_value_t = 0)]
        index: u8,
    },
    /// Store an iBeacon minor on a stone.
    IbeaconMinor {
        stone_id: u8,
        minor: u16,
        #[arg(long, default_value_t = 0)]
        index: u8,
    },
    /// Activate an iBeacon payload periodically.
    Alternate {
        #[arg(long, value_delimiter = ',', required = true)]
        stones: Vec<u8>,
        #[arg(long)]
        index: u8,
        #[arg(long)]
        interval: u16,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Stop alternating payload INDEX; the other payload stays active.
    StopAlternate {
        #[arg(long, value_delimiter = ',', required = true)]
        stones: Vec<u8>,
        #[arg(long)]
        index: u8,
    },
    /// Microapp management on the gateway itself.
    Microapp {
        #[command(subcommand)]
        command: MicroappCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MicroappCommand {
    /// Show microapp capabilities.
    Info,
    /// Upload a microapp binary.
    Upload {
        path: PathBuf,
        #[arg(long, default_value_t = 0)]
        index: u8,
        #[arg(long, default_value_t = 0)]
        protocol: u8,
        #[arg(long, default_value_t = timing::MICROAPP_CHUNK_SIZE)]
        chunk_size: usize,
    },
    Validate {
        #[arg(long, default_value_t = 0)]
        index: u8,
        #[arg(long, default_value_t = 0)]
        protocol: u8,
    },
    Enable {
        #[arg(long, default_value_t = 0)]
        index: u8,
        #[arg(long, default_value_t = 0)]
        protocol: u8,
    },
    Disable {
        #[arg(long, default_value_t = 0)]
        index: u8,
        #[arg(long, default_value_t = 0)]
        protocol: u8,
    },
    Remove {
        #[arg(long, default_value_t = 0)]
        index: u8,
        #[arg(long, default_value_t = 0)]
        protocol: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let config = UartConfig {
        port: args.port.clone(),
        baud_rate: args.baud,
        ..Default::default()
    };
    info!("Opening gateway on {} at {} baud", config.port, config.baud_rate);

    let uart = MeshUart::start(config, MeshConfig::default());
    uart.connection()
        .wait_connected(Duration::from_secs(args.connect_timeout))
        .await
        .with_context(|| format!("Could not open {}", args.port))?;

    run(&uart, args.command).await?;

    // Let the last frame leave the outbound queue
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}

async fn run(uart: &MeshUart, command: Command) -> Result<()> {
    let mesh = uart.mesh();
    match command {
        Command::On { stone_id } => mesh.turn_on(stone_id).await?,
        Command::Off { stone_id } => mesh.turn_off(stone_id).await?,
        Command::Dim { stone_id, state } => mesh.set_switch_state(stone_id, state).await?,
        Command::SetTime { timestamp } => mesh.set_time(timestamp).await?,
        Command::NoOp => mesh.send_no_op().await?,
        Command::IbeaconUuid { stone_id, uuid, index } => {
            report(&mesh.set_ibeacon_uuid(stone_id, &uuid, index).await?)
        }
        Command::IbeaconMajor { stone_id, major, index } => {
            report(&mesh.set_ibeacon_major(stone_id, major, index).await?)
        }
        Command::IbeaconMinor { stone_id, minor, index } => {
            report(&mesh.set_ibeacon_minor(stone_id, minor, index).await?)
        }
        Command::Alternate {
            stones,
            index,
            interval,
            offset,
        } => report(
            &mesh
                .periodically_activate_ibeacon_index(&stones, index, interval, offset)
                .await?,
        ),
        Command::StopAlternate { stones, index } => {
            report(&mesh.stop_ibeacon_interval_and_set_index(&stones, index).await?)
        }
        Command::Microapp { command } => run_microapp(uart, command).await?,
    }
    Ok(())
}

async fn run_microapp(uart: &MeshUart, command: MicroappCommand) -> Result<()> {
    let microapp = uart.microapp();
    match command {
        MicroappCommand::Info => {
            let info = microapp.get_microapp_info().await?;
            println!("{:#?}", info);
        }
        MicroappCommand::Upload {
            path,
            index,
            protocol,
            chunk_size,
        } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            microapp.upload_microapp(&data, index, protocol, chunk_size).await?;
            info!("Uploaded {} bytes into slot {}", data.len(), index);
        }
        MicroappCommand::Validate { index, protocol } => {
            println!("{:?}", microapp.validate_microapp(index, protocol).await?);
        }
        MicroappCommand::Enable { index, protocol } => {
            println!("{:?}", microapp.enable_microapp(index, protocol).await?);
        }
        MicroappCommand::Disable { index, protocol } => {
            println!("{:?}", microapp.disable_microapp(index, protocol).await?);
        }
        MicroappCommand::Remove { index, protocol } => {
            microapp.remove_microapp(index, protocol).await?;
        }
    }
    Ok(())
}

fn report(result: &MeshResult) {
    for (stone_id, acked) in result.acks() {
        println!("stone {:>3}: {}", stone_id, if acked { "ok" } else { "no ack" });
    }
    match result.final_ack() {
        Some(true) => println!("gateway: success"),
        Some(false) => println!("gateway: failed"),
        None => warn!("No final acknowledgment from the gateway"),
    }
}
