//! Bitcoin handshake CLI
//!
//! Connects to one peer, exchanges version/verack and disconnects.

use btc_handshake::cli;
use btc_handshake::network::{
    HandshakeConfig, Network, NetworkAddress, ServiceFlags, UnknownCommandPolicy,
};
use clap::Parser;
use rand::Rng;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "btc-handshake")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Perform a Bitcoin P2P handshake with a single peer", long_about = None)]
struct Cli {
    /// Peer host name or IP address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Peer port (defaults to the network's port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Network: mainnet, testnet, regtest or signet
    #[arg(short, long, default_value = "mainnet")]
    network: Network,

    /// Connect timeout in seconds
    #[arg(short, long, default_value = "10")]
    timeout: u64,

    /// Give up on the whole exchange after this many seconds
    #[arg(long)]
    handshake_timeout: Option<u64>,

    /// User agent announced to the peer
    #[arg(long)]
    user_agent: Option<String>,

    /// Start height announced to the peer
    #[arg(long, default_value = "0")]
    start_height: i32,

    /// Version nonce (random when omitted)
    #[arg(long)]
    nonce: Option<u64>,

    /// Unknown commands: reject-until-verack, reject or tolerate
    #[arg(long, default_value = "reject-until-verack")]
    unknown_commands: UnknownCommandPolicy,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let port = cli.port.unwrap_or(cli.network.default_port());
    let addr = format!("{}:{}", cli.host, port);

    let mut config = HandshakeConfig {
        network: cli.network,
        nonce: cli.nonce.unwrap_or_else(|| rand::thread_rng().gen()),
        start_height: cli.start_height,
        unknown_commands: cli.unknown_commands,
        connect_timeout: Duration::from_secs(cli.timeout),
        handshake_timeout: cli.handshake_timeout.map(Duration::from_secs),
        ..Default::default()
    };
    if let Some(user_agent) = cli.user_agent {
        config.user_agent = user_agent;
    }

    // Tell the peer where we think it lives when the name resolves
    if let Some(peer) = resolve(&addr) {
        config.addr_recv = NetworkAddress::new(peer, ServiceFlags::empty());
    }
    config.validate()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(cli::cmd_handshake(&addr, config, cli.json))
}

fn resolve(addr: &str) -> Option<SocketAddr> {
    addr.to_socket_addrs().ok()?.next()
}
