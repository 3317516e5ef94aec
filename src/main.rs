use heartbeat_cluster::follower::identity::{IdentityStore, DEFAULT_IDENTITY_PATH};
use heartbeat_cluster::follower::service::FollowerService;
use heartbeat_cluster::follower::types::FollowerExit;
use heartbeat_cluster::leader::service::{LeaderService, DEFAULT_LEADER_PORT};
use heartbeat_cluster::peer::config::{
    self, DEFAULT_CONFIG_PATH, DEFAULT_LOCAL_CONFIG_PATH,
};
use heartbeat_cluster::peer::service::PeerService;

use anyhow::{bail, Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(-1);
    }

    let result = match args[1].as_str() {
        "server" => run_server(&args).await,
        "client" => run_client(&args).await,
        "peer" => run_peer(&args).await,
        "peer-local" => run_peer_local(&args).await,
        other => {
            eprintln!("Unknown role: {}", other);
            usage(&args[0]);
            std::process::exit(-1);
        }
    };

    if let Err(e) = result {
        eprintln!("fatal: {:#}", e);
        std::process::exit(-1);
    }
}

fn usage(program: &str) {
    eprintln!("Usage: {} server <port>", program);
    eprintln!("       {} client <server-addr> <server-port>", program);
    eprintln!("       {} peer <self-addr> [config-path]", program);
    eprintln!("       {} peer-local <self-port> [config-path]", program);
}

fn parse_arg<T: std::str::FromStr>(value: &str, what: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", what, value, e))
}

/// Runs a service future until it finishes or the process is interrupted.
/// Dropping the future on ctrl-c cancels any active timer or wait.
async fn until_shutdown<F>(service: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    tokio::select! {
        result = service => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}

async fn run_server(args: &[String]) -> Result<()> {
    if args.len() != 3 {
        bail!("server role takes exactly one argument: <port>");
    }
    let port: u16 = parse_arg(&args[2], "port")?;

    let leader = LeaderService::bind(port).await?;
    until_shutdown(leader.run()).await
}

async fn run_client(args: &[String]) -> Result<()> {
    if args.len() != 4 {
        bail!("client role takes exactly two arguments: <server-addr> <server-port>");
    }
    let address: IpAddr = parse_arg(&args[2], "server address")?;
    let port: u16 = parse_arg(&args[3], "server port")?;
    let leader_addr = SocketAddr::new(address, port);

    until_shutdown(drive_client(leader_addr)).await
}

/// The follower loop, switching the process into the leader role if this
/// node wins promotion.
async fn drive_client(leader_addr: SocketAddr) -> Result<()> {
    let identity = IdentityStore::new(DEFAULT_IDENTITY_PATH);
    let follower = FollowerService::connect(leader_addr, identity).await?;

    match follower.run().await? {
        FollowerExit::Promoted => {
            let leader = LeaderService::bind(DEFAULT_LEADER_PORT).await?;
            leader.run().await
        }
    }
}

async fn run_peer(args: &[String]) -> Result<()> {
    if args.len() < 3 || args.len() > 4 {
        bail!("peer role takes <self-addr> [config-path]");
    }
    let self_addr: IpAddr = parse_arg(&args[2], "self address")?;
    let config_path = args.get(3).map(String::as_str).unwrap_or(DEFAULT_CONFIG_PATH);

    let peers = config::load_peer_addresses(Path::new(config_path))?;
    let self_index = config::position_of_address(&peers, self_addr)
        .with_context(|| format!("address {} not present in {}", self_addr, config_path))?;

    let peer = PeerService::bind(peers, self_index).await?;
    until_shutdown(peer.run()).await
}

async fn run_peer_local(args: &[String]) -> Result<()> {
    if args.len() < 3 || args.len() > 4 {
        bail!("peer-local role takes <self-port> [config-path]");
    }
    let self_port: u16 = parse_arg(&args[2], "self port")?;
    let config_path = args
        .get(3)
        .map(String::as_str)
        .unwrap_or(DEFAULT_LOCAL_CONFIG_PATH);

    let peers = config::load_peer_addresses_local(Path::new(config_path))?;
    let self_index = config::position_of_port(&peers, self_port)
        .with_context(|| format!("port {} not present in {}", self_port, config_path))?;

    let peer = PeerService::bind(peers, self_index).await?;
    until_shutdown(peer.run()).await
}
