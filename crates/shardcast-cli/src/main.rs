use anyhow::Result;
use argh::FromArgs;
use shardcast_cli::stats::{parse_shard_arg, ShardStatsAction, StatsRequest};
use shardcast_cli::topology_file::TopologyFile;
use shardcast_common::protocol::{ClusterBlock, ClusterBlocks};
use shardcast_common::transport::{HttpTransport, HttpTransportConfig};
use shardcast_coordinator::{Coordinator, StaticTopology};
use shardcast_metrics::{BroadcastMetrics, MetricsCollector};
use shardcast_node::{NodeRouter, NodeServer, NodeServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Block id used for datasets closed from the command line.
const DATASET_CLOSED_BLOCK_ID: u32 = 4;

#[derive(FromArgs)]
/// Shardcast - broadcast-by-node operations over sharded datasets
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Node(NodeArgs),
    Broadcast(BroadcastArgs),
}

/// Arguments for starting a node.
///
/// # Example
///
/// ```bash
/// shardcast node --id node_0 -b 127.0.0.1:9200 --shard logs:0:120 --shard logs:1:80
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "node")]
/// serve the shards held by one node
struct NodeArgs {
    /// node id, as named in the topology file
    #[argh(option)]
    id: String,

    /// address to bind the node's HTTP server to
    ///
    /// Defaults to "0.0.0.0:0" which assigns a random available port.
    /// The actual bound address is logged at startup.
    #[argh(option, short = 'b', default = "\"0.0.0.0:0\".into()")]
    bind: String,

    /// shard held by this node, as dataset:id[:docs]; repeatable
    #[argh(option, long = "shard")]
    shards: Vec<String>,

    /// largest accepted request body in bytes
    #[argh(option, long = "max-body-bytes", default = "16 * 1024 * 1024")]
    max_body_bytes: usize,
}

/// Arguments for a single broadcast.
///
/// Prints the aggregated result as JSON on stdout.
///
/// # Example
///
/// ```bash
/// shardcast broadcast -t topology.json -d logs --timeout-ms 5000
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "broadcast")]
/// run the shard-stats operation on every targeted shard
struct BroadcastArgs {
    /// path to the topology JSON file
    #[argh(option, short = 't')]
    topology: String,

    /// dataset to target; repeatable, none targets every dataset
    #[argh(option, short = 'd', long = "dataset")]
    datasets: Vec<String>,

    /// per-node request timeout in milliseconds
    #[argh(option, long = "timeout-ms", default = "30000")]
    timeout_ms: u64,

    /// dataset to treat as closed; repeatable
    #[argh(option, long = "block")]
    blocked: Vec<String>,

    /// print the coordinator metrics snapshot to stderr after the result
    #[argh(switch)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Keep stdout clean for the broadcast result.
    if !matches!(cli.command, Commands::Broadcast(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Node(args) => run_node(args).await,
        Commands::Broadcast(args) => run_broadcast(args).await,
    }
}

async fn run_node(args: NodeArgs) -> Result<()> {
    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", args.bind, e))?;

    let mut action = ShardStatsAction::new();
    for arg in &args.shards {
        let (shard_id, docs) = parse_shard_arg(arg)?;
        action = action.with_shard(shard_id, docs);
    }
    tracing::info!("Node [{}] holds {} shard(s)", args.id, action.shard_count());

    let mut router = NodeRouter::new(args.id);
    router.register_action(Arc::new(action));

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;
    let server = NodeServer::with_config(
        router,
        NodeServerConfig {
            max_body_bytes: args.max_body_bytes,
        },
    );
    server
        .serve(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn run_broadcast(args: BroadcastArgs) -> Result<()> {
    let topology = TopologyFile::load(&args.topology)?;

    let transport = HttpTransport::with_nodes(
        HttpTransportConfig {
            request_timeout: Duration::from_millis(args.timeout_ms),
        },
        topology.node_urls(),
    );

    let mut blocks = ClusterBlocks::new();
    for dataset in &args.blocked {
        blocks.add_dataset_block(dataset.clone(), ClusterBlock::all_levels(DATASET_CLOSED_BLOCK_ID, "dataset closed"));
    }

    let metrics = Arc::new(BroadcastMetrics::new());
    let coordinator = Coordinator::new(
        Arc::new(ShardStatsAction::new().with_blocks(blocks)),
        Arc::new(transport),
        Arc::new(StaticTopology::new(topology.routing_table())),
    )
    .with_metrics(metrics.clone());

    let response = coordinator.execute(StatsRequest { datasets: args.datasets }).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if args.metrics {
        eprintln!("{}", serde_json::to_string_pretty(&metrics.snapshot())?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_node() {
        let args = Cli::from_args(
            &["shardcast"],
            &["node", "--id", "node_0", "-b", "127.0.0.1:9200", "--shard", "logs:0:10", "--shard", "logs:1"],
        )
        .unwrap();
        match args.command {
            Commands::Node(NodeArgs {
                id,
                bind,
                shards,
                max_body_bytes,
            }) => {
                assert_eq!(id, "node_0");
                assert_eq!(bind, "127.0.0.1:9200");
                assert_eq!(shards, vec!["logs:0:10".to_string(), "logs:1".to_string()]);
                assert_eq!(max_body_bytes, 16 * 1024 * 1024);
            }
            _ => panic!("Expected Node command"),
        }
    }

    #[test]
    fn test_cli_parse_node_defaults() {
        let args = Cli::from_args(&["shardcast"], &["node", "--id", "node_0"]).unwrap();
        match args.command {
            Commands::Node(NodeArgs { bind, shards, .. }) => {
                assert_eq!(bind, "0.0.0.0:0");
                assert!(shards.is_empty());
            }
            _ => panic!("Expected Node command"),
        }
    }

    #[test]
    fn test_cli_node_requires_id() {
        assert!(Cli::from_args(&["shardcast"], &["node"]).is_err());
    }

    #[test]
    fn test_cli_parse_broadcast() {
        let args = Cli::from_args(
            &["shardcast"],
            &[
                "broadcast",
                "-t",
                "topology.json",
                "-d",
                "logs",
                "--dataset",
                "metrics",
                "--block",
                "metrics",
                "--metrics",
            ],
        )
        .unwrap();
        match args.command {
            Commands::Broadcast(BroadcastArgs {
                topology,
                datasets,
                timeout_ms,
                blocked,
                metrics,
            }) => {
                assert_eq!(topology, "topology.json");
                assert_eq!(datasets, vec!["logs".to_string(), "metrics".to_string()]);
                assert_eq!(timeout_ms, 30000);
                assert_eq!(blocked, vec!["metrics".to_string()]);
                assert!(metrics);
            }
            _ => panic!("Expected Broadcast command"),
        }
    }

    #[test]
    fn test_cli_parse_broadcast_timeout() {
        let args = Cli::from_args(&["shardcast"], &["broadcast", "-t", "t.json", "--timeout-ms", "250"]).unwrap();
        match args.command {
            Commands::Broadcast(BroadcastArgs {
                timeout_ms, datasets, ..
            }) => {
                assert_eq!(timeout_ms, 250);
                assert!(datasets.is_empty());
            }
            _ => panic!("Expected Broadcast command"),
        }
    }
}
