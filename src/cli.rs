use std::time::Duration;

use clap::{arg, value_parser, ArgMatches, Command};
use log::info;

use crate::config::NodeConfig;
use crate::constants::*;
use crate::message::{Request, Response};
use crate::node::Node;
use crate::server::Server;
use crate::transport;

pub struct Cli {}

impl Cli {
    pub fn new() -> Cli {
        Cli {}
    }

    fn command() -> Command {
        let node_arg = arg!(-n --node <ADDR> "address of the node to talk to")
            .required(false)
            .default_value(DEFAULT_LISTEN_ADDR);
        Command::new("ledger-node")
            .version("0.1")
            .about("proof-of-work ledger node")
            .subcommand_required(true)
            .subcommand(
                Command::new("startnode")
                    .about("start a node and serve requests")
                    .arg(
                        arg!(-l --listen <ADDR> "address to listen on")
                            .required(false)
                            .default_value(DEFAULT_LISTEN_ADDR),
                    )
                    .arg(
                        arg!(-d --difficulty <N> "leading zero hex digits required of a proof")
                            .value_parser(value_parser!(usize))
                            .required(false)
                            .default_value("4"),
                    )
                    .arg(
                        arg!(-r --reward <AMOUNT> "mining reward per block")
                            .value_parser(value_parser!(i64))
                            .required(false)
                            .default_value("1"),
                    )
                    .arg(
                        arg!(--"peer-timeout" <MS> "timeout for a peer chain fetch in milliseconds")
                            .value_parser(value_parser!(u64))
                            .required(false)
                            .default_value("5000"),
                    )
                    .arg(arg!(--"node-id" <ID> "identifier credited with mining rewards").required(false))
                    .arg(arg!(-p --peer <ADDR> ... "peer to register at start-up").required(false)),
            )
            .subcommand(
                Command::new("chain")
                    .about("print the node's chain")
                    .arg(node_arg.clone()),
            )
            .subcommand(
                Command::new("send")
                    .about("submit a transaction")
                    .arg(arg!(<FROM> "sender address"))
                    .arg(arg!(<TO> "recipient address"))
                    .arg(arg!(<AMOUNT> "amount to send").value_parser(value_parser!(i64)))
                    .arg(node_arg.clone()),
            )
            .subcommand(
                Command::new("mine")
                    .about("mine a block on the node")
                    .arg(node_arg.clone()),
            )
            .subcommand(
                Command::new("register")
                    .about("register peers with the node")
                    .arg(arg!(<PEERS> ... "peer addresses, e.g. http://127.0.0.1:5001"))
                    .arg(node_arg.clone()),
            )
            .subcommand(
                Command::new("resolve")
                    .about("run longest-chain reconciliation on the node")
                    .arg(node_arg),
            )
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let matches = Self::command().get_matches();
        match matches.subcommand() {
            Some(("startnode", sub)) => cmd_start_node(sub).await,
            Some(("chain", sub)) => cmd_request(sub, Request::Chain).await,
            Some(("send", sub)) => {
                let from = required::<String>(sub, "FROM")?;
                let to = required::<String>(sub, "TO")?;
                let amount = required::<i64>(sub, "AMOUNT")?;
                cmd_request(sub, Request::new_transaction(&from, &to, amount)).await
            }
            Some(("mine", sub)) => cmd_request(sub, Request::Mine).await,
            Some(("register", sub)) => {
                let nodes: Vec<String> = sub
                    .get_many::<String>("PEERS")
                    .map(|peers| peers.cloned().collect())
                    .unwrap_or_default();
                cmd_request(sub, Request::RegisterNodes { nodes: Some(nodes) }).await
            }
            Some(("resolve", sub)) => cmd_request(sub, Request::Resolve).await,
            _ => Err("unknown command".into()),
        }
    }
}

impl Default for Cli {
    fn default() -> Self {
        Cli::new()
    }
}

fn required<T: Clone + Send + Sync + 'static>(
    matches: &ArgMatches,
    name: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    matches
        .get_one::<T>(name)
        .cloned()
        .ok_or_else(|| format!("missing argument {}", name).into())
}

fn node_config(matches: &ArgMatches) -> Result<NodeConfig, Box<dyn std::error::Error>> {
    let mut config = NodeConfig {
        listen_addr: required::<String>(matches, "listen")?,
        difficulty: required::<usize>(matches, "difficulty")?,
        mining_reward: required::<i64>(matches, "reward")?,
        peer_timeout: Duration::from_millis(required::<u64>(matches, "peer-timeout")?),
        seed_peers: matches
            .get_many::<String>("peer")
            .map(|peers| peers.cloned().collect())
            .unwrap_or_default(),
        ..NodeConfig::default()
    };
    if let Some(id) = matches.get_one::<String>("node-id") {
        config.node_id = id.clone();
    }
    Ok(config)
}

async fn cmd_start_node(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config = node_config(matches)?;
    info!("starting node with {:?}", config);
    let node = Node::new(config)?;
    let server = Server::bind(node).await?;
    server.run().await?;
    Ok(())
}

async fn cmd_request(matches: &ArgMatches, request: Request) -> Result<(), Box<dyn std::error::Error>> {
    let addr = required::<String>(matches, "node")?;
    let response = transport::request(&addr, &request).await?.into_result()?;
    print_response(&response)?;
    Ok(())
}

fn print_response(response: &Response) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_startnode_arguments() {
        let matches = Cli::command()
            .try_get_matches_from([
                "ledger-node",
                "startnode",
                "--listen",
                "127.0.0.1:6000",
                "--difficulty",
                "3",
                "--peer",
                "http://127.0.0.1:6001",
                "--peer",
                "127.0.0.1:6002",
                "--node-id",
                "miner-1",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let config = node_config(sub).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:6000");
        assert_eq!(config.difficulty, 3);
        assert_eq!(config.mining_reward, 1);
        assert_eq!(config.peer_timeout, Duration::from_millis(5000));
        assert_eq!(config.node_id, "miner-1");
        assert_eq!(config.seed_peers.len(), 2);
    }

    #[test]
    fn test_send_requires_numeric_amount() {
        let result = Cli::command().try_get_matches_from(["ledger-node", "send", "alice", "bob", "lots"]);
        assert!(result.is_err());

        let matches = Cli::command()
            .try_get_matches_from(["ledger-node", "send", "alice", "bob", "100"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(required::<i64>(sub, "AMOUNT").unwrap(), 100);
        assert_eq!(required::<String>(sub, "node").unwrap(), "127.0.0.1:5000");
    }
}
