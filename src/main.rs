//! CLI for sosrelay
//!
//! Subcommands:
//! - `node`: run a relay node
//! - `encode` / `decode`: convert between message JSON and the SMS payload
//! - `split`: break long text into channel-sized parts
//! - `keygen`: create a signing key for `keys.signing_key`

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sosrelay::auth::{Ed25519Verifier, MessageSigner};
use sosrelay::codec;
use sosrelay::config::{Settings, load_config};
use sosrelay::message::Message;
use sosrelay::persistence::SledStore;
use sosrelay::relay::{FloodRelay, RelayPolicy};
use sosrelay::transport::{WsTransport, connect_peer, start_peer_server};
use sosrelay::utils::logging;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "sosrelay")]
enum Command {
    /// Run a relay node using config/default.toml and SOSRELAY__* variables
    Node,
    /// Encode a message JSON file into an SMS payload
    Encode {
        /// Path to a JSON-serialized message
        file: PathBuf,
    },
    /// Decode an SMS payload into message JSON
    Decode { payload: String },
    /// Split long text into numbered channel-sized parts
    Split { text: String },
    /// Print a fresh signing seed and its public key
    Keygen,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cmd = Command::parse();

    let result = match cmd {
        Command::Node => run_node().await,
        Command::Encode { file } => {
            logging::init("warn");
            encode_file(&file)
        }
        Command::Decode { payload } => {
            logging::init("warn");
            decode_payload(&payload)
        }
        Command::Split { text } => {
            for part in codec::split_long_message(&text) {
                println!("{part}");
            }
            Ok(())
        }
        Command::Keygen => {
            let signer = MessageSigner::generate();
            println!("signing_key = \"{}\"", signer.seed_base64());
            println!("public_key = \"{}\"", signer.public_key_base64());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // no-op when the node already installed a subscriber
            logging::init("warn");
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn encode_file(file: &Path) -> Result<(), Box<dyn Error>> {
    let json = std::fs::read_to_string(file)?;
    let message: Message = serde_json::from_str(&json)?;
    println!("{}", codec::encode(&message)?);
    Ok(())
}

fn decode_payload(payload: &str) -> Result<(), Box<dyn Error>> {
    if !codec::is_compact_payload(payload) {
        return Err(format!("payload does not start with {}", codec::PREFIX).into());
    }
    let message = codec::decode(payload).ok_or("malformed SOS1 payload")?;
    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}

fn build_signer(settings: &Settings) -> Result<MessageSigner, Box<dyn Error>> {
    match &settings.keys.signing_key {
        Some(seed) => Ok(MessageSigner::from_base64_seed(seed)?),
        None => {
            let signer = MessageSigner::generate();
            warn!(
                "No signing key configured, using ephemeral key {}",
                signer.public_key_base64()
            );
            Ok(signer)
        }
    }
}

async fn run_node() -> Result<(), Box<dyn Error>> {
    let config = load_config()?;
    logging::init(&config.logging.level);

    let signer = build_signer(&config)?;
    let mut verifier = Ed25519Verifier::from_base64_keys(&config.keys.trusted_keys)?;
    verifier.trust(signer.verifying_key());

    let store = Arc::new(SledStore::open(&config.storage.path)?);
    let transport = Arc::new(WsTransport::new());
    let relay = Arc::new(FloodRelay::new(
        RelayPolicy::from_settings(&config),
        store,
        Arc::new(verifier),
        transport.clone(),
        signer,
    ));

    relay.restore_seen().await?;
    let maintenance = FloodRelay::start_maintenance_loop(
        relay.clone(),
        Duration::from_secs(config.relay.maintenance_interval_secs.max(1)),
    );

    for url in &config.node.peers {
        if let Err(e) = connect_peer(url, relay.clone(), transport.clone()).await {
            warn!("Could not reach peer {}: {}", url, e);
        }
    }

    let addr = config.node.listen_addr();
    info!("Node {} starting", config.node.node_id);

    tokio::select! {
        res = start_peer_server(&addr, relay.clone(), transport.clone()) => {
            if let Err(e) = res {
                error!("Peer server failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    maintenance.abort();
    info!("Final stats: {:?}", relay.stats());
    Ok(())
}
