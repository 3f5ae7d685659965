mod display;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rti_api::{AppState, ServerConfig};
use rti_chain::{ContractGateway, EthGateway, InMemoryGateway};
use rti_store::{AttachmentStore, DiskAttachments, RtiStore};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rti", version, about = "Right-to-Information request ledger")]
struct Cli {
    /// DuckDB database file.
    #[arg(long, env = "RTI_DB", default_value = "rti.duckdb", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Create the database schema and exit.
    Init,
    /// Print every request as a summary line.
    List {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Print one request in full.
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "RTI_LISTEN", default_value = "127.0.0.1:5000")]
    listen: SocketAddr,

    /// JSON-RPC endpoint of the Ethereum node.
    #[arg(long, env = "RTI_RPC_URL", default_value = "http://localhost:8545")]
    rpc_url: String,

    #[arg(
        long,
        env = "RTI_CONTRACT_ADDRESS",
        default_value = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
    )]
    contract_address: String,

    /// Hardhat artifact or bare ABI of the RTI contract.
    #[arg(long, env = "RTI_CONTRACT_ABI", default_value = "RTI.json")]
    contract_abi: PathBuf,

    #[arg(long, env = "RTI_ATTACHMENTS", value_enum, default_value_t = AttachmentBackend::Blob)]
    attachments: AttachmentBackend,

    /// Directory for the disk attachment backend.
    #[arg(long, env = "RTI_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    #[arg(long, env = "RTI_MAX_UPLOAD_BYTES", default_value_t = ServerConfig::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Allowed CORS origin. Empty disables CORS.
    #[arg(long, env = "RTI_CORS_ORIGIN", default_value = "http://localhost:3000")]
    cors_origin: String,

    /// Use the in-process contract instead of a node. Nothing reaches a chain.
    #[arg(long, env = "RTI_OFFLINE")]
    offline: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum AttachmentBackend {
    /// Bytes in the DuckDB database.
    Blob,
    /// Files under --upload-dir.
    Disk,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(&cli.db, args).await,
        Command::Init => {
            open_store(&cli.db)?;
            println!("Schema ready in {}", cli.db.display());
            Ok(())
        }
        Command::List { json } => {
            let rows = open_store(&cli.db)?.session()?.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                display::print_summary_table(&rows);
            }
            Ok(())
        }
        Command::Show { id, json } => {
            let rti = open_store(&cli.db)?
                .session()?
                .get(id)?
                .with_context(|| format!("no RTI with id {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rti)?);
            } else {
                display::print_rti_card(&rti);
            }
            Ok(())
        }
    }
}

fn open_store(path: &Path) -> anyhow::Result<RtiStore> {
    RtiStore::open_persistent(path)
        .with_context(|| format!("opening database {}", path.display()))
}

async fn serve(db: &Path, args: ServeArgs) -> anyhow::Result<()> {
    info!("rti v{}", env!("CARGO_PKG_VERSION"));
    let store = Arc::new(open_store(db)?);

    let attachments: Arc<dyn AttachmentStore> = match args.attachments {
        AttachmentBackend::Blob => Arc::new(store.blob_attachments()?),
        AttachmentBackend::Disk => Arc::new(
            DiskAttachments::open(args.upload_dir.clone())
                .await
                .with_context(|| format!("preparing {}", args.upload_dir.display()))?,
        ),
    };

    let gateway: Arc<dyn ContractGateway> = if args.offline {
        warn!("offline mode: using the in-memory contract, blockchain ids restart at 0");
        Arc::new(InMemoryGateway::new())
    } else {
        Arc::new(
            EthGateway::connect(&args.rpc_url, &args.contract_address, &args.contract_abi).await?,
        )
    };

    let mut config = ServerConfig::new(args.max_upload_bytes);
    if !args.cors_origin.is_empty() {
        config = config
            .with_cors_origin(&args.cors_origin)
            .with_context(|| format!("invalid CORS origin {}", args.cors_origin))?;
    }

    info!(
        db = %db.display(),
        attachments = attachments.backend(),
        gateway = gateway.name(),
        max_upload_bytes = config.max_upload_bytes,
        "RTI service configured"
    );
    let app = rti_api::router(AppState::new(store, attachments, gateway), &config);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!(listen_addr = %args.listen, "RTI API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
