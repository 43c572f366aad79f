use clap::Parser;
use guardian::config::{Config, LoggingConfig};
use guardian::network::NodeKey;
use guardian::rpc::AdminApi;
use guardian::shutdown::ShutdownManager;
use guardian::Node;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "guardian")]
#[command(about = "Guardian peer-session node", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "guardian.toml")]
    config: String,

    #[arg(long)]
    listen_addr: Option<String>,

    #[arg(long)]
    network_id: Option<u64>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    generate_config: bool,

    /// Print the node identity and exit
    #[arg(long)]
    write_address: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.generate_config {
        let config = Config::default();
        match config.save_to_file(&args.config) {
            Ok(_) => {
                println!("✅ Generated default config at: {}", args.config);
                return;
            }
            Err(e) => {
                eprintln!("❌ Failed to generate config: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut config = match Config::load_or_create(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Persist a node key on first run so the identity survives restarts
    if config.node.node_key.is_none() {
        config.node.node_key = Some(NodeKey::generate().to_hex());
        if let Err(e) = config.save_to_file(&args.config) {
            eprintln!("❌ Failed to save node key: {}", e);
            std::process::exit(1);
        }
    }

    if args.write_address {
        match config.node_key() {
            Ok(key) => {
                println!("{}", key.peer_id());
                return;
            }
            Err(e) => {
                eprintln!("❌ Invalid node key: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Some(addr) = args.listen_addr {
        config.network.listen_address = addr;
    }
    if let Some(network_id) = args.network_id {
        config.chain.network_id = network_id;
    }

    let _log_guard = setup_logging(&config.logging, args.verbose);

    let version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    println!("\n🚀 Guardian v{} ({})", version, git_hash);
    println!("═══════════════════════════════════════════════════════");
    println!("📡 Network ID: {}", config.chain.network_id);
    println!("  └─ Chain ID: {}", config.chain.chain_id);
    println!("  └─ Genesis: {}", config.chain.genesis_hash);
    println!();

    let node = match Node::new(config) {
        Ok(node) => Arc::new(node),
        Err(e) => {
            eprintln!("❌ Failed to initialize node: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = node.start().await {
        tracing::error!("❌ Failed to start node: {}", e);
        std::process::exit(1);
    }

    match AdminApi::new(node.clone()).node_info() {
        Ok(info) => tracing::info!("ℹ️  Node info: {}", info),
        Err(e) => tracing::warn!("Failed to build node info: {}", e),
    }

    if let Err(e) = ShutdownManager::new(node).wait_for_shutdown().await {
        tracing::error!("❌ Shutdown failed: {}", e);
        std::process::exit(1);
    }
}

/// Install the global subscriber. The returned guard flushes file output on drop.
fn setup_logging(config: &LoggingConfig, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "trace" } else { &config.level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (writer, guard) = if config.output == "file" {
        let path = std::path::Path::new(&config.file_path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let file_name = path
            .file_name()
            .map(|f| f.to_os_string())
            .unwrap_or_else(|| "guardian.log".into());
        let appender = tracing_appender::rolling::daily(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        (BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stdout), None)
    };

    // Detect if running under systemd/journald
    let is_systemd =
        std::env::var("JOURNAL_STREAM").is_ok() || std::env::var("INVOCATION_ID").is_ok();

    // Get hostname - shorten to first part before dot
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    let short_hostname = hostname.split('.').next().unwrap_or(&hostname).to_string();

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_thread_ids(false)
                .init();
        }
        _ => {
            if is_systemd {
                // journald already adds timestamp and hostname
                fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_file(false)
                    .with_line_number(false)
                    .without_time()
                    .compact()
                    .init();
            } else {
                fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_timer(CustomTimer {
                        hostname: short_hostname,
                    })
                    .compact()
                    .init();
            }
        }
    }

    guard
}

// Custom timer that shows UTC time and hostname
struct CustomTimer {
    hostname: String,
}

impl tracing_subscriber::fmt::time::FormatTime for CustomTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        use chrono::Utc;
        let now = Utc::now();

        // Format: "YYYY-MM-DD HH:MM:SS.mmm [hostname]"
        write!(
            w,
            "{}.{:03} [{}]",
            now.format("%Y-%m-%d %H:%M:%S"),
            now.timestamp_subsec_millis(),
            self.hostname
        )
    }
}
