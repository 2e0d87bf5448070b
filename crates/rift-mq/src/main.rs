use clap::Parser;
use rift_mq::admin_api::AdminApiServer;
use rift_mq::broker::BrokerFlavor;
use rift_mq::config::{Config, LogFormat};
use rift_mq::MqVirtualizer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rift-mq", version, about = "Message broker virtualization")]
struct Args {
    /// Admin API port
    #[arg(short, long, env = "RIFT_MQ_PORT")]
    port: Option<u16>,
    /// YAML configuration file
    #[arg(short, long, env = "RIFT_MQ_CONFIG")]
    config: Option<PathBuf>,
    /// Log output format (text or json)
    #[arg(long, env = "RIFT_MQ_LOG_FORMAT")]
    log_format: Option<LogFormat>,
    /// Stub file (YAML or JSON) loaded at startup
    #[arg(short, long, env = "RIFT_MQ_STUBS")]
    stubs: Option<PathBuf>,
    /// Broker flavour used to render destination addresses
    #[arg(long, env = "RIFT_MQ_FLAVOR")]
    flavor: Option<BrokerFlavor>,
}

impl Args {
    fn load_config(&self) -> Result<Config, anyhow::Error> {
        let mut config = match self.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(port) = self.port {
            config.admin.port = port;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(ref stubs) = self.stubs {
            config.stubs_file = Some(stubs.clone());
        }
        if let Some(flavor) = self.flavor {
            config.broker.flavor = flavor;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    let result = match config.logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("Failed to initialise logging: {e}");
    }
}

async fn run(config: Config) -> Result<(), anyhow::Error> {
    let addr: SocketAddr = format!("{}:{}", config.admin.host, config.admin.port).parse()?;
    let seeds = config.initial_stubs()?;

    let app = Arc::new(MqVirtualizer::new(&config)?);
    app.start(seeds).await;

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(AdminApiServer::new(addr, Arc::clone(&app)).run(shutdown.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
        result = server => match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Admin API failed: {}", e),
            Err(e) => error!("Admin API task panicked: {}", e),
        },
    }

    shutdown.cancel();
    app.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = match args.load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(&config);

    info!(
        port = config.admin.port,
        flavor = %config.broker.flavor,
        "Starting rift-mq"
    );
    if let Err(e) = run(config).await {
        error!("rift-mq failed: {:#}", e);
        std::process::exit(1);
    }
}
