// # netclassd - connection classifier daemon
//
// Thin integration layer: all classification logic lives in netclass-core.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Feeding observations from stdin into the classifier engine
// 4. Printing the destination key of every kept connection to stdout
//
// ## Configuration
//
// - `NETCLASS_CONFIG_FILE`: JSON configuration file (optional, loaded first)
// - `NETCLASS_WHITELIST`: Comma-separated always-allow CIDRs (appended)
// - `NETCLASS_NAMESPACES`: Comma-separated search-path namespaces (replaces)
// - `NETCLASS_CLUSTER_DOMAIN`: Cluster DNS root (default: cluster.local)
// - `NETCLASS_EVENT_CHANNEL_CAPACITY`: Engine event channel capacity
// - `NETCLASS_LOG_LEVEL`: trace, debug, info, warn or error (default: info)
//
// ## Input
//
// One observation per line on stdin, blank lines and `#` comments ignored:
//
// ```text
// dns TypeA api.example.com 1.1.1.1,1.1.1.2
// conn 1.1.1.1:443 10.0.0.5:443
// ```

use anyhow::{Context, Result};
use netclass_core::{
    Classifier, ClassifierConfig, ClassifierEngine, ClassifierEvent, Observation,
    ObservationSource, parse_prefix,
};
use std::env;
use std::pin::Pin;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum NetclassExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<NetclassExitCode> for ExitCode {
    fn from(code: NetclassExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Settings read from the environment
struct Config {
    config_file: Option<String>,
    whitelist: Vec<String>,
    namespaces: Option<Vec<String>>,
    cluster_domain: Option<String>,
    event_channel_capacity: Option<usize>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            config_file: env::var("NETCLASS_CONFIG_FILE").ok(),
            whitelist: env::var("NETCLASS_WHITELIST")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            namespaces: env::var("NETCLASS_NAMESPACES").ok().map(|s| split_list(&s)),
            cluster_domain: env::var("NETCLASS_CLUSTER_DOMAIN").ok(),
            event_channel_capacity: env::var("NETCLASS_EVENT_CHANNEL_CAPACITY")
                .ok()
                .map(|s| {
                    s.trim().parse().with_context(|| {
                        format!("NETCLASS_EVENT_CHANNEL_CAPACITY must be a number. Got: {}", s)
                    })
                })
                .transpose()?,
            log_level: env::var("NETCLASS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Parse the log level
    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "NETCLASS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build the classifier configuration: file first, then environment overrides
    fn classifier_config(&self) -> Result<ClassifierConfig> {
        let mut config = match &self.config_file {
            Some(path) => ClassifierConfig::from_file(path)
                .with_context(|| format!("Failed to load NETCLASS_CONFIG_FILE {}", path))?,
            None => ClassifierConfig::default(),
        };

        for cidr in &self.whitelist {
            let prefix = parse_prefix(cidr)
                .context("NETCLASS_WHITELIST contains an invalid prefix")?;
            config.whitelist.push(prefix);
        }
        if let Some(namespaces) = &self.namespaces {
            config.normalizer.namespaces = namespaces.clone();
        }
        if let Some(cluster_domain) = &self.cluster_domain {
            config.normalizer.cluster_domain = cluster_domain.clone();
        }
        if let Some(capacity) = self.event_channel_capacity {
            config.engine.event_channel_capacity = capacity;
        }

        config.validate()?;
        Ok(config)
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Observations read line by line from stdin
struct StdinObservationSource;

impl ObservationSource for StdinObservationSource {
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Observation> + Send + 'static>> {
        let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        let observations = lines
            .map_while(|line| match line {
                Ok(line) => Some(line),
                Err(e) => {
                    error!("Failed to read observations from stdin: {}", e);
                    None
                }
            })
            .filter_map(|line| parse_line(&line));

        Box::pin(observations)
    }
}

fn parse_line(line: &str) -> Option<Observation> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.parse() {
        Ok(observation) => Some(observation),
        Err(e) => {
            warn!("Skipping malformed observation '{}': {}", line, e);
            None
        }
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return NetclassExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return NetclassExitCode::ConfigError.into();
        }
    };

    // Logs go to stderr; stdout carries only keys
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NetclassExitCode::ConfigError.into();
    }

    let classifier_config = match config.classifier_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration validation error: {:#}", e);
            return NetclassExitCode::ConfigError.into();
        }
    };

    info!("Starting netclassd");
    info!(
        "Configuration loaded: {} whitelisted prefix(es), cluster domain {}",
        classifier_config.whitelist.len(),
        classifier_config.normalizer.cluster_domain
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NetclassExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(classifier_config).await {
            error!("Daemon error: {:#}", e);
            NetclassExitCode::RuntimeError
        } else {
            NetclassExitCode::CleanShutdown
        }
    });

    // A pending stdin read would otherwise hold the runtime open
    rt.shutdown_timeout(Duration::from_secs(1));

    result.into()
}

/// Run the daemon
async fn run_daemon(config: ClassifierConfig) -> Result<()> {
    let classifier = Arc::new(Classifier::from_config(&config)?);
    let (engine, mut events) = ClassifierEngine::new(
        Box::new(StdinObservationSource),
        classifier,
        &config.engine,
    )?;

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ClassifierEvent::ConnectionKept { key, .. } => println!("{}", key),
                other => debug!("{:?}", other),
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    engine.run_with_shutdown(Some(shutdown_rx)).await?;
    signals.abort();

    drop(engine);
    printer.await.context("event printer task failed")?;

    info!("Shutting down netclassd");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
