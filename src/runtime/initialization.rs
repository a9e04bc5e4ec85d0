//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, Kubernetes client setup and reconciler wiring.

use crate::config::{create_shared_config, SharedControllerConfig};
use crate::constants::{
    CONTROLLER_NAME, SERVER_STARTUP_POLL_INTERVAL_MS, SERVER_STARTUP_TIMEOUT_SECS,
};
use crate::controller::nop::NopConnecter;
use crate::controller::reconciler::{
    ApiReferenceResolver, KubeReferenceReader, Reconciler, SecretConnectionPublisher,
};
use crate::crd::NopResource;
use crate::observability::{self, KubeEventRecorder};
use crate::runtime::Context;
use crate::secrets::KubeSecretStore;
use crate::server::{start_server, ServerState};
use crate::store::{KubeStore, ObjectStore};
use anyhow::{anyhow, Result};
use kube::{api::Api, Client};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for the watched `NopResource` objects
    pub resources: Api<NopResource>,
    /// Reconciler context shared with the watch loop
    pub context: Arc<Context<NopResource>>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: SharedControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Required for rustls 0.23+ before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let controller_config = create_shared_config();
    let config = controller_config.read().await.clone();

    init_tracing(&config.log_level, &config.log_format);

    info!("Starting Managed Resource Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_port = config.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default().await?;

    let resources: Api<NopResource> = match config.watch_namespace.as_deref() {
        Some(namespace) => {
            info!(namespace, "Watching NopResource objects in a single namespace");
            Api::namespaced(client.clone(), namespace)
        }
        None => {
            info!("Watching NopResource objects in all namespaces");
            Api::all(client.clone())
        }
    };

    let store: Arc<dyn ObjectStore<NopResource>> = Arc::new(KubeStore::new(client.clone()));
    let reconciler = Reconciler::new(Arc::clone(&store), Arc::new(NopConnecter::new()))
        .with_reference_resolver(Arc::new(ApiReferenceResolver::new(
            Arc::new(KubeReferenceReader::new(client.clone())),
            Arc::clone(&store),
        )))
        .with_connection_publishers(vec![Arc::new(SecretConnectionPublisher::new(Arc::new(
            KubeSecretStore::new(client.clone()),
        )))])
        .with_event_recorder(Arc::new(KubeEventRecorder::new(
            client.clone(),
            CONTROLLER_NAME,
            config.reporter_instance.clone(),
        )))
        .with_options(config.reconciler_options());

    let context = Arc::new(Context::new(reconciler, &config));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        resources,
        context,
        server_state,
        controller_config,
    })
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `LOG_LEVEL` when both are set.
fn init_tracing(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "managed_resource_controller={},kube=warn",
            log_level.to_lowercase()
        ))
    });

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = Duration::from_millis(SERVER_STARTUP_POLL_INTERVAL_MS);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }

        // Set by start_server once bound
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
