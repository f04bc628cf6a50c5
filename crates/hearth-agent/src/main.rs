//! Agent process: accepts directives on stdin as the synchronous boundary,
//! relays deferrable ones through the queue, and runs the consumer loop that
//! posts their eventual results back to the platform.

mod devices;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use hearth_auth::{
    FsObjectStore, OAuthClient, OAuthConfig, ObjectTokenStore, ProfileUserIdResolver, TokenStore,
    UserIdResolver, DEFAULT_PROFILE_URL, DEFAULT_TOKEN_URL,
};
use hearth_deferred::{DeferredHandler, HttpEventSender, DEFAULT_EVENT_URL};
use hearth_relay::{InMemoryQueue, QueueWorker, RelayPublisher};
use hearth_skill::types::{
    DiscoverCapability, DiscoverEndpoint, DiscoverProperties, DiscoverProperty,
    DISPLAY_CATEGORY_SWITCH, DISPLAY_CATEGORY_TEMPERATURE_SENSOR, INTERFACE_PERCENTAGE_CONTROLLER,
    INTERFACE_POWER_CONTROLLER, INTERFACE_TEMPERATURE_SENSOR, NAMESPACE_ALEXA,
    NAMESPACE_AUTHORIZATION, NAMESPACE_DISCOVERY, NAMESPACE_PERCENTAGE_CONTROLLER,
    NAMESPACE_POWER_CONTROLLER,
};
use hearth_skill::{
    AuthorizationHandler, DeferredRelayHandler, DirectiveHandler, NamespaceRouter,
    PercentageControllerHandler, PowerControllerHandler, Request, ResponseBuilder,
    StaticDiscoveryHandler, TracedHandler,
};

use devices::{
    AdjustPercentageHandler, PowerStateHandler, SetPercentageHandler, TemperatureReportHandler,
};

#[derive(Debug, Parser)]
#[command(name = "hearth-agent", about = "Smart home skill agent", version)]
struct AgentConfig {
    #[arg(
        long,
        env = "HEARTH_TOKEN_DIR",
        default_value = ".hearth/tokens",
        help = "Directory holding per-user OAuth token documents"
    )]
    token_dir: PathBuf,

    #[arg(long, env = "HEARTH_CLIENT_ID", help = "OAuth client id")]
    client_id: String,

    #[arg(long, env = "HEARTH_CLIENT_SECRET", help = "OAuth client secret")]
    client_secret: String,

    #[arg(
        long,
        env = "HEARTH_EVENT_URL",
        default_value = DEFAULT_EVENT_URL,
        help = "Event callback endpoint deferred responses are posted to"
    )]
    event_url: String,

    #[arg(
        long,
        env = "HEARTH_PROFILE_URL",
        default_value = DEFAULT_PROFILE_URL,
        help = "Profile endpoint used to resolve user ids from bearer tokens"
    )]
    profile_url: String,

    #[arg(
        long,
        env = "HEARTH_TOKEN_URL",
        default_value = DEFAULT_TOKEN_URL,
        help = "OAuth token endpoint for grant exchange and refresh"
    )]
    token_url: String,

    #[arg(
        long,
        env = "HEARTH_QUEUE_WAIT_SECONDS",
        default_value_t = 20,
        help = "Long-poll wait applied to each queue receive"
    )]
    queue_wait_seconds: u64,

    #[arg(
        long,
        env = "HEARTH_RETRY_DELAY_SECONDS",
        default_value_t = 20,
        help = "Delay before the consumer loop restarts after an error"
    )]
    retry_delay_seconds: u64,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = AgentConfig::parse();
    run(config).await
}

async fn run(config: AgentConfig) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to create http client")?;

    let tokens: Arc<dyn TokenStore> = Arc::new(ObjectTokenStore::new(Arc::new(
        FsObjectStore::new(config.token_dir.clone()),
    )));
    let resolver: Arc<dyn UserIdResolver> = Arc::new(ProfileUserIdResolver::new(
        http.clone(),
        config.profile_url.clone(),
    ));
    let oauth = OAuthClient::new(
        http.clone(),
        OAuthConfig::new(config.client_id.clone(), config.client_secret.clone())
            .with_token_url(config.token_url.clone()),
    );
    let builder = ResponseBuilder::new();

    let queue = Arc::new(InMemoryQueue::new());
    let relay = Arc::new(RelayPublisher::new(queue.clone()));

    // Synchronous boundary: relay power directives, answer the rest in place.
    let mut entry_router = NamespaceRouter::new();
    entry_router.register(
        NAMESPACE_POWER_CONTROLLER,
        Arc::new(DeferredRelayHandler::new(relay.clone(), builder.clone())),
    );
    entry_router.register(
        NAMESPACE_PERCENTAGE_CONTROLLER,
        Arc::new(DeferredRelayHandler::new(relay, builder.clone())),
    );
    entry_router.register(
        NAMESPACE_DISCOVERY,
        Arc::new(StaticDiscoveryHandler::new(
            builder.clone(),
            discovery_endpoints(),
        )),
    );
    entry_router.register(
        NAMESPACE_ALEXA,
        Arc::new(TemperatureReportHandler::new(builder.clone(), 75.0)),
    );
    entry_router.register(
        NAMESPACE_AUTHORIZATION,
        Arc::new(AuthorizationHandler::new(
            oauth.clone(),
            resolver.clone(),
            tokens.clone(),
            builder.clone(),
        )),
    );
    let entry_handler = TracedHandler::new(Arc::new(entry_router));

    // Deferred side: the worker supports the concrete device handlers.
    let mut worker_router = NamespaceRouter::new();
    worker_router.register(
        NAMESPACE_POWER_CONTROLLER,
        Arc::new(PowerControllerHandler::new(
            Arc::new(PowerStateHandler::new(builder.clone(), "ON")),
            Arc::new(PowerStateHandler::new(builder.clone(), "OFF")),
        )),
    );
    worker_router.register(
        NAMESPACE_PERCENTAGE_CONTROLLER,
        Arc::new(PercentageControllerHandler::new(
            Arc::new(SetPercentageHandler::new(builder.clone())),
            Arc::new(AdjustPercentageHandler::new(builder.clone())),
        )),
    );

    let sender = Arc::new(HttpEventSender::new(
        http,
        config.event_url.clone(),
        tokens,
        resolver,
        oauth,
    ));
    let deferred = DeferredHandler::new(
        Arc::new(TracedHandler::new(Arc::new(worker_router))),
        sender,
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let worker = QueueWorker::new(
        queue,
        deferred,
        Duration::from_secs(config.queue_wait_seconds),
        cancel_rx,
    );
    let retry_delay = Duration::from_secs(config.retry_delay_seconds);
    let worker_handle = tokio::spawn(async move {
        worker.run(retry_delay).await;
    });

    tracing::info!("agent ready; reading directives from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
            line = lines.next_line() => {
                match line.context("failed to read from stdin")? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        dispatch_line(&entry_handler, &builder, line).await;
                    }
                    None => {
                        // stdin closed; keep serving the queue until SIGINT.
                        tokio::signal::ctrl_c()
                            .await
                            .context("failed to wait for shutdown signal")?;
                        tracing::info!("shutdown requested");
                        break;
                    }
                }
            }
        }
    }

    cancel_tx.send(true).ok();
    worker_handle.await.context("queue worker panicked")?;
    Ok(())
}

async fn dispatch_line(handler: &TracedHandler, builder: &ResponseBuilder, line: &str) {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(%error, "ignoring undecodable directive");
            return;
        }
    };

    let output = match handler.handle(&request).await {
        Ok(Some(response)) => serde_json::to_string(&response).ok(),
        Ok(None) => None,
        Err(error) => {
            tracing::warn!(%error, "directive failed");
            builder
                .basic_error_response(&request, "INTERNAL_ERROR", &error.to_string())
                .ok()
                .and_then(|response| serde_json::to_string(&response).ok())
        }
    };
    if let Some(output) = output {
        println!("{output}");
    }
}

fn discovery_endpoints() -> Vec<DiscoverEndpoint> {
    vec![
        DiscoverEndpoint {
            endpoint_id: "temp-sensor-1".to_string(),
            friendly_name: "Home Temperature".to_string(),
            description: "Temperature monitor".to_string(),
            manufacturer_name: "Hearth".to_string(),
            display_categories: vec![DISPLAY_CATEGORY_TEMPERATURE_SENSOR.to_string()],
            cookie: Default::default(),
            capabilities: vec![DiscoverCapability {
                capability_type: "AlexaInterface".to_string(),
                interface: INTERFACE_TEMPERATURE_SENSOR.to_string(),
                version: "3".to_string(),
                properties: DiscoverProperties {
                    supported: vec![DiscoverProperty {
                        name: "temperature".to_string(),
                    }],
                    proactively_reported: false,
                    retrievable: true,
                },
            }],
        },
        DiscoverEndpoint {
            endpoint_id: "switch-1".to_string(),
            friendly_name: "Fan".to_string(),
            description: "Power switch for fan".to_string(),
            manufacturer_name: "Hearth".to_string(),
            display_categories: vec![DISPLAY_CATEGORY_SWITCH.to_string()],
            cookie: Default::default(),
            capabilities: vec![DiscoverCapability {
                capability_type: "AlexaInterface".to_string(),
                interface: INTERFACE_POWER_CONTROLLER.to_string(),
                version: "3".to_string(),
                properties: DiscoverProperties {
                    supported: vec![DiscoverProperty {
                        name: "powerState".to_string(),
                    }],
                    proactively_reported: true,
                    retrievable: true,
                },
            }],
        },
        DiscoverEndpoint {
            endpoint_id: "window-1".to_string(),
            friendly_name: "Window Shade".to_string(),
            description: "Positionable window shade".to_string(),
            manufacturer_name: "Hearth".to_string(),
            display_categories: vec![DISPLAY_CATEGORY_SWITCH.to_string()],
            cookie: Default::default(),
            capabilities: vec![DiscoverCapability {
                capability_type: "AlexaInterface".to_string(),
                interface: INTERFACE_PERCENTAGE_CONTROLLER.to_string(),
                version: "3".to_string(),
                properties: DiscoverProperties {
                    supported: vec![DiscoverProperty {
                        name: "percentage".to_string(),
                    }],
                    proactively_reported: true,
                    retrievable: true,
                },
            }],
        },
    ]
}
