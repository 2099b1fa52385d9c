use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::Request,
    middleware,
    response::Response,
    routing::any,
};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use hyper::StatusCode;
use switchyard::{
    adapters::{FileSettings, HttpClientAdapter, RoutingState, intercept},
    config::load_routing_config,
    ports::{http_client::HttpClient, settings::Settings},
    tracing_setup,
};

/// Settings key naming the legacy upstream the sidecar fronts.
const KEY_LEGACY_SERVICE: &str = "Routing.LegacyService";
/// Settings key for the listen address.
const KEY_LISTEN_ADDR: &str = "Server.Listen";

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "switchyard.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate the routing settings file
    Validate {
        #[clap(short, long, default_value = "switchyard.toml")]
        config: String,
    },
    /// Start the splitting proxy (default)
    Serve {
        #[clap(short, long, default_value = "switchyard.toml")]
        config: String,
    },
}

/// Pass-through proxy to the legacy upstream. This plays the part of "the
/// legacy handler" when switchyard runs as a standalone sidecar instead of
/// being embedded next to the legacy code.
struct LegacyProxy {
    client: Arc<dyn HttpClient>,
    base_url: String,
}

impl LegacyProxy {
    async fn handle(&self, mut req: Request) -> Response {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .to_string();
        let upstream_uri = format!("{}{}", self.base_url.trim_end_matches('/'), path_and_query);

        match upstream_uri.parse() {
            Ok(uri) => *req.uri_mut() = uri,
            Err(e) => {
                tracing::error!(error = %e, uri = upstream_uri, "failed to build legacy upstream URI");
                return bad_gateway();
            }
        }

        match self.client.send_request(req).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "legacy upstream request failed");
                bad_gateway()
            }
        }
    }
}

fn bad_gateway() -> Response {
    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .body(Body::from("Legacy upstream request failed"))
        .unwrap_or_else(|_| Response::new(Body::from("Legacy upstream request failed")))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config),
    };

    if command == "validate" {
        return validate_command(&config_path);
    }

    tracing_setup::init_tracing().map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    let settings = Arc::new(
        FileSettings::load(&config_path)
            .with_context(|| format!("Failed to load settings from {config_path}"))?,
    );

    let legacy_url = settings
        .get(KEY_LEGACY_SERVICE)
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| eyre!("{KEY_LEGACY_SERVICE} must be set to run the sidecar"))?;

    let listen_addr: SocketAddr = settings
        .get(KEY_LISTEN_ADDR)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse()
        .context("Failed to parse listen address")?;

    let http_client: Arc<dyn HttpClient> =
        Arc::new(HttpClientAdapter::new().context("Failed to create HTTP client adapter")?);

    let routing_state = Arc::new(RoutingState::new(settings.clone(), http_client.clone()));
    {
        let snapshot = routing_state.snapshot();
        tracing::info!(
            valid = snapshot.is_valid,
            get_mode = %snapshot.get_mode,
            post_rules = snapshot.post_modes.len(),
            "routing snapshot loaded"
        );
    }

    let legacy = Arc::new(LegacyProxy {
        client: http_client.clone(),
        base_url: legacy_url,
    });

    let make_legacy_route = |proxy: Arc<LegacyProxy>| {
        any(move |req: Request| {
            let proxy = proxy.clone();
            async move { proxy.handle(req).await }
        })
    };

    let app = Router::new()
        .route("/", make_legacy_route(legacy.clone()))
        .route("/{*path}", make_legacy_route(legacy.clone()))
        .layer(middleware::from_fn_with_state(
            routing_state.clone(),
            intercept,
        ));

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Switchyard listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

/// Validate the settings file and exit.
fn validate_command(config_path: &str) -> Result<()> {
    // Defects are reported through tracing; make sure they reach the console.
    let _ = tracing_setup::init_console_tracing();

    println!("Validating settings file: {config_path}");

    let settings = match FileSettings::load(config_path) {
        Ok(settings) => {
            println!("✅ Settings parsing: OK");
            settings
        }
        Err(e) => {
            eprintln!("❌ Settings parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    let config = load_routing_config(&settings);
    if !config.is_valid {
        eprintln!("❌ Routing rules are invalid (defects logged above); all traffic would fall through to the legacy handler");
        std::process::exit(1);
    }

    println!("✅ Routing rules: OK");
    println!();
    println!("Summary:");
    println!("   • New service: {}", config.new_service_url.as_deref().unwrap_or("(not set)"));
    println!("   • GET mode: {}", config.get_mode);
    println!("   • POST rules: {}", config.post_modes.len());
    match settings.get(KEY_LEGACY_SERVICE) {
        Some(url) if !url.trim().is_empty() => println!("   • Legacy upstream: {url}"),
        _ => println!("   • Legacy upstream: (not set - required for `serve`)"),
    }
    Ok(())
}
