use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::info;

use axum::Router;
use clap::{Parser, Subcommand};
use http::{Method, header::CONTENT_TYPE};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use anyhow::anyhow;

use homie_voice::{
    HomieConfig, console,
    core::listings::{InMemoryListings, PropertyType, SearchFilters, SortBy},
    core::tools,
    routes,
    state::{AppState, gemini_text_client},
};

/// Homie - realtime voice assistant for property search
#[derive(Parser, Debug)]
#[command(name = "homie")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve,

    /// Talk to the assistant through the local microphone and speaker
    Voice,

    /// Query the listing catalogue
    Search {
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long)]
        min_size: Option<f64>,
        #[arg(long)]
        bedrooms: Option<u32>,
        /// Only listings that allow pets
        #[arg(long)]
        pets: bool,
        /// apartment, house, studio, villa or loft
        #[arg(long = "type")]
        property_type: Option<PropertyType>,
        /// price_asc, price_desc, size or distance
        #[arg(long)]
        sort_by: Option<SortBy>,
    },

    /// Print the tool declarations sent to the model
    Tools,

    /// Ask the text assistant once and print its answer
    Ask {
        /// What you would say to the assistant
        text: String,
    },
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<HomieConfig> {
    match path {
        Some(config_path) => {
            println!("Loading configuration from {}", config_path.display());
            HomieConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))
        }
        None => HomieConfig::from_env().map_err(|e| anyhow!(e.to_string())),
    }
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    match origins {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers([CONTENT_TYPE])
            .allow_credentials(false),
        Some(origins) => {
            // Parse comma-separated origins
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(methods)
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(true)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            CorsLayer::new()
                .allow_methods(methods)
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(false)
        }
    }
}

async fn serve(config: HomieConfig) -> anyhow::Result<()> {
    let address = config.address();
    let cors = cors_layer(config.cors_allowed_origins.as_deref());
    println!("Starting server on {address}");

    let app_state = AppState::new(config).map_err(|e| anyhow!(e.to_string()))?;

    let public_routes = Router::new().route(
        "/",
        axum::routing::get(homie_voice::handlers::api::health_check),
    );

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    let app = public_routes
        .merge(routes::api::create_api_router())
        .merge(routes::voice::create_voice_router())
        .with_state(app_state.clone())
        .layer(cors)
        .layer(security_headers);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    println!("Server listening on http://{}", socket_addr);

    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    app_state.voice.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Crypto provider for the wss:// connection to Gemini
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(load_config(cli.config)?).await,
        Commands::Voice => console::run(load_config(cli.config)?).await,
        Commands::Search {
            city,
            min_price,
            max_price,
            min_size,
            bedrooms,
            pets,
            property_type,
            sort_by,
        } => {
            let config = load_config(cli.config)?;
            let store = match &config.listings_path {
                Some(path) => InMemoryListings::from_file(path)?,
                None => InMemoryListings::seeded()?,
            };
            let filters = SearchFilters {
                city,
                min_price,
                max_price,
                min_size,
                bedrooms,
                pets_allowed: pets.then_some(true),
                property_type,
                sort_by,
                user_location: None,
            };
            let listings = store.query(&filters);
            println!("{}", serde_json::to_string_pretty(&listings)?);
            eprintln!("{} matching listings", listings.len());
            Ok(())
        }
        Commands::Ask { text } => {
            let config = load_config(cli.config)?;
            let client = gemini_text_client(&config)
                .map_err(|e| anyhow!(e.to_string()))?
                .ok_or_else(|| anyhow!("GEMINI_API_KEY is not configured"))?;
            let answer = client
                .parse_utterance(&text, &SearchFilters::default())
                .await?;
            println!("{}", answer.assistant_reply);
            eprintln!("intent: {}", answer.intent.as_str());
            if let Some(filters) = &answer.filters {
                eprintln!("filters: {filters}");
            }
            Ok(())
        }
        Commands::Tools => {
            println!(
                "{}",
                serde_json::to_string_pretty(&tools::declarations())?
            );
            Ok(())
        }
    }
}
