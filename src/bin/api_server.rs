//! REST API server for the port-call servicing tracker
//!
//! Usage:
//!   ./target/release/api_server [options]
//!
//! Options:
//!   --port PORT       Port to listen on (default: 8080)
//!   --db-path PATH    Path to SurrealDB database (default: data/fleet.db)
//!
//! Endpoints:
//!   GET  /                 - Filtered/sorted operation list
//!   GET  /operation/:id    - Operation detail (JSON)
//!   GET  /create           - Create-form context (lookup lists)
//!   POST /create           - Create an operation
//!   GET  /edit/:id         - Edit-form context
//!   POST /edit/:id         - Overwrite an operation
//!   POST /delete/:id       - Delete an operation and its line items
//!   GET  /analytics        - Fleet aggregation + charts
//!   GET  /health           - Health check

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use fleet_servicing::api::{handlers, FleetService};
use fleet_servicing::{db, seed};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// REST API server for the fleet servicing store
#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Serve the port-call servicing API")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Path to the SurrealDB database
    #[arg(long, default_value = "data/fleet.db")]
    db_path: String,
}

fn print_banner(port: u16) {
    println!("============================================================");
    println!("           FLEET PORT-CALL SERVICING API SERVER");
    println!("============================================================");
    println!();
    println!("  Port:     {}", port);
    println!("  REST:     http://localhost:{}/", port);
    println!();
    println!("Endpoints:");
    println!("  GET  /                 Operation list (filterable)");
    println!("  GET  /operation/:id    Operation detail");
    println!("  GET  /create           Create-form context");
    println!("  POST /create           Create operation");
    println!("  GET  /edit/:id         Edit-form context");
    println!("  POST /edit/:id         Update operation");
    println!("  POST /delete/:id       Delete operation");
    println!("  GET  /analytics        Fleet analytics + charts");
    println!("  GET  /health           Health check");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let args = Args::parse();
    print_banner(args.port);

    // One explicitly constructed store handle, bootstrapped before serving
    let db = db::connect(&args.db_path).await?;
    db::init_schema(&db).await?;
    seed::seed_reference_data(&db).await?;

    let service = Arc::new(FleetService::new(db));
    let app = create_router(service);

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    tracing::info!("Starting REST server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(service: Arc<FleetService>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // List + detail
        .route("/", get(handlers::list_operations))
        .route("/operation/:id", get(handlers::operation_detail))
        // Mutations
        .route(
            "/create",
            get(handlers::create_context).post(handlers::create_operation),
        )
        .route(
            "/edit/:id",
            get(handlers::edit_context).post(handlers::update_operation),
        )
        .route("/delete/:id", post(handlers::delete_operation))
        // Analytics
        .route("/analytics", get(handlers::analytics))
        // Health
        .route("/health", get(handlers::health))
        // State and middleware
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
