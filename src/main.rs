use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_connect::api::{self, middleware::SecurityConfig};
use campus_connect::auth::AuthState;
use campus_connect::campus::Campus;
use campus_connect::client::CampusClient;
use campus_connect::config::CampusConfig;
use campus_connect::db::Database;
use campus_connect::notify::{NotificationKind, RecordingSink};
use campus_connect::store::Hydration;

#[derive(Parser)]
#[command(name = "campus")]
#[command(about = "CampusConnect Lite domain stores")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the collection API over the local database
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "17020")]
        port: u16,
    },
    /// Hydrate every store and print what it holds
    Summary {
        /// Number of audit entries to show
        #[arg(short, long, default_value = "10")]
        audit: usize,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "campus_connect=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(config: &CampusConfig) -> anyhow::Result<Database> {
    let db = match &config.database_path {
        Some(path) => Database::open(path.clone())?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(config: &CampusConfig, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting CampusConnect API on port {}", port);

    let db = open_database(config)?;
    let app = api::create_router_with_security(db, SecurityConfig::from_env());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("CampusConnect API listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn summary(config: &CampusConfig, audit_entries: usize) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let sink = RecordingSink::new();
    let campus = Campus::new(
        config,
        Arc::new(db),
        CampusClient::from_config(config),
        Arc::new(sink.clone()),
        "cli",
    );

    for (collection, outcome) in campus.hydrate(AuthState::Authenticated).await {
        match outcome {
            Hydration::Ready { count } => println!("{:<22} {:>5} records", collection, count),
            Hydration::Failed => println!("{:<22} unavailable", collection),
            Hydration::Skipped | Hydration::Cancelled => println!("{:<22} not loaded", collection),
        }
    }

    let today = Local::now().date_naive();
    let overdue = campus.finance.overdue_invoices(today);
    println!();
    println!("Overdue invoices: {}", overdue.len());
    for invoice in overdue {
        let due = campus.finance.amount_due(&invoice.id).unwrap_or(0);
        println!(
            "  {}  {}  {}  due {}  owed {}",
            invoice.id, invoice.student_id, invoice.description, invoice.due_date, due
        );
    }

    let latest = campus.audit.latest(audit_entries);
    if !latest.is_empty() {
        println!();
        println!("Recent activity:");
        for entry in latest {
            println!(
                "  {}  {:<24} {}  {}",
                entry.at.format("%Y-%m-%d %H:%M"),
                entry.action,
                entry.actor,
                entry.detail.unwrap_or_default()
            );
        }
    }

    for failure in sink.of_kind(NotificationKind::Failed) {
        eprintln!(
            "warning: {}: {}",
            failure.title,
            failure.description.unwrap_or_default()
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = CampusConfig::load();

    match cli.command {
        Some(Commands::Serve { port }) => serve(&config, port).await?,
        Some(Commands::Summary { audit }) => summary(&config, audit).await?,
        None => serve(&config, 17020).await?,
    }

    Ok(())
}
