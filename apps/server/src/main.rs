use anyhow::Context;
use clap::{Parser, Subcommand};
use cohort_community::Identity;
use cohort_config::load as load_config;
use cohort_database::{CohortRepository, ParticipantSession, SessionRepository};
use cohort_gateway::{create_router, GatewayState};
use cohort_runtime::{telemetry, BackendServices};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::Row;
use tokio::net::TcpListener;
use tracing::info;

const DEMO_COHORT: &str = "Rust Foundations";
const DEMO_MEMBERS: &[(i64, &str)] = &[(1, "Ada"), (2, "Grace"), (3, "Linus")];
const DEMO_ADMIN: (i64, &str) = (100, "Coordinator");
const SESSION_DAYS: i64 = 30;

#[derive(Parser)]
#[command(name = "cohort-server")]
#[command(about = "Cohort community channel server (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve,
    /// Seed a demo cohort, its channel and participant sessions
    SeedData,
    /// Dump channels with membership and message counts
    DumpData,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::SeedData => seed_data().await,
        Commands::DumpData => dump_data().await,
    }
}

async fn initialise() -> anyhow::Result<(cohort_config::AppConfig, BackendServices)> {
    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    Ok((config, services))
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting cohort community server");

    let (config, services) = initialise().await?;

    let state = GatewayState::new(
        services.community.clone(),
        services.identity.clone(),
        config.community.outbound_queue,
    );
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cohort_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("server shut down");
    Ok(())
}

fn session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

async fn issue_session(
    sessions: &SessionRepository,
    participant_id: i64,
    display_name: &str,
    is_admin: bool,
) -> anyhow::Result<String> {
    let token = session_token();
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).to_rfc3339();

    sessions
        .upsert(&ParticipantSession {
            token: token.clone(),
            participant_id,
            display_name: Some(display_name.to_string()),
            is_admin,
            expires_at,
        })
        .await
        .with_context(|| format!("failed to issue session for participant {participant_id}"))?;

    Ok(token)
}

async fn seed_data() -> anyhow::Result<()> {
    info!("seeding database with a demo cohort");

    let (_, services) = initialise().await?;
    let cohorts = CohortRepository::new(services.db_pool.clone());
    let sessions = SessionRepository::new(services.db_pool.clone());

    let cohort = cohorts
        .create(DEMO_COHORT)
        .await
        .context("failed to create demo cohort")?;
    for (participant_id, name) in DEMO_MEMBERS {
        cohorts
            .enroll(cohort.id, *participant_id, Some(*name))
            .await
            .with_context(|| format!("failed to enroll participant {participant_id}"))?;
    }

    let (admin_id, admin_name) = DEMO_ADMIN;
    let admin = Identity {
        participant_id: admin_id,
        display_name: Some(admin_name.to_string()),
        is_admin: true,
    };
    let channel = services
        .community
        .create_channel(&admin, cohort.id)
        .await
        .context("failed to create demo channel")?;

    println!("Database seeded:");
    println!("- cohort {} \"{}\"", cohort.id, cohort.name);
    println!("- channel {} with {} members", channel.key, channel.members.len());
    println!();
    println!("{:<8} {:<15} {:<8} {:<32}", "ID", "Name", "Admin", "Token");
    println!("{}", "-".repeat(66));

    let admin_token = issue_session(&sessions, admin_id, admin_name, true).await?;
    println!("{:<8} {:<15} {:<8} {:<32}", admin_id, admin_name, true, admin_token);
    for (participant_id, name) in DEMO_MEMBERS {
        let token = issue_session(&sessions, *participant_id, name, false).await?;
        println!("{:<8} {:<15} {:<8} {:<32}", participant_id, name, false, token);
    }

    println!();
    println!("Run 'dump-data' to see the channel state");
    Ok(())
}

async fn dump_data() -> anyhow::Result<()> {
    info!("dumping community channels from database");

    let (_, services) = initialise().await?;

    let channels = sqlx::query(
        r#"
        SELECT c.key, c.cohort_id, c.last_seq, c.created_at,
               (SELECT COUNT(*) FROM channel_memberships m WHERE m.channel_id = c.id) AS members,
               (SELECT COUNT(*) FROM channel_memberships m WHERE m.channel_id = c.id AND m.can_send = 0) AS muted,
               (SELECT COUNT(*) FROM channel_messages msg WHERE msg.channel_id = c.id) AS messages
        FROM channels c
        ORDER BY c.id ASC
        "#,
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch channels")?;

    println!("=== CHANNELS ===");
    if channels.is_empty() {
        println!("No channels found in database");
        return Ok(());
    }

    println!("Found {} channels:", channels.len());
    println!(
        "{:<20} {:<10} {:<10} {:<10} {:<8} {:<10} {:<25}",
        "Key", "Cohort", "Last Seq", "Members", "Muted", "Messages", "Created At"
    );
    println!("{}", "-".repeat(100));

    for channel in channels {
        let key: String = channel.get("key");
        let cohort_id: i64 = channel.get("cohort_id");
        let last_seq: i64 = channel.get("last_seq");
        let members: i64 = channel.get("members");
        let muted: i64 = channel.get("muted");
        let messages: i64 = channel.get("messages");
        let created_at: String = channel.get("created_at");

        println!(
            "{:<20} {:<10} {:<10} {:<10} {:<8} {:<10} {:<25}",
            key, cohort_id, last_seq, members, muted, messages, created_at
        );
    }

    Ok(())
}
