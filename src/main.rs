use std::fs;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use larder::auth::SecretHasher;
use larder::config::ServerConfig;
use larder::db::{Database, SqliteDatabase};
use larder::server::{AppState, create_router};
use larder::types::{User, normalize_email};

#[derive(Parser)]
#[command(name = "larder")]
#[command(about = "A shopping-list and recipe server for households", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Require this code on registration. Leave unset for open
        /// registration.
        #[arg(long)]
        registration_code: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create the database, optionally a first account)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

fn run_init(data_dir: String, non_interactive: bool) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let db_path = data_path.join("larder.db");
    if db_path.exists() {
        bail!("Server already initialized. Database exists at: {}", db_path.display());
    }

    let db = SqliteDatabase::new(&db_path)?;
    db.initialize()?;

    println!("Database created at {}", db_path.display());

    if !non_interactive {
        create_first_account_prompt(&db)?;
    }

    Ok(())
}

fn create_first_account_prompt(db: &SqliteDatabase) -> anyhow::Result<()> {
    let create_account = inquire::Confirm::new("Would you like to create the first account?")
        .with_default(false)
        .prompt()?;

    if !create_account {
        return Ok(());
    }

    let email = inquire::Text::new("Email:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() || !input.contains('@') {
                Err("A valid email is required".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let name = inquire::Text::new("Name:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Name cannot be empty".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let password = inquire::Password::new("Password:")
        .with_validator(|input: &str| {
            if input.len() < 8 {
                Err("Password must be at least 8 characters".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let hasher = SecretHasher::new();
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email_norm: normalize_email(&email),
        email: email.trim().to_string(),
        name: name.trim().to_string(),
        password_hash: hasher.hash(&password)?,
        scopes: vec!["admin".to_string()],
        created_at: now,
        updated_at: now,
    };
    db.create_user(&user)?;

    println!();
    println!("Created account '{}'. Log in through the API to get a token.", user.email);
    println!();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("larder=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => {
                run_init(data_dir, non_interactive)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            registration_code,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                registration_code,
            };

            let db_path = config.db_path();
            if !db_path.exists() {
                bail!(
                    "Server not initialized. Run 'larder admin init' first to create the database."
                );
            }

            let db = SqliteDatabase::new(&db_path)?;
            db.initialize()?;

            let state = Arc::new(AppState {
                db: Arc::new(db),
                config: config.clone(),
            });

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
