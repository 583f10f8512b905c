//! Cartwheel CLI - drive the storefront cart client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Build up a cart while logged out
//! cartwheel cart add tee-classic --size M --color red -q 2
//! cartwheel cart show
//!
//! # Log in: the saved server cart is merged into the local cart
//! CARTWHEEL_ACCESS_TOKEN=... cartwheel login --user-id 42
//!
//! # Preview what logout would send to the server
//! cartwheel plan
//!
//! # Log out: the local cart is synced back to the server, then cleared
//! cartwheel logout
//! ```
//!
//! # Commands
//!
//! - `cart` - Show or edit the local cart
//! - `login` / `verify-email` - Start a session and merge the remote cart in
//! - `logout` - Sync the local cart back and end the session
//! - `plan` - Show the calls a logout would issue

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cartwheel_core::ProductId;
use cartwheel_storefront::config::ClientConfig;
use cartwheel_storefront::error::ClientError;

mod commands;

#[derive(Parser)]
#[command(name = "cartwheel")]
#[command(author, version, about = "Cartwheel storefront cart client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or edit the local cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Log in and merge the saved server cart into the local cart
    Login {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Complete email verification (merges like login)
    VerifyEmail {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Sync the local cart to the server, then log out
    Logout,
    /// Show the calls a logout would issue, without issuing them
    Plan,
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines
    Show,
    /// Add a product variant (quantities accumulate)
    Add {
        /// Product id
        product: ProductId,

        /// Size
        #[arg(short, long)]
        size: String,

        /// Color
        #[arg(short, long)]
        color: Option<String>,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Replace the quantity of a line
    Set {
        /// Product id
        product: ProductId,

        /// Size
        #[arg(short, long)]
        size: String,

        /// Color
        #[arg(short, long)]
        color: Option<String>,

        /// New quantity
        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Product id
        product: ProductId,

        /// Size
        #[arg(short, long)]
        size: String,

        /// Color
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Remove every line
    Clear,
}

#[derive(clap::Args)]
struct Credentials {
    /// Account id issued by the auth service
    #[arg(long)]
    user_id: i32,

    /// Access token issued by the auth service
    #[arg(long, env = "CARTWHEEL_ACCESS_TOKEN", hide_env_values = true)]
    token: String,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = ClientConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartwheel_storefront=info,cartwheel=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(ClientError::from(e)),
    };

    if let Err(e) = result {
        e.report();
        tracing::error!("Command failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), ClientError> {
    match cli.command {
        Commands::Cart { action } => {
            let mut cart = commands::open_cart(config);
            match action {
                CartAction::Show => commands::cart::show(&cart),
                CartAction::Add {
                    product,
                    size,
                    color,
                    quantity,
                } => commands::cart::add(&mut cart, product, color.as_deref(), &size, quantity)?,
                CartAction::Set {
                    product,
                    size,
                    color,
                    quantity,
                } => commands::cart::set(&mut cart, &product, color.as_deref(), &size, quantity)?,
                CartAction::Remove {
                    product,
                    size,
                    color,
                } => commands::cart::remove(&mut cart, &product, color.as_deref(), &size)?,
                CartAction::Clear => commands::cart::clear(&mut cart)?,
            }
        }
        Commands::Login { credentials } => {
            let mut session = commands::open_session(config)?;
            commands::auth::login(&mut session, credentials.user_id, credentials.token).await?;
        }
        Commands::VerifyEmail { credentials } => {
            let mut session = commands::open_session(config)?;
            commands::auth::verify_email(&mut session, credentials.user_id, credentials.token)
                .await?;
        }
        Commands::Logout => {
            let mut session = commands::open_session(config)?;
            commands::auth::logout(&mut session).await?;
        }
        Commands::Plan => {
            let session = commands::open_session(config)?;
            commands::plan::show(&session).await?;
        }
    }
    Ok(())
}
