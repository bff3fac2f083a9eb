//! CLI administration tool for campaign-dispatch.
//!
//! Manages operator API tokens and inspects campaigns without going through
//! the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Create a new API token
//! cargo run --bin admin -- token create --name marketing-ops
//!
//! # List all tokens
//! cargo run --bin admin -- token list
//!
//! # Revoke a token
//! cargo run --bin admin -- token revoke marketing-ops
//!
//! # Campaign overview and delivery counts
//! cargo run --bin admin -- campaign list --status sending
//! cargo run --bin admin -- campaign stats 7
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (required): PostgreSQL connection string
//! - `TOKEN_SIGNING_SECRET` (required for `token create`): must match the server's

use campaign_dispatch::application::services::auth_service::hash_token;
use campaign_dispatch::domain::entities::{Campaign, CampaignStatus};
use campaign_dispatch::domain::repositories::{
    CampaignRepository, DeliveryLogRepository, TokenRepository,
};
use campaign_dispatch::infrastructure::persistence::{
    PgCampaignRepository, PgDeliveryLogRepository, PgTokenRepository,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, Input};
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing campaign-dispatch.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Manage operator API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Inspect campaigns
    Campaign {
        #[command(subcommand)]
        action: CampaignAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Token management subcommands.
#[derive(Subcommand)]
enum TokenAction {
    /// Create a new API token
    Create {
        /// Token name, recorded as `created_by` on campaigns
        #[arg(short, long)]
        name: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List all tokens
    List,

    /// Revoke a token
    Revoke {
        /// Token name or ID to revoke
        name_or_id: String,
    },
}

/// Campaign inspection subcommands.
#[derive(Subcommand)]
enum CampaignAction {
    /// List recent campaigns
    List {
        /// Only campaigns in this state (draft, sending, sent)
        #[arg(short, long)]
        status: Option<CampaignStatus>,

        /// Maximum rows to show
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Show live delivery counts for one campaign
    Stats {
        id: i64,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    let pool = Arc::new(pool);

    match cli.command {
        Commands::Token { action } => handle_token_action(action, pool).await?,
        Commands::Campaign { action } => handle_campaign_action(action, pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

/// Dispatches token management commands.
async fn handle_token_action(action: TokenAction, pool: Arc<PgPool>) -> Result<()> {
    let repo = PgTokenRepository::new(pool);

    match action {
        TokenAction::Create { name, yes } => create_token(&repo, name, yes).await?,
        TokenAction::List => list_tokens(&repo).await?,
        TokenAction::Revoke { name_or_id } => revoke_token(&repo, name_or_id).await?,
    }

    Ok(())
}

/// Creates a new API token with interactive prompts.
///
/// Only the HMAC-SHA256 hash keyed by `TOKEN_SIGNING_SECRET` is stored; the
/// raw token is shown once.
async fn create_token(repo: &PgTokenRepository, name: Option<String>, yes: bool) -> Result<()> {
    let secret = std::env::var("TOKEN_SIGNING_SECRET")
        .context("TOKEN_SIGNING_SECRET must be set to create tokens")?;

    println!("{}", "Create API Token".bright_blue().bold());
    println!();

    let token_name = match name {
        Some(n) => n,
        None => Input::new()
            .with_prompt("Token name")
            .with_initial_text("marketing-ops")
            .interact_text()?,
    };

    let token_value = generate_token();

    println!("  Name:  {}", token_name.cyan());
    println!("  Token: {}", token_value.bright_yellow().bold());
    println!();
    println!(
        "{}",
        "Save this token now. It cannot be shown again.".red().bold()
    );
    println!();

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Create this token?")
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "Cancelled".red());
            return Ok(());
        }
    }

    repo.create(&token_name, &hash_token(&secret, &token_value))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create token: {}", e))?;

    println!("{}", "Token created.".green().bold());
    println!();
    println!(
        "  curl -H \"Authorization: Bearer {}\" http://localhost:3000/api/campaigns",
        token_value.bright_yellow()
    );
    println!();

    Ok(())
}

/// Lists all API tokens with status indicators.
async fn list_tokens(repo: &PgTokenRepository) -> Result<()> {
    let tokens = repo
        .list()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list tokens: {}", e))?;

    if tokens.is_empty() {
        println!("{}", "  No tokens found".yellow());
        println!(
            "  Create one with: {} admin token create",
            "cargo run --bin".bright_cyan()
        );
        return Ok(());
    }

    println!(
        "  {:<4} {:<30} {:<17} {:<17} {:<8}",
        "ID".bright_white().bold(),
        "Name".bright_white().bold(),
        "Created".bright_white().bold(),
        "Last used".bright_white().bold(),
        "Status".bright_white().bold()
    );
    println!("  {}", "-".repeat(80).bright_black());

    for token in &tokens {
        let status = if token.is_revoked() {
            "REVOKED".red()
        } else {
            "ACTIVE".green()
        };
        let last_used = token
            .last_used_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "  {:<4} {:<30} {:<17} {:<17} {}",
            token.id.to_string().bright_black(),
            token.name.cyan(),
            token.created_at.format("%Y-%m-%d %H:%M").to_string(),
            last_used.bright_black(),
            status
        );
    }

    println!();
    println!("  Total: {}", tokens.len().to_string().bright_white().bold());

    Ok(())
}

/// Revokes a token by name or numeric ID after confirmation.
async fn revoke_token(repo: &PgTokenRepository, name_or_id: String) -> Result<()> {
    let token = match name_or_id.parse::<i64>() {
        Ok(id) => repo
            .list()
            .await
            .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
            .into_iter()
            .find(|t| t.id == id),
        Err(_) => repo
            .find_by_name(&name_or_id)
            .await
            .map_err(|e| anyhow::anyhow!("Database error: {}", e))?,
    };

    let token = token.context("Token not found")?;

    if token.is_revoked() {
        println!("{}", "This token is already revoked".yellow());
        return Ok(());
    }

    println!("  Token: {}", token.name.cyan());
    println!("  ID:    {}", token.id.to_string().bright_black());
    println!();

    let confirmed = Confirm::new()
        .with_prompt("Revoke this token?")
        .default(false)
        .interact()?;

    if !confirmed {
        println!("{}", "Cancelled".red());
        return Ok(());
    }

    repo.revoke(token.id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to revoke token: {}", e))?;

    println!("{}", "Token revoked.".green().bold());

    Ok(())
}

/// Dispatches campaign inspection commands.
async fn handle_campaign_action(action: CampaignAction, pool: Arc<PgPool>) -> Result<()> {
    let campaigns = PgCampaignRepository::new(pool.clone());

    match action {
        CampaignAction::List { status, limit } => {
            let items = campaigns
                .list(status, 0, limit.clamp(1, 1000))
                .await
                .map_err(|e| anyhow::anyhow!("Failed to list campaigns: {}", e))?;

            if items.is_empty() {
                println!("{}", "  No campaigns found".yellow());
                return Ok(());
            }

            println!(
                "  {:<6} {:<32} {:<8} {:>8} {:>8} {:>8}",
                "ID".bright_white().bold(),
                "Name".bright_white().bold(),
                "Status".bright_white().bold(),
                "Total".bright_white().bold(),
                "Sent".bright_white().bold(),
                "Failed".bright_white().bold()
            );
            println!("  {}", "-".repeat(76).bright_black());

            for campaign in &items {
                println!(
                    "  {:<6} {:<32} {:<8} {:>8} {:>8} {:>8}",
                    campaign.id.to_string().bright_black(),
                    truncate(&campaign.name, 32).cyan(),
                    colored_status(campaign),
                    campaign.total_recipients,
                    campaign.success_count,
                    campaign.failed_count
                );
            }
        }
        CampaignAction::Stats { id } => {
            let campaign = campaigns
                .find_by_id(id)
                .await
                .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
                .context("Campaign not found")?;

            let deliveries = PgDeliveryLogRepository::new(pool);
            let counts = deliveries
                .count_by_status(id)
                .await
                .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

            println!("{}", campaign.name.bright_blue().bold());
            println!();
            println!("  Status:    {}", colored_status(&campaign));
            if campaign.paused {
                println!("  {}", "Paused".yellow());
            }
            println!("  Recipients: {}", campaign.total_recipients);
            println!("  Pending:    {}", counts.pending.to_string().yellow());
            println!("  Sent:       {}", counts.sent.to_string().green());
            println!("  Failed:     {}", counts.failed.to_string().red());
            if let Some(outcome) = campaign.outcome() {
                println!("  Outcome:    {:?}", outcome);
            }
        }
    }

    println!();
    Ok(())
}

fn colored_status(campaign: &Campaign) -> ColoredString {
    match campaign.status {
        CampaignStatus::Draft => "draft".bright_black(),
        CampaignStatus::Sending => "sending".yellow(),
        CampaignStatus::Sent => "sent".green(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}…")
    }
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "Database connection OK".green().bold());
        }
        DbAction::Info => {
            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            let tokens_count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM api_tokens WHERE revoked_at IS NULL")
                    .fetch_one(pool)
                    .await?;

            let recipients_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM accounts WHERE marketing_opt_in AND is_active",
            )
            .fetch_one(pool)
            .await?;

            println!("  PostgreSQL:          {}", version.bright_white());
            println!("  Active tokens:       {}", tokens_count.to_string().bright_green());
            println!(
                "  Opted-in recipients: {}",
                recipients_count.to_string().bright_green()
            );
        }
    }

    Ok(())
}

/// Generates a 48-character alphanumeric token.
fn generate_token() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    const TOKEN_LEN: usize = 48;

    let mut rng = rand::rng();

    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
