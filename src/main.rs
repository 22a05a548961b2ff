//! agent-chain command line.
//!
//! Usage:
//!   agent-chain init                   Run the setup wizard
//!   agent-chain create-twitter <h>     Train an agent on a Twitter profile
//!   agent-chain act <h>                Run one action for an agent
//!   agent-chain daemon                 Run the heartbeat scheduler
//!   agent-chain status                 Show configuration and counts

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use agent_chain::agent::CharacterSheet;
use agent_chain::chain::parse_address;
use agent_chain::config::{self, StorageBackend, CONFIG_FILE};
use agent_chain::context::AppContext;
use agent_chain::heartbeat::HeartbeatDaemon;
use agent_chain::types::*;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "agent-chain")]
#[command(version)]
#[command(about = "AI agent personas with on-chain token wallets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to agent-chain home directory.
    #[arg(long, default_value = "~/.agent-chain")]
    home: String,

    /// Log level (debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the first-time setup wizard.
    Init,

    /// Create an agent from a Twitter profile.
    CreateTwitter { handle: String },

    /// Create an agent from a character sheet (.json, .txt or .md).
    CreateCharacter {
        file: PathBuf,
        /// Handle for the agent; defaults to the character name.
        #[arg(long)]
        handle: Option<String>,
        /// Wallet address of the creating end user.
        #[arg(long)]
        creator: Option<String>,
    },

    /// Refresh bio and avatar of a Twitter agent.
    Refresh { handle: String },

    /// Talk to an agent. Without a message, starts an interactive session.
    Chat { handle: String, message: Option<String> },

    /// Run one action for an agent.
    Act {
        handle: String,
        /// Restrict random selection to a category.
        #[arg(long)]
        category: Option<ActionCategory>,
        /// Run a specific action template by id.
        #[arg(long)]
        action: Option<String>,
    },

    /// Rewrite one evolving trait (life_goals, skills, life_context).
    Evolve {
        handle: String,
        #[arg(value_name = "TRAIT")]
        kind: TraitKind,
    },

    /// Show (creating if needed) an agent's wallet.
    Wallet { handle: String },

    /// Token balance of an agent.
    Balance { handle: String },

    /// Send tokens from the relayer to an agent.
    Grant { handle: String, amount: String },

    /// Move tokens from an agent back to the relayer.
    Charge { handle: String, amount: String },

    /// Move tokens between two agents.
    Transfer { from: String, to: String, amount: String },

    /// Mint an artwork NFT to an agent.
    Mint { handle: String, url: String, title: String },

    /// NFTs held by an agent handle or address.
    Nfts { owner: String },

    /// Recent posts, for one agent or everyone.
    Feed {
        handle: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Register an end user by wallet address.
    Connect { address: String },

    /// Show configuration and state.
    Status,

    /// Run the heartbeat scheduler until Ctrl+C.
    Daemon,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let home_dir = PathBuf::from(shellexpand::tilde(&cli.home).into_owned());

    if let Commands::Init = cli.command {
        agent_chain::setup::run_setup_wizard(&home_dir)?;
        return Ok(());
    }

    let ctx = Arc::new(bootstrap(&home_dir)?);

    match cli.command {
        Commands::Init => Ok(()),
        Commands::CreateTwitter { handle } => cmd_create_twitter(&ctx, &handle).await,
        Commands::CreateCharacter { file, handle, creator } => {
            cmd_create_character(&ctx, &file, handle.as_deref(), creator.as_deref()).await
        }
        Commands::Refresh { handle } => cmd_refresh(&ctx, &handle).await,
        Commands::Chat { handle, message } => cmd_chat(&ctx, &handle, message).await,
        Commands::Act { handle, category, action } => cmd_act(&ctx, &handle, category, action).await,
        Commands::Evolve { handle, kind } => cmd_evolve(&ctx, &handle, kind).await,
        Commands::Wallet { handle } => cmd_wallet(&ctx, &handle).await,
        Commands::Balance { handle } => cmd_balance(&ctx, &handle).await,
        Commands::Grant { handle, amount } => cmd_grant(&ctx, &handle, &amount).await,
        Commands::Charge { handle, amount } => cmd_charge(&ctx, &handle, &amount).await,
        Commands::Transfer { from, to, amount } => cmd_transfer(&ctx, &from, &to, &amount).await,
        Commands::Mint { handle, url, title } => cmd_mint(&ctx, &handle, &url, &title).await,
        Commands::Nfts { owner } => cmd_nfts(&ctx, &owner).await,
        Commands::Feed { handle, limit } => cmd_feed(&ctx, handle.as_deref(), limit).await,
        Commands::Connect { address } => cmd_connect(&ctx, &address).await,
        Commands::Status => cmd_status(&ctx).await,
        Commands::Daemon => cmd_daemon(ctx).await,
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

async fn cmd_create_twitter(ctx: &AppContext, handle: &str) -> Result<()> {
    let trained = ctx.trainer.create_from_twitter(handle).await?;
    print_trained(&trained.agent, trained.created, trained.wallet.as_ref());
    Ok(())
}

async fn cmd_create_character(
    ctx: &AppContext,
    file: &Path,
    handle: Option<&str>,
    creator: Option<&str>,
) -> Result<()> {
    let sheet = CharacterSheet::from_file(file)?;
    println!("{} Parsed character '{}'", ">>>".green().bold(), sheet.name);
    if let Some(address) = creator {
        ctx.users.get_or_create(address).await?;
    }
    let trained = ctx.trainer.create_from_character(&sheet, handle, creator).await?;
    print_trained(&trained.agent, trained.created, trained.wallet.as_ref());
    Ok(())
}

async fn cmd_refresh(ctx: &AppContext, handle: &str) -> Result<()> {
    let agent = ctx.trainer.refresh(handle).await?;
    println!("{} Refreshed {}", ">>>".green().bold(), agent.handle);
    println!("  Bio:     {}", agent.bio.as_deref().unwrap_or("-"));
    println!("  Avatar:  {}", agent.profile_picture.as_deref().unwrap_or("-"));
    Ok(())
}

async fn cmd_chat(ctx: &AppContext, handle: &str, message: Option<String>) -> Result<()> {
    if let Some(message) = message {
        let reply = ctx.chat.reply(handle, &[], &message).await?;
        println!("{reply}");
        return Ok(());
    }

    println!("Chatting with {} (empty line to quit)\n", handle.bold());
    let stdin = io::stdin();
    let mut history: Vec<ChatMessage> = Vec::new();
    loop {
        print!("{} ", "you>".cyan().bold());
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
        let message = line.trim().to_string();
        match ctx.chat.reply(handle, &history, &message).await {
            Ok(reply) => {
                println!("{} {}\n", format!("{handle}>").green().bold(), reply);
                history.push(ChatMessage::user(message));
                history.push(ChatMessage::assistant(reply));
            }
            Err(e) => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
    }
    Ok(())
}

async fn cmd_act(
    ctx: &AppContext,
    handle: &str,
    category: Option<ActionCategory>,
    action: Option<String>,
) -> Result<()> {
    let outcome = match action {
        Some(id) => ctx.actions.execute_by_id(handle, &id).await?,
        None => ctx.actions.execute_random(handle, category).await?,
    };
    println!(
        "{} {} ran {} [{}]",
        ">>>".green().bold(),
        clean_handle(handle),
        outcome.template.name.bold(),
        outcome.template.category
    );
    println!("\n{}\n", outcome.output);
    match &outcome.tweet {
        Some(tweet) => println!("  Posted as {}", tweet.id.dimmed()),
        None => println!("  {}", "Not posted".dimmed()),
    }
    Ok(())
}

async fn cmd_evolve(ctx: &AppContext, handle: &str, kind: TraitKind) -> Result<()> {
    let update = ctx.evolver.evolve(handle, kind).await?;
    println!("{} Evolved {} of {}", ">>>".green().bold(), kind, update.handle);
    println!("\n{}\n", update.summary_of_the_changes);
    Ok(())
}

async fn cmd_feed(ctx: &AppContext, handle: Option<&str>, limit: usize) -> Result<()> {
    let handle = handle.map(clean_handle);
    let tweets = ctx.store.recent_smol_tweets(handle.as_deref(), limit).await?;
    if tweets.is_empty() {
        println!("{}", "No posts yet".dimmed());
    }
    for tweet in tweets {
        println!(
            "{} {} {}",
            format!("@{}", tweet.handle).bold(),
            tweet.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            format!("[{}]", tweet.action_type).dimmed()
        );
        println!("{}\n", tweet.content);
    }
    if let Some(handle) = handle {
        let results = ctx.actions.recent_results(&handle, 5).await?;
        if !results.is_empty() {
            println!("{}", "Recent actions".bold());
            for r in results {
                println!("  {} {} ({})", r.created_at.format("%Y-%m-%d %H:%M"), r.action_name, r.category);
            }
        }
    }
    Ok(())
}

async fn cmd_connect(ctx: &AppContext, address: &str) -> Result<()> {
    let user = ctx.users.get_or_create(address).await?;
    println!("{} Connected {}", ">>>".green().bold(), user.address);
    println!(
        "  Agent created: {}",
        if user.agent_created { "yes".green() } else { "no".yellow() }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

async fn cmd_wallet(ctx: &AppContext, handle: &str) -> Result<()> {
    let wallet = ctx.provisioner.ensure_wallet(handle).await?;
    println!("{} Wallet for {}", ">>>".green().bold(), wallet.handle);
    println!("  Address: {}", wallet.address);
    println!(
        "  Permit:  {}",
        if wallet.has_permit() { "signed".green() } else { "missing".yellow() }
    );
    Ok(())
}

async fn cmd_balance(ctx: &AppContext, handle: &str) -> Result<()> {
    let balance = ctx.treasury.balance_of_handle(handle).await?;
    println!("{} {} $AGENT", clean_handle(handle), format_ether(balance));
    Ok(())
}

async fn cmd_grant(ctx: &AppContext, handle: &str, amount: &str) -> Result<()> {
    let amount = parse_amount(amount)?;
    let tx = ctx.treasury.grant(handle, amount).await?;
    println!("{} Granted {} $AGENT ({})", ">>>".green().bold(), format_ether(amount), tx.hash_hex());
    Ok(())
}

async fn cmd_charge(ctx: &AppContext, handle: &str, amount: &str) -> Result<()> {
    let amount = parse_amount(amount)?;
    let receipt = ctx.treasury.charge(handle, amount).await?;
    println!(
        "{} Charged {} $AGENT (permit {}, transfer {})",
        ">>>".green().bold(),
        format_ether(amount),
        receipt.permit.hash_hex(),
        receipt.transfer.hash_hex()
    );
    Ok(())
}

async fn cmd_transfer(ctx: &AppContext, from: &str, to: &str, amount: &str) -> Result<()> {
    let amount = parse_amount(amount)?;
    let receipt = ctx.treasury.transfer_between(from, to, amount).await?;
    println!(
        "{} Sent {} $AGENT from {} to {} ({})",
        ">>>".green().bold(),
        format_ether(amount),
        clean_handle(from),
        clean_handle(to),
        receipt.transfer.hash_hex()
    );
    Ok(())
}

async fn cmd_mint(ctx: &AppContext, handle: &str, url: &str, title: &str) -> Result<()> {
    let tx = ctx.treasury.mint_nft(handle, url, title).await?;
    println!("{} Minted '{}' to {} ({})", ">>>".green().bold(), title, clean_handle(handle), tx.hash_hex());
    Ok(())
}

async fn cmd_nfts(ctx: &AppContext, owner: &str) -> Result<()> {
    let address = resolve_owner(ctx, owner).await?;
    let count = ctx.treasury.owned_nfts(address).await;
    println!("{} owns {} NFT(s)", address.to_checksum(None), count);
    Ok(())
}

// ---------------------------------------------------------------------------
// Status and daemon
// ---------------------------------------------------------------------------

async fn cmd_status(ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    let db = ctx.db.lock().await;
    let last_heartbeat = db.kv_get("last_heartbeat")?.unwrap_or_else(|| "never".into());
    let counts = match config.storage_backend {
        StorageBackend::Sqlite => Some((db.count_agents()?, db.count_wallets()?, db.count_action_events()?)),
        StorageBackend::Supabase => None,
    };
    drop(db);

    println!();
    println!("{}", "=== agent-chain Status ===".bold());
    println!();
    println!("  {}:", "Storage".bold());
    match counts {
        Some((agents, wallets, actions)) => {
            println!("    Backend:  sqlite ({})", config.resolved_db_path());
            println!("    Agents:   {}", agents);
            println!("    Wallets:  {}", wallets);
            println!("    Actions:  {}", actions);
        }
        None => println!("    Backend:  supabase ({})", config.supabase_url),
    }
    println!();
    println!("  {}:", "Chain".bold());
    println!("    Token:    {}", config.token_contract);
    println!("    NFT:      {}", config.nft_contract);
    println!("    Relayer:  {}", ctx.chain.relayer_address().to_checksum(None));
    if config.chain_enabled() {
        println!("    Mode:     {}", "online".green());
        match ctx.chain.token_balance(ctx.chain.relayer_address()).await {
            Ok(balance) => println!("    Balance:  {} $AGENT", format_ether(balance)),
            Err(e) => println!("    Balance:  {}", e.to_string().red()),
        }
    } else {
        println!("    Mode:     {}", "offline".yellow());
    }
    println!();
    println!("  {}:", "Services".bold());
    println!("    Gemini:     {} key(s), model {}", config.gemini_api_keys.len(), config.gemini_model);
    println!("    SocialData: {}", configured(&config.social_data_api_key));
    println!("    Discord:    {}", configured(&config.discord_webhook_url));
    println!("    Heartbeat:  {}", last_heartbeat);
    println!();

    Ok(())
}

async fn cmd_daemon(ctx: Arc<AppContext>) -> Result<()> {
    println!("{} Starting heartbeat daemon ...", ">>>".green().bold());

    let cancel = CancellationToken::new();

    let heartbeat_cancel = cancel.clone();
    let heartbeat_handle = tokio::spawn(async move {
        match HeartbeatDaemon::new(ctx) {
            Ok(mut daemon) => {
                if let Err(e) = daemon.run(heartbeat_cancel).await {
                    error!("Heartbeat daemon error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to create heartbeat daemon: {}", e);
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("\n{} Shutting down gracefully...", "<<<".red().bold());
    cancel.cancel();

    let shutdown_timeout = tokio::time::Duration::from_secs(10);
    if tokio::time::timeout(shutdown_timeout, heartbeat_handle).await.is_err() {
        warn!("Heartbeat task did not stop within {:?}", shutdown_timeout);
    }

    info!("Daemon shutdown complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load config (with env overrides) and wire the application context.
fn bootstrap(home_dir: &Path) -> Result<AppContext> {
    let config_path = home_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        eprintln!(
            "{} No config found at {:?}. Run `agent-chain init` first.",
            "Error:".red().bold(),
            config_path
        );
        std::process::exit(1);
    }

    let mut cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    cfg.apply_env();

    AppContext::from_config(cfg)
}

fn parse_amount(amount: &str) -> Result<U256> {
    parse_ether(amount.trim()).map_err(|e| anyhow!("Invalid amount '{amount}': {e}"))
}

/// An address as given, or the wallet address of a handle.
async fn resolve_owner(ctx: &AppContext, owner: &str) -> Result<Address> {
    if owner.starts_with("0x") {
        return Ok(parse_address(owner)?);
    }
    let wallet = ctx
        .store
        .get_wallet(owner)
        .await?
        .with_context(|| format!("No wallet for {}", clean_handle(owner)))?;
    Ok(parse_address(&wallet.address)?)
}

fn configured(value: &str) -> colored::ColoredString {
    if value.is_empty() {
        "not configured".yellow()
    } else {
        "configured".green()
    }
}

fn print_trained(agent: &Agent, created: bool, wallet: Option<&WalletRow>) {
    if created {
        println!("{} Created agent {} ({})", ">>>".green().bold(), agent.handle.bold(), agent.name());
    } else {
        println!("{} Agent {} already exists", ">>>".yellow().bold(), agent.handle.bold());
    }
    if let Some(bio) = agent.bio.as_deref().filter(|b| !b.is_empty()) {
        println!("  Bio:     {}", bio);
    }
    println!("  Skills:  {}", agent.skills);
    if let Some(wallet) = wallet {
        println!("  Wallet:  {}", wallet.address);
    }
}
