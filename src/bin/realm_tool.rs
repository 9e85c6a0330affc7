use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use realmkeep::{
    FileInventoryStore, FileRealmPersistence, InventoryStore, RealmId, RealmPersistence,
    RegionKind, SpaceId, StoreConfig, UserId,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "realm-tool")]
#[command(about = "Inspect realm records and inventory snapshots on disk")]
struct Cli {
    /// Data directory holding `realms/` and `inventories/`
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every stored realm
    List,
    /// Print one realm record as JSON
    Show {
        #[arg(long)]
        id: RealmId,
    },
    /// Summarize a user's stored inventory for a space (`global` or a realm id)
    Snapshot {
        #[arg(long)]
        space: SpaceId,
        #[arg(long)]
        user: UserId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::new(&cli.data_dir);
    config
        .validate()
        .map_err(|msg| anyhow!("invalid store configuration: {}", msg))?;

    match cli.command {
        Command::List => list_realms(&config).await,
        Command::Show { id } => show_realm(&config, id).await,
        Command::Snapshot { space, user } => show_snapshot(&config, space, user).await,
    }
}

async fn list_realms(config: &StoreConfig) -> Result<()> {
    let persistence = FileRealmPersistence::open(config.realms_dir())
        .await
        .with_context(|| format!("Failed to open realms in '{}'", config.realms_dir().display()))?;
    let realms = persistence.load_all().await.context("Failed to load realms")?;

    if realms.is_empty() {
        println!("No realms stored under '{}'", config.realms_dir().display());
        return Ok(());
    }

    println!("{:<36}  {:<20}  {:<8}  {:<10}  {}", "ID", "NAME", "MEMBERS", "TIER", "WORLD");
    for realm in &realms {
        println!(
            "{:<36}  {:<20}  {:<8}  {:<10}  {}",
            realm.id,
            realm.name,
            realm.members.len(),
            realm.border_tier_id,
            realm.world_folder
        );
    }
    println!("{} realm(s)", realms.len());
    Ok(())
}

async fn show_realm(config: &StoreConfig, id: RealmId) -> Result<()> {
    let persistence = FileRealmPersistence::open(config.realms_dir()).await?;
    let realm = persistence
        .load(id)
        .await
        .with_context(|| format!("Failed to load realm {}", id))?
        .ok_or_else(|| anyhow!("Realm {} not found", id))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&realm).context("Failed to render realm")?
    );
    Ok(())
}

async fn show_snapshot(config: &StoreConfig, space: SpaceId, user: UserId) -> Result<()> {
    let store = FileInventoryStore::open(config.inventories_dir()).await?;
    let snapshot = store
        .load(space, user)
        .await
        .with_context(|| format!("Failed to load inventory {}/{}", space, user))?
        .ok_or_else(|| anyhow!("No inventory stored for user {} in {}", user, space))?;
    let inventory = snapshot
        .restore()
        .context("Stored snapshot could not be decoded")?;

    println!("space:    {}", snapshot.source);
    println!("saved at: {}", snapshot.saved_at.to_rfc3339());
    for kind in RegionKind::ALL {
        let region = inventory.region(kind);
        println!("{:?} ({} slots)", kind, region.size());
        for (slot, item) in region.occupied() {
            println!("  [{:>2}] {} x{}", slot, item.material, item.amount);
        }
    }
    Ok(())
}
