use anyhow::{Context, Result};
use catalog_admin::api::{CatalogClient, Category, Subcategory};
use catalog_admin::cache::QueryCache;
use catalog_admin::catalog::{CatalogStats, CategoryManager};
use catalog_admin::config::Config;
use catalog_admin::util::{pad_to_width, strip_control_chars};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

mod watch;

#[derive(Parser, Debug)]
#[command(
    name = "catalog-admin",
    version,
    about = "Manage storefront categories and subcategories"
)]
struct Args {
    /// Config file (default: ~/.config/catalog-admin/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage top-level categories
    #[command(subcommand)]
    Categories(CategoryCommand),

    /// Manage subcategories
    #[command(subcommand)]
    Subcategories(SubcategoryCommand),

    /// Print catalog statistics
    Stats,

    /// Keep the catalog fresh in the foreground (r: refresh, q: quit)
    Watch,
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    List,
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        id: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        id: String,
    },
    /// Flip the active flag
    Toggle {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum SubcategoryCommand {
    List {
        /// Only subcategories of this category
        #[arg(long, value_name = "CATEGORY_ID")]
        category: Option<String>,
    },
    Create {
        category_id: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        id: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Move under another category
        #[arg(long, value_name = "CATEGORY_ID")]
        category: Option<String>,
    },
    Delete {
        id: String,
    },
    /// Flip the active flag
    Toggle {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.config.or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            tracing::debug!("No config path available, using defaults");
            Config::default()
        }
    };
    tracing::debug!(?config, "Configuration resolved");

    let client = CatalogClient::new(
        &config.api_base_url,
        config.api_token(),
        config.request_timeout(),
    )
    .context("Failed to create API client")?;
    let cache = Arc::new(QueryCache::new(config.cache_capacity));
    let manager = Arc::new(
        CategoryManager::new(Arc::new(client), cache).with_stats_concurrency(config.stats_concurrency),
    );

    match args.command {
        Command::Categories(cmd) => run_category_command(&manager, cmd).await,
        Command::Subcategories(cmd) => run_subcategory_command(&manager, cmd).await,
        Command::Stats => {
            print_stats(&manager.stats().await?);
            Ok(())
        }
        Command::Watch => {
            let policy = config.refresh_policy(CategoryManager::data_groups())?;
            watch::run(manager, policy).await
        }
    }
}

async fn run_category_command(manager: &CategoryManager, cmd: CategoryCommand) -> Result<()> {
    match cmd {
        CategoryCommand::List => {
            let categories = manager.categories().await?;
            if categories.is_empty() {
                println!("No categories.");
            }
            for category in &categories {
                print_category(category);
            }
        }
        CategoryCommand::Create { name, description } => {
            let created = manager.create_category(&name, description.as_deref()).await?;
            println!("Created category {} ({})", created.name, created.id);
        }
        CategoryCommand::Update {
            id,
            name,
            description,
        } => {
            let updated = manager
                .update_category(&id, &name, description.as_deref())
                .await?;
            println!("Updated category {}", updated.id);
        }
        CategoryCommand::Delete { id } => {
            manager.delete_category(&id).await?;
            println!("Deleted category {id}");
        }
        CategoryCommand::Toggle { id } => {
            let current = manager
                .categories()
                .await?
                .into_iter()
                .find(|c| c.id == id)
                .with_context(|| format!("Category {id} not found"))?;
            let updated = manager.set_category_active(&id, !current.is_active).await?;
            println!("Category {} is now {}", updated.id, active_label(updated.is_active));
        }
    }
    Ok(())
}

async fn run_subcategory_command(manager: &CategoryManager, cmd: SubcategoryCommand) -> Result<()> {
    match cmd {
        SubcategoryCommand::List { category } => {
            let subcategories = match category {
                Some(category_id) => manager.subcategories_of(&category_id).await?,
                None => manager.subcategories().await?,
            };
            if subcategories.is_empty() {
                println!("No subcategories.");
            }
            for subcategory in &subcategories {
                print_subcategory(subcategory);
            }
        }
        SubcategoryCommand::Create {
            category_id,
            name,
            description,
        } => {
            let created = manager
                .create_subcategory(&category_id, &name, description.as_deref())
                .await?;
            println!("Created subcategory {} ({})", created.name, created.id);
        }
        SubcategoryCommand::Update {
            id,
            name,
            description,
            category,
        } => {
            let updated = manager
                .update_subcategory(&id, &name, description.as_deref(), category.as_deref())
                .await?;
            println!("Updated subcategory {}", updated.id);
        }
        SubcategoryCommand::Delete { id } => {
            manager.delete_subcategory(&id).await?;
            println!("Deleted subcategory {id}");
        }
        SubcategoryCommand::Toggle { id } => {
            let current = manager
                .subcategories()
                .await?
                .into_iter()
                .find(|s| s.id == id)
                .with_context(|| format!("Subcategory {id} not found"))?;
            let updated = manager
                .set_subcategory_active(&id, !current.is_active)
                .await?;
            println!("Subcategory {} is now {}", updated.id, active_label(updated.is_active));
        }
    }
    Ok(())
}

const ID_WIDTH: usize = 26;
const NAME_WIDTH: usize = 32;

fn active_label(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "inactive"
    }
}

fn print_category(category: &Category) {
    println!(
        "{}  {}  {}",
        pad_to_width(&category.id, ID_WIDTH),
        pad_to_width(&strip_control_chars(&category.name), NAME_WIDTH),
        active_label(category.is_active)
    );
}

fn print_subcategory(subcategory: &Subcategory) {
    println!(
        "{}  {}  {}  {}",
        pad_to_width(&subcategory.id, ID_WIDTH),
        pad_to_width(&strip_control_chars(&subcategory.name), NAME_WIDTH),
        pad_to_width(&subcategory.category_id, ID_WIDTH),
        active_label(subcategory.is_active)
    );
}

fn print_stats(stats: &CatalogStats) {
    println!(
        "Categories:    {} ({} active)",
        stats.total_categories, stats.active_categories
    );
    println!(
        "Subcategories: {} ({} active)",
        stats.total_subcategories, stats.active_subcategories
    );
    println!("Products:      {}", stats.total_products);
    if stats.per_category.is_empty() {
        return;
    }
    println!();
    for line in &stats.per_category {
        println!(
            "{}  {:>6} products  {:>4} subcategories",
            pad_to_width(&strip_control_chars(&line.name), NAME_WIDTH),
            line.products,
            line.subcategories
        );
    }
}
