use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use slap_cache::{Slap, SlapOptions};
use slap_cli::commands;

#[derive(Parser)]
#[command(name = "slap-cli")]
#[command(about = "Slap CLI - Inspect and invalidate cached responses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cache key a GET request would use (no store access)
    Key {
        /// Rule configured on the route
        rule: String,

        /// Per-call disambiguator, such as a resource id
        #[arg(short = 's', long)]
        spec: Option<String>,

        /// Query parameter as name=value, in request order (repeatable)
        #[arg(short = 'q', long = "query")]
        query: Vec<String>,

        /// Value of the `fields` header
        #[arg(short = 'f', long)]
        fields: Option<String>,
    },
    /// List the keys tracked under a group
    Members {
        /// Group (rule) name
        group: String,
    },
    /// Delete every key tracked under the groups, and the groups themselves
    Clear {
        /// Group (rule) names
        #[arg(required = true)]
        groups: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Key {
            rule,
            spec,
            query,
            fields,
        } => handle_key(&rule, spec.as_deref(), &query, fields.as_deref()),
        Commands::Members { group } => handle_members(&group).await,
        Commands::Clear { groups } => handle_clear(&groups).await,
    }
}

async fn connect() -> Slap {
    let options = match SlapOptions::from_env() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    match Slap::connect(options).await {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("❌ Failed to connect to the cache store: {}", e);
            std::process::exit(1);
        }
    }
}

fn handle_key(rule: &str, spec: Option<&str>, query: &[String], fields: Option<&str>) {
    match commands::derive(rule, spec, query, fields) {
        Ok(key) => println!("{}", key),
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}

async fn handle_members(group: &str) {
    let cache = connect().await;

    match commands::list_members(&cache, group).await {
        Ok(members) if members.is_empty() => {
            println!("No keys tracked under `{}`", group);
        }
        Ok(members) => {
            for member in members {
                println!("{}", member);
            }
        }
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }

    cache.close().await;
}

async fn handle_clear(groups: &[String]) {
    let cache = connect().await;

    match commands::clear_groups(&cache, groups).await {
        Ok(removed) => {
            println!("✅ Cleared {} ({} keys in batch)", groups.join(", "), removed);
        }
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }

    cache.close().await;
}
