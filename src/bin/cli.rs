//! squidgate CLI
//!
//! Administers the gateway's users and routing records directly against the
//! database file.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde_json::json;
use squidgate::models::{self, Record, RecordEdit, RecordRequest, User};
use squidgate::{Changes, Config, Result, Store, StoreError};
use tracing_subscriber::{fmt, EnvFilter};

/// squidgate CLI
#[derive(Parser, Debug)]
#[command(name = "squidgate-cli")]
#[command(about = "Manage gateway users and routing records")]
#[command(version)]
struct Args {
    /// Gateway JSON configuration file (storage keys only)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overrides the configuration file
    #[arg(short, long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the admin user if no user exists
    Bootstrap,

    /// Manage users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage routing records
    Records {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Show where a hostname is routed
    Lookup {
        /// Requested hostname
        host: String,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// List all users
    List,

    /// Add a user
    Add {
        email: String,
        password: String,
    },

    /// Change a user's password
    Passwd {
        id: String,
        password: String,
    },

    /// Delete a user that owns no records
    Rm {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum RecordCommands {
    /// List all records
    List,

    /// Add a record
    Add {
        /// Owning user id
        #[arg(long)]
        owner: String,

        /// Hostname routed by this record
        fqdn: String,

        /// Backend host
        handler_host: String,

        /// Backend port
        handler_port: u16,

        /// Backend protocol (http or https)
        #[arg(long, default_value = "http")]
        protocol: String,
    },

    /// Change an existing record
    Edit {
        id: String,

        /// New hostname
        #[arg(long)]
        fqdn: Option<String>,

        /// New backend host
        #[arg(long)]
        host: Option<String>,

        /// New backend port
        #[arg(long)]
        port: Option<u16>,

        /// New backend protocol (http or https)
        #[arg(long)]
        protocol: Option<String>,

        /// Reassign the record to this user id
        #[arg(long)]
        owner: Option<String>,
    },

    /// Set or clear the blacklist flag
    Blacklist {
        id: String,

        /// Clear the flag instead of setting it
        #[arg(long)]
        clear: bool,
    },

    /// Delete a record
    Rm {
        id: String,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,squidgate=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let store = match Store::open(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            process::exit(1);
        }
    };

    let outcome = run(&store, args.command);

    if let Err(e) = store.close() {
        tracing::error!("Failed to close store: {}", e);
    }
    if let Err(e) = outcome {
        tracing::error!("{}", e);
        // Engine failures are distinguished from rejected input
        process::exit(if e.is_storage() { 2 } else { 1 });
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(db) = &args.db {
        config.db_file = db.clone();
    }
    Ok(config)
}

fn run(store: &Store, command: Commands) -> Result<()> {
    match command {
        Commands::Bootstrap => {
            match models::ensure_admin(store)? {
                Some(password) => println!("{} password set to {}", models::ADMIN_EMAIL, password),
                None => println!("users already exist, nothing to do"),
            }
            Ok(())
        }
        Commands::Users { command } => run_users(store, command),
        Commands::Records { command } => run_records(store, command),
        Commands::Lookup { host } => {
            match models::resolve_upstream(store, &host)? {
                Some(url) => println!("{} -> {}", host, url),
                None => println!("{} is not routed", host),
            }
            Ok(())
        }
    }
}

fn run_users(store: &Store, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::List => {
            let mut users: Vec<User> = Vec::new();
            store.all(&mut users)?;
            for user in users {
                println!("{}\t{}", user.id, user.email);
            }
        }
        UserCommands::Add { email, password } => {
            let user = models::create_user(store, &email, &password)?;
            println!("{}", user.id);
        }
        UserCommands::Passwd { id, password } => {
            let mut user = User {
                id,
                ..User::default()
            };
            models::set_password(store, &mut user, &password)?;
            println!("password updated for {}", user.email);
        }
        UserCommands::Rm { id } => {
            let user = User {
                id,
                ..User::default()
            };
            if !store.exists(&user)? {
                return Err(StoreError::NotFound {
                    kind: "User",
                    id: user.id,
                });
            }
            models::delete_user(store, &user)?;
        }
    }
    Ok(())
}

fn run_records(store: &Store, command: RecordCommands) -> Result<()> {
    match command {
        RecordCommands::List => {
            let mut records: Vec<Record> = Vec::new();
            store.all(&mut records)?;
            for record in records {
                let flag = if record.blacklist { "\tblacklisted" } else { "" };
                println!(
                    "{}\t{}\t{}\t{}{}",
                    record.id,
                    record.fqdn,
                    record.upstream_url(),
                    record.owner.email,
                    flag
                );
            }
        }
        RecordCommands::Add {
            owner,
            fqdn,
            handler_host,
            handler_port,
            protocol,
        } => {
            let request = RecordRequest {
                fqdn,
                handler_host,
                handler_port,
                handler_protocol: protocol,
            };
            let record = models::create_record(store, &owner, &request)?;
            println!("{}", record.id);
        }
        RecordCommands::Edit {
            id,
            fqdn,
            host,
            port,
            protocol,
            owner,
        } => {
            let edit = RecordEdit {
                fqdn,
                handler_host: host,
                handler_port: port,
                handler_protocol: protocol,
                owner_id: owner,
                ..RecordEdit::default()
            };
            let record = models::update_record(store, &id, &edit)?;
            println!(
                "{}\t{}\t{}\t{}",
                record.id,
                record.fqdn,
                record.upstream_url(),
                record.owner.email
            );
        }
        RecordCommands::Blacklist { id, clear } => {
            let mut record = Record {
                id,
                ..Record::default()
            };
            let mut changes = Changes::new();
            changes.insert("blacklist".to_string(), json!(!clear));
            changes.insert("updated_at".to_string(), json!(models::unix_now()));
            store.update(&mut record, &changes)?;
            println!("{}\tblacklist={}", record.fqdn, record.blacklist);
        }
        RecordCommands::Rm { id } => {
            let record = Record {
                id,
                ..Record::default()
            };
            store.delete(&record)?;
        }
    }
    Ok(())
}
