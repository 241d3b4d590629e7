use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use inbox_cache::auth::PasswordService;
use inbox_cache::migration::run_migrations;
use inbox_cache::{
    CacheStore, InboxConfig, InboxError, MailRecord, MemcachedStore, PgUserStore, UserDirectory,
};

#[derive(Parser, Debug)]
#[command(
    name = "inbox_admin",
    about = "Inspect and manage cached webmail inboxes"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the newest messages of an inbox as JSON.
    List {
        address: String,
        /// Maximum number of messages to print.
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Inbox password, if the inbox is protected.
        #[arg(long, default_value = "")]
        password: String,
    },
    /// Print one message as JSON.
    Show {
        address: String,
        id: i64,
        #[arg(long, default_value = "")]
        password: String,
    },
    /// Delete one message and write the inbox back.
    Delete {
        address: String,
        id: i64,
        #[arg(long, default_value = "")]
        password: String,
    },
    /// Append a raw RFC 5322 message file to an inbox, creating it if needed.
    Deliver {
        address: String,
        file: PathBuf,
        /// Message id to assign (defaults to one past the highest stored id).
        #[arg(long)]
        id: Option<i64>,
    },
    /// Set or change an inbox password.
    SetPassword { address: String, password: String },
}

type Directory = UserDirectory<PgUserStore, MemcachedStore>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    inbox_cache::init_logger();

    let args = Args::parse();
    let config = InboxConfig::from_env()?;
    let cache = Arc::new(MemcachedStore::new(
        config.memcache_hosts.clone(),
        config.memcache_expiry_secs,
    )?);

    if let Command::Deliver { address, file, id } = &args.command {
        return deliver(&cache, address, file, *id).await;
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.require_database_url()?)
        .await?;
    run_migrations(&pool).await?;

    let passwords = PasswordService::new(config.hash_secret.as_bytes())?;
    let directory = UserDirectory::new(Arc::new(PgUserStore::new(pool)), cache, passwords);

    match run(&directory, args.command).await {
        Ok(()) => Ok(()),
        Err(
            err @ (InboxError::NoSuchUser(_)
            | InboxError::NoSuchMessage(_)
            | InboxError::PasswordProtected(_)
            | InboxError::InvalidAddress(_)),
        ) => {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

async fn run(directory: &Directory, command: Command) -> Result<(), InboxError> {
    match command {
        Command::List {
            address,
            count,
            password,
        } => {
            let user = directory.lookup_or_create(&address).await?;
            let mailbox = directory.inbox(&user, &password).await?;
            print_json(&mailbox.latest_listing(count));
        }
        Command::Show {
            address,
            id,
            password,
        } => {
            let user = directory.lookup_or_create(&address).await?;
            let mailbox = directory.inbox(&user, &password).await?;
            print_json(&mailbox.message_transport(id)?);
        }
        Command::Delete {
            address,
            id,
            password,
        } => {
            let user = directory.lookup_or_create(&address).await?;
            let mut mailbox = directory.inbox(&user, &password).await?;
            if mailbox.delete_message(id).await? {
                println!(
                    "Deleted message {id} from '{address}' ({} remaining)",
                    mailbox.message_count()
                );
            } else {
                println!("No message {id} in '{address}'; nothing deleted");
            }
        }
        Command::SetPassword { address, password } => {
            let mut user = directory.lookup_or_create(&address).await?;
            let changed = user.has_password();
            directory.set_password(&mut user, &password).await?;
            let verb = if changed { "Changed" } else { "Set" };
            println!("{verb} password for '{address}'");
        }
        Command::Deliver { .. } => {}
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => log::error!("failed to serialize output: {}", err),
    }
}

async fn deliver(
    cache: &MemcachedStore,
    address: &str,
    file: &Path,
    id: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !address.is_ascii() {
        return Err(InboxError::InvalidAddress(address.to_string()).into());
    }

    let raw = tokio::fs::read_to_string(file).await?;

    // Read-modify-write with no lock: a concurrent writer to the same inbox
    // can be overwritten, same as any other write-back.
    let mut records = cache.get(address).await?.unwrap_or_default();
    let id = id.unwrap_or_else(|| {
        records
            .iter()
            .map(|record| record.message_id)
            .max()
            .unwrap_or(0)
            + 1
    });
    records.push(MailRecord::new(id, raw));
    cache.set(address, &records).await?;

    println!(
        "Delivered message {id} to '{address}' ({} total)",
        records.len()
    );
    Ok(())
}
