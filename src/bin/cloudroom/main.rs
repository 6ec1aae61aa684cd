use anyhow::{bail, Context};
use cloudroom::app_config;
use cloudroom::create_user::ensure_admin;
use cloudroom::db::{create_schema, init_db};
use cloudroom::forum::seed_default_categories;
use cloudroom::leaderboard::leaderboard;
use cloudroom::session::purge_expired_sessions;
use env_logger::Env;

const USAGE: &str = "usage: cloudroom <command>

commands:
  init-db                                   create missing tables and indexes
  seed-categories                           create the default forum categories
  create-admin <username> <email> <password>
                                            create or promote the admin account
  leaderboard [limit]                       print the coding leaderboard
  purge-sessions                            delete expired sessions";

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    init_environment();
    app_config::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| app_config::database().url);
    let db = init_db(url).await.context("Failed to connect to the database")?;

    match command.as_str() {
        "init-db" => {
            create_schema(db).await?;
            println!("Database ready.");
        }
        "seed-categories" => {
            create_schema(db).await?;
            let created = seed_default_categories(db).await?;
            println!("Created {} new categories.", created);
        }
        "create-admin" => {
            let [username, email, password] = match &args[1..] {
                [u, e, p] => [u, e, p],
                _ => bail!("create-admin needs <username> <email> <password>\n\n{}", USAGE),
            };
            create_schema(db).await?;
            let admin = ensure_admin(db, username, email, password).await?;
            println!("Admin ready: {} (id {})", admin.username, admin.id);
        }
        "leaderboard" => {
            let limit = match args.get(1) {
                Some(n) => n.parse().context("limit must be a number")?,
                None => 100,
            };
            for row in leaderboard(db, limit, 0).await? {
                println!(
                    "{:>4}  {:<24} {:>6} {:>6} {:>6} {:>7}",
                    row.rank, row.username, row.hackerrank, row.codechef, row.leetcode, row.total
                );
            }
        }
        "purge-sessions" => {
            let removed = purge_expired_sessions(db).await?;
            println!("Removed {} expired sessions.", removed);
        }
        other => bail!("unknown command `{}`\n\n{}", other, USAGE),
    }

    Ok(())
}

/// Loads `.env` and starts the logger, before settings are read.
fn init_environment() {
    // A missing .env is fine; the environment may already be set.
    if let Err(e) = dotenv::dotenv() {
        eprintln!("No .env loaded: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
