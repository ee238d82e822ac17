//! metactl: administration tool for the metaserv catalog.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metaserv::admin::{split_statements, AdminCommand, AdminRunner, Outcome, HELP};
use metaserv::config::DatabaseConfig;
use metaserv::db::{create_pool, init_schema, PgStore};
use metaserv::services::LoadCatalogRequest;

#[derive(Parser)]
#[command(name = "metactl")]
#[command(version, about = "metaserv catalog administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Keep going after a failed statement (exec and shell)
    #[arg(long, global = true)]
    keep_going: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog tables if they do not exist
    Init,
    /// Register a project, user or database description
    Add {
        #[command(subcommand)]
        resource: AddResource,
    },
    /// Run `ADD ...;` statements from a script file
    ///
    /// Examples:
    ///     metactl exec setup.msql
    ///     metactl exec - < setup.msql
    #[command(verbatim_doc_comment)]
    Exec {
        /// Script path, or `-` for stdin
        script: String,
    },
    /// Read statements interactively (default when no command is given)
    Shell,
}

#[derive(Subcommand)]
enum AddResource {
    /// Register a project
    Project { name: String },
    /// Register a user; the email identifies database owners
    User {
        email: String,
        first_name: String,
        last_name: String,
    },
    /// Load a schema description file
    ///
    /// Examples:
    ///     metactl add dbdescr sdss_stripe82 sdss.sql sdss localhost 5432 L2 DR7 \
    ///         jane@lsst.org released LSST ~/.lsst/dbAuth-sdss.txt
    #[command(verbatim_doc_comment)]
    Dbdescr {
        db_name: String,
        schema_file: PathBuf,
        schema_name: String,
        host: String,
        port: u16,
        /// DC, L1, L2, L3 or dev
        level: String,
        data_release: String,
        /// Email of a registered user
        owner: String,
        /// released, unreleased or private
        accessibility: String,
        project: Option<String>,
        /// Client option file or postgres:// URL; enables the schema check
        auth_file: Option<String>,
        /// Free-text description of the database
        #[arg(long)]
        description: Option<String>,
    },
}

/// Initialize tracing/logging.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,metaserv=debug,metactl=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let db_config = DatabaseConfig::from_env().context("Failed to load POSTGRES_* settings")?;
    let pool = create_pool(&db_config)
        .await
        .with_context(|| format!("Failed to connect to {}", db_config.display_url()))?;

    let runner = AdminRunner::new(Arc::new(PgStore::new(pool.clone())));
    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Init => {
            init_schema(&pool).await?;
            println!("Catalog schema ready");
        }
        Commands::Add { resource } => {
            let outcome = runner.execute(add_command(resource)).await?;
            report(&outcome);
        }
        Commands::Exec { script } => {
            let text = if script == "-" {
                let mut text = String::new();
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Some(line) = lines.next_line().await? {
                    text.push_str(&line);
                    text.push('\n');
                }
                text
            } else {
                tokio::fs::read_to_string(&script)
                    .await
                    .with_context(|| format!("Failed to read script {}", script))?
            };
            run_script(&runner, &text, cli.keep_going).await?;
        }
        Commands::Shell => shell(&runner).await?,
    }

    Ok(())
}

fn add_command(resource: AddResource) -> AdminCommand {
    match resource {
        AddResource::Project { name } => AdminCommand::AddProject { name },
        AddResource::User {
            email,
            first_name,
            last_name,
        } => AdminCommand::AddUser {
            email,
            first_name,
            last_name,
        },
        AddResource::Dbdescr {
            db_name,
            schema_file,
            schema_name,
            host,
            port,
            level,
            data_release,
            owner,
            accessibility,
            project,
            auth_file,
            description,
        } => AdminCommand::AddDbDescr {
            request: LoadCatalogRequest {
                db_name,
                schema_name,
                schema_file,
                host,
                port,
                level,
                data_release,
                owner,
                accessibility,
                project,
                description,
            },
            auth: auth_file,
        },
    }
}

fn report(outcome: &Outcome) {
    match outcome {
        Outcome::ProjectAdded(id) => println!("Project added (id {})", id),
        Outcome::UserAdded(id) => println!("User added (id {})", id),
        Outcome::DatabaseLoaded(id) => println!("Database loaded (id {})", id),
        Outcome::Help => println!("{}", HELP),
        Outcome::Quit => {}
    }
}

/// Run every statement in `text`; stops at the first failure unless
/// `keep_going` is set.
async fn run_script(runner: &AdminRunner, text: &str, keep_going: bool) -> Result<()> {
    let statements = split_statements(text);
    tracing::debug!(count = statements.len(), "Running script");
    let mut failures = 0;
    for statement in statements {
        match run_statement(runner, &statement).await {
            Ok(Some(Outcome::Quit)) => break,
            Ok(_) => {}
            Err(e) if keep_going => {
                eprintln!("Error in '{}': {}", statement, e);
                failures += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("Statement failed: {}", statement)),
        }
    }
    if failures > 0 {
        anyhow::bail!("{} statement(s) failed", failures);
    }
    Ok(())
}

async fn run_statement(runner: &AdminRunner, statement: &str) -> Result<Option<Outcome>> {
    let Some(command) = AdminCommand::parse(statement)? else {
        return Ok(None);
    };
    let outcome = runner.execute(command).await?;
    report(&outcome);
    Ok(Some(outcome))
}

/// Interactive prompt. A statement ends at `;` and may span lines; several
/// statements may share a line. Ends on EOF, `QUIT;` or `EXIT;`.
async fn shell(runner: &AdminRunner) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = String::new();

    loop {
        let prompt = if pending.trim().is_empty() { "metactl > " } else { "~ " };
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };
        pending.push_str(&line);
        pending.push(' ');

        while let Some(pos) = pending.find(';') {
            let statement: String = pending.drain(..=pos).collect();
            let statement = statement.trim_end_matches(';');
            match run_statement(runner, statement).await {
                Ok(Some(Outcome::Quit)) => return Ok(()),
                Ok(_) => {}
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dbdescr_positional_arguments() {
        let cli = Cli::try_parse_from([
            "metactl",
            "add",
            "dbdescr",
            "sdss",
            "sdss.sql",
            "sdss",
            "localhost",
            "5432",
            "L2",
            "DR7",
            "jane@lsst.org",
            "released",
            "LSST",
            "--description",
            "Stripe 82",
        ])
        .unwrap();
        let Some(Commands::Add { resource }) = cli.command else {
            panic!("expected add command");
        };
        match add_command(resource) {
            AdminCommand::AddDbDescr { request, auth } => {
                assert_eq!(request.port, 5432);
                assert_eq!(request.project.as_deref(), Some("LSST"));
                assert_eq!(request.description.as_deref(), Some("Stripe 82"));
                assert_eq!(auth, None);
            }
            _ => panic!("expected dbdescr"),
        }
    }

    #[test]
    fn test_rejects_bad_port() {
        let result = Cli::try_parse_from([
            "metactl", "add", "dbdescr", "sdss", "s.sql", "sdss", "h", "port", "L2", "DR7", "o",
            "released",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_to_shell() {
        let cli = Cli::try_parse_from(["metactl"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.keep_going);
    }
}
