//! Administrative command language.
//!
//! Statements end with `;` and may span lines:
//!
//! ```text
//! ADD PROJECT LSST;
//! ADD USER jane@lsst.org Jane Doe;
//! ADD DBDESCR sdss_stripe82 /data/sdss.sql sdss localhost 5432 L2 DR7
//!     jane@lsst.org released LSST ~/.lsst/dbAuth-sdss.txt;
//! ```
//!
//! Keywords are case-insensitive; arguments are whitespace separated.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::TargetConfig;
use crate::db::pool::connect_target;
use crate::db::MetaStore;
use crate::error::{AppError, AppResult};
use crate::introspect::PgInspector;
use crate::services::{IngestService, LoadCatalogRequest};

pub const HELP: &str = "\
Supported commands:

  ADD PROJECT <name>;
      Register a project.

  ADD USER <email> <firstName> <lastName>;
      Register a user. The email identifies the user as a database owner.

  ADD DBDESCR <dbName> <schemaFile> <schemaName> <host> <port> <level>
      <dataRel> <owner> <accessibility> [<project>] [<authFile>];
      Load a schema description file into the catalog.
        <level>          DC, L1, L2, L3 or dev
        <owner>          email of a registered user
        <accessibility>  released, unreleased or private
        <project>        name of a registered project
        <authFile>       client option file or postgres:// URL of the
                         described database; when given, the description
                         is checked against the live schema first

  HELP;
  QUIT; or EXIT;
";

/// One parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    AddProject {
        name: String,
    },
    AddUser {
        email: String,
        first_name: String,
        last_name: String,
    },
    AddDbDescr {
        request: LoadCatalogRequest,
        /// Target database for the consistency check.
        auth: Option<String>,
    },
    Help,
    Quit,
}

impl AdminCommand {
    /// Parse one statement without its trailing `;`. Blank input is `None`.
    pub fn parse(statement: &str) -> AppResult<Option<Self>> {
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            return Ok(None);
        };
        let command = match first.to_ascii_uppercase().as_str() {
            "ADD" => Self::parse_add(&tokens[1..])?,
            "HELP" => AdminCommand::Help,
            "QUIT" | "EXIT" => AdminCommand::Quit,
            other => {
                return Err(AppError::BadRequest(format!("Unsupported command '{}'", other)));
            }
        };
        Ok(Some(command))
    }

    fn parse_add(tokens: &[&str]) -> AppResult<Self> {
        let Some(kind) = tokens.first() else {
            return Err(AppError::BadRequest("Missing tokens for ADD".to_string()));
        };
        let args = &tokens[1..];
        match kind.to_ascii_uppercase().as_str() {
            "PROJECT" => match args {
                [name] => Ok(AdminCommand::AddProject {
                    name: name.to_string(),
                }),
                _ => Err(arg_count("ADD PROJECT", "1", args.len())),
            },
            "USER" => match args {
                [email, first, last] => Ok(AdminCommand::AddUser {
                    email: email.to_string(),
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                }),
                _ => Err(arg_count("ADD USER", "3", args.len())),
            },
            "DBDESCR" => Self::parse_dbdescr(args),
            other => Err(AppError::BadRequest(format!("Unsupported ADD target '{}'", other))),
        }
    }

    fn parse_dbdescr(args: &[&str]) -> AppResult<Self> {
        if !(9..=11).contains(&args.len()) {
            return Err(arg_count("ADD DBDESCR", "9 to 11", args.len()));
        }
        let port = args[4]
            .parse::<u16>()
            .map_err(|_| AppError::BadRequest(format!("Invalid port '{}'", args[4])))?;
        let request = LoadCatalogRequest {
            db_name: args[0].to_string(),
            schema_file: PathBuf::from(args[1]),
            schema_name: args[2].to_string(),
            host: args[3].to_string(),
            port,
            level: args[5].to_string(),
            data_release: args[6].to_string(),
            owner: args[7].to_string(),
            accessibility: args[8].to_string(),
            project: args.get(9).map(|s| s.to_string()),
            description: None,
        };
        Ok(AdminCommand::AddDbDescr {
            request,
            auth: args.get(10).map(|s| s.to_string()),
        })
    }
}

fn arg_count(command: &str, expected: &str, got: usize) -> AppError {
    AppError::BadRequest(format!(
        "{} expects {} arguments, got {}",
        command, expected, got
    ))
}

/// Split script text into statements on `;`. Lines starting with `#` are
/// comments.
pub fn split_statements(text: &str) -> Vec<String> {
    let cleaned: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    cleaned
        .split(';')
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// What a command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ProjectAdded(i64),
    UserAdded(i64),
    DatabaseLoaded(i64),
    Help,
    Quit,
}

/// Executes admin commands against a store.
#[derive(Clone)]
pub struct AdminRunner {
    ingest: IngestService,
}

impl AdminRunner {
    pub fn new(store: Arc<dyn MetaStore>) -> Self {
        Self {
            ingest: IngestService::new(store),
        }
    }

    pub async fn execute(&self, command: AdminCommand) -> AppResult<Outcome> {
        match command {
            AdminCommand::AddProject { name } => {
                self.ingest.add_project(&name).await.map(Outcome::ProjectAdded)
            }
            AdminCommand::AddUser {
                email,
                first_name,
                last_name,
            } => self
                .ingest
                .add_user(&email, &first_name, &last_name)
                .await
                .map(Outcome::UserAdded),
            AdminCommand::AddDbDescr { request, auth } => {
                let db_id = match auth {
                    Some(auth) => {
                        let target = TargetConfig::load(&auth).await?;
                        let pool = connect_target(target.connect_options()?).await?;
                        tracing::info!(schema = %request.schema_name, "Checking description against target database");
                        let inspector = PgInspector::new(pool.clone());
                        let result = self.ingest.load_catalog(request, Some(&inspector)).await;
                        pool.close().await;
                        result?
                    }
                    None => self.ingest.load_catalog(request, None).await?,
                };
                Ok(Outcome::DatabaseLoaded(db_id))
            }
            AdminCommand::Help => Ok(Outcome::Help),
            AdminCommand::Quit => Ok(Outcome::Quit),
        }
    }
}
