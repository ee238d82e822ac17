//! Ingestion of users, projects and database descriptions.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::models::{Accessibility, Level, NewCatalog, NewUser};
use crate::db::MetaStore;
use crate::description::read_description;
use crate::error::{AppError, AppResult};
use crate::introspect::{check_consistency, SchemaInspector};
use crate::result_ext::ResultExt;

/// Arguments of `ADD DBDESCR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadCatalogRequest {
    pub db_name: String,
    pub schema_name: String,
    pub schema_file: PathBuf,
    pub host: String,
    pub port: u16,
    pub level: String,
    pub data_release: String,
    /// Email of a registered user.
    pub owner: String,
    pub accessibility: String,
    pub project: Option<String>,
    pub description: Option<String>,
}

/// Write side of the catalog.
#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn MetaStore>,
}

impl IngestService {
    pub fn new(store: Arc<dyn MetaStore>) -> Self {
        Self { store }
    }

    /// Register a project and return its id.
    pub async fn add_project(&self, name: &str) -> AppResult<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("project name is required".to_string()));
        }
        let id = self
            .store
            .insert_project(name)
            .await
            .log(format!("adding project {}", name))?;
        tracing::info!(project = name, id, "Project added");
        Ok(id)
    }

    /// Register a user and return its id.
    pub async fn add_user(&self, email: &str, first_name: &str, last_name: &str) -> AppResult<i64> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation(format!("invalid email '{}'", email)));
        }
        let user = NewUser {
            email: email.to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
        };
        let id = self
            .store
            .insert_user(&user)
            .await
            .log(format!("adding user {}", email))?;
        tracing::info!(email, id, "User added");
        Ok(id)
    }

    /// Load a schema description into the catalog and return the new
    /// database id.
    ///
    /// When `target` is given the description is first checked against the
    /// live schema and every mismatch is reported at once. Nothing is
    /// written unless all checks pass.
    pub async fn load_catalog(
        &self,
        request: LoadCatalogRequest,
        target: Option<&dyn SchemaInspector>,
    ) -> AppResult<i64> {
        let description = read_description(&request.schema_file)
            .await
            .log(format!("reading {}", request.schema_file.display()))?;
        tracing::debug!(
            file = %request.schema_file.display(),
            tables = description.tables.len(),
            columns = description.column_count(),
            "Description parsed"
        );

        if let Some(inspector) = target {
            let mismatches =
                check_consistency(inspector, &request.schema_name, &description).await?;
            if !mismatches.is_empty() {
                return Err(AppError::SchemaMismatch(mismatches));
            }
        }

        let level: Level = request.level.parse()?;
        let accessibility: Accessibility = request.accessibility.parse()?;

        let owner_id = self
            .store
            .find_user_id(&request.owner)
            .await?
            .ok_or_else(|| AppError::UnknownOwner(request.owner.clone()))?;

        let project_id = match request.project.as_deref() {
            Some(name) => Some(
                self.store
                    .find_project_id(name)
                    .await?
                    .ok_or_else(|| AppError::UnknownProject(name.to_string()))?,
            ),
            None => None,
        };

        let catalog = NewCatalog {
            db_name: request.db_name,
            description: request.description,
            schema_name: request.schema_name,
            host: request.host,
            port: i32::from(request.port),
            level,
            data_release: request.data_release,
            accessibility,
            owner_id,
            project_id,
            tables: description.tables,
        };

        let db_id = self
            .store
            .insert_catalog(&catalog)
            .await
            .log(format!("loading database {}", catalog.db_name))?;

        tracing::info!(
            database = %catalog.db_name,
            db_id,
            level = %catalog.level,
            tables = catalog.tables.len(),
            "Database description loaded"
        );
        Ok(db_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{live_column, MemoryStore, RowCounts, StaticInspector};
    use std::io::Write;

    const OBJECT_SOURCE: &str = "\
CREATE TABLE Object
    -- <descr>Objects.</descr>
(
    objectId BIGINT NOT NULL,
        -- <ucd>meta.id;src</ucd>
    ra DOUBLE NOT NULL,
        -- <descr>Right ascension.</descr>
        -- <unit>deg</unit>
    flux FLOAT[3] NULL
) ENGINE=MyISAM;

CREATE TABLE Source
(
    sourceId BIGINT NOT NULL,
    objectId BIGINT NULL
);
";

    fn description_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn request(db_name: &str, file: &tempfile::NamedTempFile) -> LoadCatalogRequest {
        LoadCatalogRequest {
            db_name: db_name.to_string(),
            schema_name: "sdss".to_string(),
            schema_file: file.path().to_path_buf(),
            host: "localhost".to_string(),
            port: 5432,
            level: "L2".to_string(),
            data_release: "DR1".to_string(),
            owner: "jane@lsst.org".to_string(),
            accessibility: "released".to_string(),
            project: None,
            description: None,
        }
    }

    async fn service_with_owner() -> (Arc<MemoryStore>, IngestService) {
        let store = Arc::new(MemoryStore::default());
        let service = IngestService::new(store.clone());
        service.add_user("jane@lsst.org", "Jane", "Doe").await.unwrap();
        (store, service)
    }

    #[tokio::test]
    async fn test_load_creates_all_rows() {
        let (store, service) = service_with_owner().await;
        let file = description_file(OBJECT_SOURCE);

        service.load_catalog(request("sdss_stripe82", &file), None).await.unwrap();

        assert_eq!(
            store.row_counts(),
            RowCounts {
                repos: 1,
                databases: 1,
                schemas: 1,
                tables: 2,
                columns: 5,
            }
        );
    }

    #[tokio::test]
    async fn test_column_ordinals_follow_file_order() {
        let (store, service) = service_with_owner().await;
        let file = description_file(OBJECT_SOURCE);
        service.load_catalog(request("sdss", &file), None).await.unwrap();

        let db = store.get_database("sdss").await.unwrap().unwrap();
        let schema_id = db.default_schema_id.unwrap();
        let table = store.get_table(schema_id, "Object").await.unwrap().unwrap();
        let columns = store.list_columns(table.id).await.unwrap();
        let names: Vec<(&str, i32)> = columns.iter().map(|c| (c.name.as_str(), c.ordinal)).collect();
        assert_eq!(names, vec![("objectId", 0), ("ra", 1), ("flux", 2)]);
        assert_eq!(columns[1].unit.as_deref(), Some("deg"));
        assert_eq!(columns[2].arraysize, Some(3));
    }

    #[tokio::test]
    async fn test_exactly_one_default_schema() {
        let (store, service) = service_with_owner().await;
        let file = description_file(OBJECT_SOURCE);
        let db_id = service.load_catalog(request("sdss", &file), None).await.unwrap();

        let schemas = store.list_schemas(db_id).await.unwrap();
        assert_eq!(schemas.iter().filter(|s| s.is_default_schema).count(), 1);
        assert_eq!(schemas[0].name, "sdss");
    }

    #[tokio::test]
    async fn test_duplicate_database_leaves_store_unchanged() {
        let (store, service) = service_with_owner().await;
        let file = description_file(OBJECT_SOURCE);
        service.load_catalog(request("sdss", &file), None).await.unwrap();
        let before = store.row_counts();

        let err = service.load_catalog(request("sdss", &file), None).await.unwrap_err();

        assert!(matches!(err, AppError::Duplicate(_)));
        assert_eq!(store.row_counts(), before);
    }

    #[tokio::test]
    async fn test_failure_mid_insert_rolls_back() {
        let (store, service) = service_with_owner().await;
        store.fail_on_column("sourceId");
        let file = description_file(OBJECT_SOURCE);

        assert!(service.load_catalog(request("sdss", &file), None).await.is_err());
        assert_eq!(store.row_counts(), RowCounts::default());
    }

    #[tokio::test]
    async fn test_duplicate_user_email() {
        let (_, service) = service_with_owner().await;
        let err = service.add_user("jane@lsst.org", "C", "D").await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_add_user_rejects_bad_email() {
        let service = IngestService::new(Arc::new(MemoryStore::default()));
        let err = service.add_user("jane", "Jane", "Doe").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_project() {
        let service = IngestService::new(Arc::new(MemoryStore::default()));
        service.add_project("LSST").await.unwrap();
        let err = service.add_project("LSST").await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
        assert!(matches!(
            service.add_project("  ").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_owner() {
        let store = Arc::new(MemoryStore::default());
        let service = IngestService::new(store.clone());
        let file = description_file(OBJECT_SOURCE);

        let err = service.load_catalog(request("sdss", &file), None).await.unwrap_err();

        assert!(matches!(err, AppError::UnknownOwner(ref e) if e == "jane@lsst.org"));
        assert_eq!(store.row_counts(), RowCounts::default());
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let (store, service) = service_with_owner().await;
        let file = description_file(OBJECT_SOURCE);
        let mut req = request("sdss", &file);
        req.project = Some("Gaia".to_string());

        let err = service.load_catalog(req, None).await.unwrap_err();

        assert!(matches!(err, AppError::UnknownProject(_)));
        assert_eq!(store.row_counts(), RowCounts::default());
    }

    #[tokio::test]
    async fn test_project_is_recorded() {
        let (store, service) = service_with_owner().await;
        service.add_project("LSST").await.unwrap();
        let file = description_file(OBJECT_SOURCE);
        let mut req = request("sdss", &file);
        req.project = Some("LSST".to_string());

        service.load_catalog(req, None).await.unwrap();

        let db = store.get_database("sdss").await.unwrap().unwrap();
        assert_eq!(db.project.as_deref(), Some("LSST"));
        assert_eq!(db.owner_email.as_deref(), Some("jane@lsst.org"));
    }

    #[tokio::test]
    async fn test_invalid_level_and_accessibility() {
        let (_, service) = service_with_owner().await;
        let file = description_file(OBJECT_SOURCE);

        let mut req = request("sdss", &file);
        req.level = "L9".to_string();
        let err = service.load_catalog(req, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidEnumValue { field: "level", .. }));

        let mut req = request("sdss", &file);
        req.accessibility = "public".to_string();
        let err = service.load_catalog(req, None).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidEnumValue {
                field: "accessibility",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_malformed_description_writes_nothing() {
        let (store, service) = service_with_owner().await;
        let file = description_file("CREATE TABLE Object\n(\n    objectId\n);\n");

        let err = service.load_catalog(request("sdss", &file), None).await.unwrap_err();

        assert!(matches!(err, AppError::MalformedDescription { line: 3, .. }));
        assert_eq!(store.row_counts(), RowCounts::default());
    }

    #[tokio::test]
    async fn test_schema_mismatches_are_collected() {
        let (store, service) = service_with_owner().await;
        let file = description_file(OBJECT_SOURCE);
        let inspector = StaticInspector::default().with_table(
            "sdss",
            "Object",
            vec![
                live_column("objectId", "bigint", 1),
                live_column("ra", "text", 2),
            ],
        );

        let err = service
            .load_catalog(request("sdss", &file), Some(&inspector))
            .await
            .unwrap_err();

        match err {
            AppError::SchemaMismatch(mismatches) => {
                // ra type, flux missing, Source table missing
                assert_eq!(mismatches.len(), 3);
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
        assert_eq!(store.row_counts(), RowCounts::default());
    }

    #[tokio::test]
    async fn test_consistent_target_is_loaded() {
        let (store, service) = service_with_owner().await;
        let file = description_file(OBJECT_SOURCE);
        let mut flux = live_column("flux", "ARRAY", 3);
        flux.udt_name = "_float4".to_string();
        let inspector = StaticInspector::default()
            .with_table(
                "sdss",
                "Object",
                vec![
                    live_column("objectId", "bigint", 1),
                    live_column("ra", "double precision", 2),
                    flux,
                ],
            )
            .with_table(
                "sdss",
                "Source",
                vec![
                    live_column("sourceId", "bigint", 1),
                    live_column("objectId", "bigint", 2),
                ],
            );

        service
            .load_catalog(request("sdss", &file), Some(&inspector))
            .await
            .unwrap();
        assert_eq!(store.row_counts().tables, 2);
    }
}
