//! Minimal async ORM (sqlite + sqlx) that persists translatable models.
//!
//! Usage:
//! let db = Db::connect("sqlite::memory:").await?;
//! auto_migrate(Arc::new(db.clone())).await?;
//! db.save(&mut movie).await?;
//! db.reload(&mut movie).await?;
pub use futures::future::BoxFuture;
use crate::error::{Error, Result};
use crate::settings::{DatabaseSettings, Settings};
use crate::store::TranslationStore;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use log::{debug, info};
use sha2::{Digest, Sha256};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePoolOptions, SqliteRow};
pub use sqlx::FromRow;
use sqlx::Row;
use sqlx::{Executor, SqlitePool};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

const MIGRATIONS_TABLE: &str = "__translatable_migrations";

/// An async database pool wrapper.
#[derive(Clone, Debug)]
pub struct Db {
    pool: SqlitePool,
}

/// Migration function pointer for a model, registered through `inventory`.
pub type MigrationFn = fn(Arc<Db>) -> BoxFuture<'static, Result<()>>;

pub struct Migration(pub MigrationFn);

impl std::ops::Deref for Migration {
    type Target = MigrationFn;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Conversion between a model field and its TEXT representation in a row.
///
/// Every column travels as `Option<String>`; reads cast the column to TEXT
/// so INTEGER and DATETIME columns decode uniformly.
pub trait ColumnType: Sized {
    const SQL_TYPE: &'static str;

    fn to_sql(&self) -> Result<Option<String>>;
    fn from_sql(column: &str, value: Option<String>) -> Result<Self>;
}

fn invalid(column: &str, reason: impl ToString) -> Error {
    Error::InvalidColumn {
        column: column.to_string(),
        reason: reason.to_string(),
    }
}

impl ColumnType for String {
    const SQL_TYPE: &'static str = "TEXT NOT NULL DEFAULT ''";

    fn to_sql(&self) -> Result<Option<String>> {
        Ok(Some(self.clone()))
    }

    fn from_sql(column: &str, value: Option<String>) -> Result<Self> {
        value.ok_or_else(|| invalid(column, "unexpected NULL"))
    }
}

impl ColumnType for Option<String> {
    const SQL_TYPE: &'static str = "VARCHAR(255)";

    fn to_sql(&self) -> Result<Option<String>> {
        Ok(self.clone())
    }

    fn from_sql(_column: &str, value: Option<String>) -> Result<Self> {
        Ok(value)
    }
}

impl ColumnType for Option<i64> {
    const SQL_TYPE: &'static str = "INTEGER";

    fn to_sql(&self) -> Result<Option<String>> {
        Ok(self.map(|n| n.to_string()))
    }

    fn from_sql(column: &str, value: Option<String>) -> Result<Self> {
        value
            .map(|text| text.trim().parse().map_err(|e| invalid(column, e)))
            .transpose()
    }
}

impl ColumnType for Option<DateTime<Utc>> {
    const SQL_TYPE: &'static str = "DATETIME";

    fn to_sql(&self) -> Result<Option<String>> {
        Ok(self.map(|at| at.to_rfc3339_opts(SecondsFormat::Micros, true)))
    }

    fn from_sql(column: &str, value: Option<String>) -> Result<Self> {
        value
            .map(|text| {
                DateTime::parse_from_rfc3339(&text)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|e| invalid(column, e))
            })
            .transpose()
    }
}

impl ColumnType for TranslationStore {
    const SQL_TYPE: &'static str = "TEXT";

    fn to_sql(&self) -> Result<Option<String>> {
        self.encode().map(Some)
    }

    fn from_sql(_column: &str, value: Option<String>) -> Result<Self> {
        match value {
            Some(text) => TranslationStore::decode(&text),
            None => Ok(TranslationStore::new()),
        }
    }
}

/// Pulls the next raw value out of a row and converts it for `column`.
#[doc(hidden)]
pub fn decode_column<T: ColumnType>(
    values: &mut std::vec::IntoIter<Option<String>>,
    column: &str,
) -> Result<T> {
    let raw = values
        .next()
        .ok_or_else(|| invalid(column, "missing from row"))?;
    T::from_sql(column, raw)
}

/// A persisted model: schema description, row conversion and the
/// class-level translation queries.
///
/// Normally implemented with `#[derive(Model)]`.
#[async_trait::async_trait]
pub trait Model: Send + Sync + Sized + 'static {
    fn table_name() -> &'static str;
    fn model_name() -> &'static str;
    /// `(name, sql type)` of every column except `id`, in row order.
    fn columns() -> Vec<(String, String)>;

    fn create_table_sql() -> String {
        let mut definitions = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
        definitions.extend(
            Self::columns()
                .into_iter()
                .map(|(name, sqltype)| format!("{} {}", name, sqltype)),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            Self::table_name(),
            definitions.join(", ")
        )
    }

    /// Translated attribute names in declaration order.
    fn translated_attribute_names() -> &'static [&'static str] {
        &[]
    }

    fn translated_attributes() -> BTreeSet<&'static str> {
        Self::translated_attribute_names().iter().copied().collect()
    }

    fn translates() -> bool {
        !Self::translated_attribute_names().is_empty()
    }

    fn is_translated(name: &str) -> bool {
        Self::translated_attribute_names().contains(&name)
    }

    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
    /// Raw values matching `columns()` one to one.
    fn column_values(&self) -> Result<Vec<Option<String>>>;
    fn from_columns(id: i64, values: Vec<Option<String>>) -> Result<Self>;

    /// Called after every successful save; models with timestamps stamp
    /// them here.
    fn touch(&mut self, _now: DateTime<Utc>) {}

    /// `column_values()` as they will read once `touch(now)` has run.
    fn column_values_at(&self, _now: DateTime<Utc>) -> Result<Vec<Option<String>>> {
        self.column_values()
    }

    async fn migrate(db: Arc<Db>) -> Result<()> {
        let table_name = Self::table_name();
        let create_sql = Self::create_table_sql();
        let schema_hash = hash(&create_sql);

        ensure_migrations_table(&db).await?;

        let recorded: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT hash FROM {} WHERE table_name = ?",
            MIGRATIONS_TABLE
        ))
        .bind(table_name)
        .fetch_optional(&db.pool)
        .await?;

        let Some((recorded_hash,)) = recorded else {
            db.execute(&create_sql).await?;
            sqlx::query(&format!(
                "INSERT INTO {} (table_name, schema_sql, hash) VALUES (?, ?, ?)",
                MIGRATIONS_TABLE
            ))
            .bind(table_name)
            .bind(&create_sql)
            .bind(&schema_hash)
            .execute(&db.pool)
            .await?;
            info!(
                "Migrated `{}` (table created, initial schema applied).",
                table_name
            );
            return Ok(());
        };

        if recorded_hash == schema_hash {
            info!("No schema changes detected for `{}`.", table_name);
            return Ok(());
        }

        // Get existing cols from DB
        let pragma_sql = format!("PRAGMA table_info({})", table_name);
        let cols: Vec<String> = sqlx::query(&pragma_sql)
            .fetch_all(&db.pool)
            .await?
            .into_iter()
            .map(|row: SqliteRow| row.try_get::<String, _>("name"))
            .collect::<std::result::Result<_, _>>()?;

        let mut added = Vec::new();
        for (name, sqltype) in Self::columns() {
            if !cols.contains(&name) {
                let statement = format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    table_name, name, sqltype
                );
                db.execute(&statement).await?;
                added.push((name, sqltype));
            }
        }

        if added.is_empty() {
            info!("No new columns for `{}`; recording schema hash.", table_name);
        } else {
            info!(
                "Schema changes detected for `{}`: the following columns were added:",
                table_name
            );
            for (name, sqltype) in &added {
                info!("  - {} {}", name, sqltype);
            }
        }
        sqlx::query(&format!(
            "UPDATE {} SET schema_sql = ?, hash = ?, applied_at = CURRENT_TIMESTAMP \
             WHERE table_name = ?",
            MIGRATIONS_TABLE
        ))
        .bind(&create_sql)
        .bind(&schema_hash)
        .bind(table_name)
        .execute(&db.pool)
        .await?;
        Ok(())
    }
}

// Helper function to hash a SQL string
fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn ensure_migrations_table(db: &Db) -> Result<()> {
    db.execute(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT UNIQUE,
            table_name TEXT UNIQUE,
            schema_sql TEXT,
            hash TEXT,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        MIGRATIONS_TABLE
    ))
    .await
}

fn bind_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: Vec<Option<String>>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = query.bind(value);
    }
    query
}

fn select_sql<M: Model>() -> String {
    let mut list = vec!["id".to_string()];
    list.extend(
        M::columns()
            .into_iter()
            .map(|(name, _)| format!("CAST({0} AS TEXT) AS {0}", name)),
    );
    format!("SELECT {} FROM {}", list.join(", "), M::table_name())
}

fn row_to_model<M: Model>(row: &SqliteRow) -> Result<M> {
    let id: i64 = row.try_get("id")?;
    let values = M::columns()
        .iter()
        .map(|(name, _)| row.try_get::<Option<String>, _>(name.as_str()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    M::from_columns(id, values)
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI
    pub async fn connect(uri: &str) -> Result<Self> {
        Self::connect_with(&DatabaseSettings {
            url: uri.to_string(),
            ..DatabaseSettings::default()
        })
        .await
    }

    /// In-memory databases get a single long-lived connection so the schema
    /// survives between statements.
    pub async fn connect_with(settings: &DatabaseSettings) -> Result<Self> {
        let uri = settings.url.as_str();
        info!("Connecting to SQLite database at URI: {}", uri);
        let options = if uri.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(settings.max_connections.max(1))
        };
        let pool = options.connect(uri).await?;
        info!("Connected to SQLite database: {}", uri);
        Ok(Db { pool })
    }

    /// Execute an arbitrary SQL statement, e.g. DDL, INSERT, UPDATE.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        debug!("Executing SQL: {}", sql);
        let result = self.pool.execute(sql).await;
        match &result {
            Ok(_) => debug!("SQL executed successfully"),
            Err(e) => log::error!("SQL execution failed: {}", e),
        }
        result.map(|_| ()).map_err(Error::from)
    }

    /// Fetch all rows and map to a type implementing `FromRow`.
    pub async fn fetch_all<T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin>(
        &self,
        sql: &str,
    ) -> Result<Vec<T>> {
        debug!("Fetching rows with SQL: {}", sql);
        let result = sqlx::query_as(sql).fetch_all(&self.pool).await;
        match &result {
            Ok(rows) => debug!("Fetched {} rows successfully", rows.len()),
            Err(e) => log::error!("Row fetch failed: {}", e),
        }
        result.map_err(Error::from)
    }

    /// Inserts a new record or updates an existing one, translation store
    /// included. Timestamps are refreshed through `Model::touch`.
    pub async fn save<M: Model>(&self, record: &mut M) -> Result<()> {
        // stored timestamps carry microseconds; match that in memory
        let now = Utc::now().trunc_subsecs(6);
        let names: Vec<String> = M::columns().into_iter().map(|(name, _)| name).collect();
        let values = record.column_values_at(now)?;

        match record.id() {
            None => {
                let sql = if names.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES", M::table_name())
                } else {
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        M::table_name(),
                        names.join(", "),
                        vec!["?"; names.len()].join(", ")
                    )
                };
                debug!("Inserting `{}` record: {}", M::model_name(), sql);
                let result = bind_values(sqlx::query(&sql), values)
                    .execute(&self.pool)
                    .await?;
                record.set_id(result.last_insert_rowid());
            }
            Some(id) => {
                if names.is_empty() {
                    return Ok(());
                }
                let assignments: Vec<String> =
                    names.iter().map(|name| format!("{} = ?", name)).collect();
                let sql = format!(
                    "UPDATE {} SET {} WHERE id = ?",
                    M::table_name(),
                    assignments.join(", ")
                );
                debug!("Updating `{}` record {}: {}", M::model_name(), id, sql);
                let result = bind_values(sqlx::query(&sql), values)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(Error::RecordNotFound {
                        table: M::table_name(),
                        id,
                    });
                }
            }
        }
        record.touch(now);
        Ok(())
    }

    pub async fn find<M: Model>(&self, id: i64) -> Result<M> {
        let sql = format!("{} WHERE id = ?", select_sql::<M>());
        debug!("Fetching `{}` record {}", M::model_name(), id);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::RecordNotFound {
                table: M::table_name(),
                id,
            })?;
        row_to_model(&row)
    }

    pub async fn all<M: Model>(&self) -> Result<Vec<M>> {
        let sql = format!("{} ORDER BY id", select_sql::<M>());
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_model::<M>).collect()
    }

    /// Replaces the in-memory record with its stored row.
    pub async fn reload<M: Model>(&self, record: &mut M) -> Result<()> {
        let id = record.id().ok_or(Error::NotPersisted(M::model_name()))?;
        *record = self.find(id).await?;
        Ok(())
    }

    pub async fn destroy<M: Model>(&self, record: &M) -> Result<()> {
        let id = record.id().ok_or(Error::NotPersisted(M::model_name()))?;
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", M::table_name()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound {
                table: M::table_name(),
                id,
            });
        }
        debug!("Destroyed `{}` record {}", M::model_name(), id);
        Ok(())
    }
}

/// Boots from settings: installs locales, connects, applies migration files,
/// then migrates every registered model.
pub async fn setup(settings: &Settings) -> Result<Arc<Db>> {
    crate::locale::configure(&settings.i18n)?;
    let db = Arc::new(Db::connect_with(&settings.database).await?);
    let migrations_dir = Path::new(&settings.database.migrations_dir);
    if migrations_dir.is_dir() {
        apply_migration_files(db.clone(), migrations_dir).await?;
    } else {
        debug!("No migrations directory at {}", migrations_dir.display());
    }
    auto_migrate(db.clone()).await?;
    Ok(db)
}

/// Migrate all registered models using the inventory pattern.
pub async fn auto_migrate(db: Arc<Db>) -> Result<()> {
    info!("Starting auto migration of all registered models...");
    let mut total = 0;
    for m in inventory::iter::<Migration> {
        total += 1;
        if let Err(e) = m(db.clone()).await {
            log::error!("Auto-migration failed for a model: {}", e);
            return Err(e);
        }
    }
    info!("Auto migration completed for {} models.", total);
    Ok(())
}

fn migration_files(migrations_dir: &Path) -> Vec<walkdir::DirEntry> {
    // List .sql files in migrations directory, sorted by filename
    let mut files: Vec<_> = WalkDir::new(migrations_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|f| f.file_type().is_file())
        .filter(|f| f.path().extension().map(|e| e == "sql").unwrap_or(false))
        .collect();
    files.sort_by_key(|f| f.file_name().to_os_string());
    files
}

async fn is_applied(db: &Db, filename: &str) -> Result<bool> {
    let applied: Option<(String,)> = sqlx::query_as(&format!(
        "SELECT filename FROM {} WHERE filename = ?",
        MIGRATIONS_TABLE
    ))
    .bind(filename)
    .fetch_optional(&db.pool)
    .await?;
    Ok(applied.is_some())
}

/// Applies file-based migrations located in the `migrations_dir` directory.
/// Each migration file should be a *.sql file.
/// Already-applied migrations are skipped based on filename tracking.
pub async fn apply_migration_files(db: Arc<Db>, migrations_dir: impl AsRef<Path>) -> Result<()> {
    ensure_migrations_table(&db).await?;

    for entry in migration_files(migrations_dir.as_ref()) {
        let filename = entry.file_name().to_string_lossy().to_string();
        if is_applied(&db, &filename).await? {
            info!("Migration `{}` already applied.", filename);
            continue;
        }

        let sql = fs::read_to_string(entry.path())?;
        info!("Applying migration file: {}", filename);
        db.execute(&sql).await?;
        sqlx::query(&format!(
            "INSERT INTO {} (filename, schema_sql, hash) VALUES (?, ?, ?)",
            MIGRATIONS_TABLE
        ))
        .bind(&filename)
        .bind(&sql)
        .bind(hash(&sql))
        .execute(&db.pool)
        .await?;
        info!("Migration `{}` applied.", filename);
    }

    Ok(())
}

/// Migration files in `migrations_dir` that have not been applied yet.
pub async fn pending_migration_files(
    db: &Db,
    migrations_dir: impl AsRef<Path>,
) -> Result<Vec<String>> {
    ensure_migrations_table(db).await?;
    let mut pending = Vec::new();
    for entry in migration_files(migrations_dir.as_ref()) {
        let filename = entry.file_name().to_string_lossy().to_string();
        if !is_applied(db, &filename).await? {
            pending.push(filename);
        }
    }
    Ok(pending)
}

/// Fails with `Error::PendingMigrations` when any migration file is unapplied.
pub async fn ensure_migrated(db: &Db, migrations_dir: impl AsRef<Path>) -> Result<()> {
    let pending = pending_migration_files(db, migrations_dir).await?;
    if pending.is_empty() {
        Ok(())
    } else {
        log::error!("{} pending migration(s): {}", pending.len(), pending.join(", "));
        Err(Error::PendingMigrations(pending))
    }
}
