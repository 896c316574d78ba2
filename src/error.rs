use thiserror::Error;

/// Errors produced by the translation layer and its persistence bridge.
#[derive(Error, Debug)]
pub enum Error {
    /// Failure reported by the database; surfaced unchanged.
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
    /// Failure reading a migration file or similar local resource
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The translation store column could not be encoded or decoded
    #[error("translation store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Text that is not a well-formed locale identifier
    #[error("invalid locale identifier `{0}`")]
    InvalidLocale(String),
    /// The locale is valid but not among the configured available locales
    #[error("locale `{0}` is not an available locale")]
    UnavailableLocale(String),
    /// A localized accessor was used with an attribute the model does not translate
    #[error("`{attribute}` is not a translated attribute of `{model}`")]
    UntranslatedAttribute {
        model: &'static str,
        attribute: String,
    },
    #[error("unsupported translation store version {0}")]
    UnsupportedStoreVersion(u64),
    /// A stored column value could not be converted into its field type
    #[error("column `{column}` holds an invalid value: {reason}")]
    InvalidColumn { column: String, reason: String },
    #[error("no `{table}` row with id {id}")]
    RecordNotFound { table: &'static str, id: i64 },
    /// The operation needs a saved record but the record has no id yet
    #[error("`{0}` record has not been saved yet")]
    NotPersisted(&'static str),
    #[error("pending migrations: {}", .0.join(", "))]
    PendingMigrations(Vec<String>),
}

pub type Result<T> = std::result::Result<T, Error>;
