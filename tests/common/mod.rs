#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use translatable::locale;
use translatable::orm::auto_migrate;
use translatable::prelude::*;
use translatable::LocaleReport;

/// Translated attributes without native columns of the same name.
#[derive(Debug, Default, Clone, Model)]
#[translates(name, description)]
pub struct Genre {
    pub id: Option<i64>,
    pub i18n: TranslationStore,
    pub other: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// `title` is both a native column and a translated attribute.
#[derive(Debug, Default, Clone, Model)]
#[translates(title, description)]
pub struct Movie {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub i18n: TranslationStore,
    pub other: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Held by every test that reads or switches the process-wide locale.
/// Resets the current locale to the default on acquisition.
pub fn locale_lock() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    let guard = LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    locale::set_current(locale::default_locale()).unwrap();
    guard
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub async fn connect() -> Arc<Db> {
    init_logging();
    Arc::new(Db::connect("sqlite::memory:").await.unwrap())
}

/// Fresh in-memory database with every registered model migrated.
pub async fn setup_db() -> Arc<Db> {
    let db = connect().await;
    auto_migrate(db.clone()).await.unwrap();
    db
}

pub fn loc(tag: &str) -> Locale {
    Locale::new(tag).unwrap()
}

pub fn report(entries: &[(&'static str, &[&str])]) -> LocaleReport {
    entries
        .iter()
        .map(|(name, tags)| (*name, tags.iter().map(|t| loc(t)).collect()))
        .collect::<BTreeMap<_, _>>()
}
