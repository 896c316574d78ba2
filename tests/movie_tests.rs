mod common;

use common::{Movie, loc, locale_lock, report, setup_db};
use translatable::locale;
use translatable::prelude::*;
use translatable::{Error, LocaleReport};

const TITLE_EN: &str = "Blade Runner";
const TITLE_RU: &str = "Бегущий по лезвию";
const TITLE_TR: &str = "Ölüm takibi";

// ========== Declaration ==========

#[test]
fn test_reports_it_translates() {
    assert!(Movie::translates());
}

#[test]
fn test_translated_attributes() {
    let attrs: Vec<_> = Movie::translated_attributes().into_iter().collect();
    assert_eq!(attrs, vec!["description", "title"]);

    let mut names = Movie::translated_attribute_names().to_vec();
    names.sort();
    assert_eq!(names, attrs);
}

#[test]
fn test_translated_predicate() {
    assert!(Movie::is_translated("title"));
    assert!(Movie::is_translated("description"));
    assert!(!Movie::is_translated("other"));
    assert!(!Movie::is_translated("id"));
    assert!(!Movie::is_translated("nonsense"));
}

#[test]
fn test_native_title_column_is_still_declared() {
    let columns: Vec<String> = Movie::columns().into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        columns,
        vec!["title", "i18n", "other", "created_at", "updated_at"]
    );
}

// ========== New records ==========

#[test]
fn test_new_record_translated_locales() {
    let _guard = locale_lock();
    let movie = Movie::default();
    assert_eq!(movie.translated_locales(), vec![locale::default_locale()]);
}

#[test]
fn test_new_record_translated_locales_ignore_current_locale() {
    let _guard = locale_lock();
    locale::set_current(loc("ko")).unwrap();
    let locales = Movie::default().translated_locales();
    locale::set_current(locale::default_locale()).unwrap();
    assert_eq!(locales, vec!["en"]);
}

#[test]
fn test_new_record_translation_missing_is_truthy() {
    let _guard = locale_lock();
    let movie = Movie::default();
    assert!(movie.is_translation_missing());
    assert_eq!(
        movie.translation_missing(),
        report(&[("title", &["en"]), ("description", &["en"])])
    );
}

#[test]
fn test_new_record_fields_are_nil() {
    let _guard = locale_lock();
    let movie = Movie::default();
    assert_eq!(movie.title(), None);
    assert_eq!(movie.description(), None);
    assert_eq!(movie.description_in(&locale::default_locale()), None);
    assert_eq!(movie.title_in(&loc("ko")), None);
    assert_eq!(movie.description_in(&loc("de")), None);
    assert_eq!(movie.get("title").unwrap(), None);
}

#[test]
fn test_new_record_translation_coverage() {
    let movie = Movie::default();
    assert_eq!(movie.translation_coverage(), LocaleReport::new());
    assert_eq!(movie.translation_coverage_for("title"), Some(vec![]));
    assert_eq!(movie.translation_coverage_for("description"), Some(vec![]));
    assert_eq!(movie.translation_coverage_for("other"), None);
}

#[test]
fn test_new_record_translation_missing_for_attributes() {
    let _guard = locale_lock();
    let movie = Movie::default();
    assert_eq!(movie.translation_missing_for("title").unwrap(), vec!["en"]);
    assert_eq!(
        movie.translation_missing_for("description").unwrap(),
        vec!["en"]
    );
    assert_eq!(movie.translation_missing_for("other"), None);
}

#[test]
fn test_untranslated_attribute_through_accessor_protocol() {
    let _guard = locale_lock();
    let mut movie = Movie::default();
    assert!(matches!(
        movie.get("other"),
        Err(Error::UntranslatedAttribute { model: "Movie", .. })
    ));
    assert!(movie.set("other", Some("x")).is_err());
    assert!(
        movie
            .set_localized_attribute("other", &loc("de"), Some("x"))
            .is_err()
    );
    assert!(movie.i18n.is_empty());
}

#[test]
fn test_preset_field_on_new_record() {
    let _guard = locale_lock();
    let blade_runner = Movie::default().with_title(TITLE_EN);
    assert_eq!(blade_runner.title(), Some(TITLE_EN));
    assert_eq!(blade_runner.title_in(&loc("en")), Some(TITLE_EN));
    assert_eq!(blade_runner.title, None);
}

// ========== Persisted records ==========

async fn saved_in_default_locale(db: &Db) -> Movie {
    let mut movie = Movie::default();
    movie.set_title(TITLE_EN);
    movie.set_description("an awesome movie");
    db.save(&mut movie).await.unwrap();
    db.reload(&mut movie).await.unwrap();
    movie
}

async fn saved_in_other_locales(db: &Db) -> Movie {
    let mut movie = Movie::default();
    movie.set_title(TITLE_EN);
    movie.set_description("an awesome movie");
    locale::set_current(loc("ru")).unwrap();
    movie.set_title(TITLE_RU);
    movie
        .set_localized_attribute("title", &loc("tr"), Some(TITLE_TR))
        .unwrap();
    locale::set_current(loc("de")).unwrap();
    movie.set_description("ein grossartiger Film");
    locale::set_current(locale::default_locale()).unwrap();
    db.save(&mut movie).await.unwrap();
    db.reload(&mut movie).await.unwrap();
    movie
}

#[tokio::test]
async fn test_default_locale_only() {
    let _guard = locale_lock();
    let db = setup_db().await;
    let movie = saved_in_default_locale(&db).await;

    assert_eq!(movie.translated_locales(), vec!["en"]);
    assert_eq!(movie.translation_missing(), LocaleReport::new());
    assert!(!movie.is_translation_missing());
    assert_eq!(movie.translation_missing_for("title"), None);
    assert_eq!(movie.translation_missing_for("description"), None);
    assert_eq!(
        movie.translation_coverage(),
        report(&[("title", &["en"]), ("description", &["en"])])
    );
    assert_eq!(movie.translation_coverage_for("title").unwrap(), vec!["en"]);
    assert_eq!(
        movie.translation_coverage_for("description").unwrap(),
        vec!["en"]
    );
}

#[tokio::test]
async fn test_other_locales_are_listed_in_write_order() {
    let _guard = locale_lock();
    let db = setup_db().await;
    let movie = saved_in_other_locales(&db).await;
    assert_eq!(movie.translated_locales(), vec!["en", "ru", "tr", "de"]);
}

#[tokio::test]
async fn test_can_assign_the_translated_field() {
    let _guard = locale_lock();
    let db = setup_db().await;
    let mut movie = saved_in_other_locales(&db).await;

    movie.set_title(TITLE_EN);
    db.save(&mut movie).await.unwrap();
    assert_eq!(movie.title(), Some(TITLE_EN));
    assert_eq!(movie.title_in(&loc("en")), Some(TITLE_EN));
}

#[tokio::test]
async fn test_values_for_explicit_locales() {
    let _guard = locale_lock();
    let db = setup_db().await;
    let movie = saved_in_other_locales(&db).await;

    assert_eq!(movie.title_in(&loc("tr")), Some(TITLE_TR));
    assert_eq!(
        movie.get_localized_attribute("title", &loc("ru")).unwrap(),
        Some(TITLE_RU)
    );
    assert_eq!(
        movie.description_in(&loc("de")),
        Some("ein grossartiger Film")
    );
    assert_eq!(movie.description_in(&loc("ru")), None);
}

#[tokio::test]
async fn test_coverage_after_other_locales() {
    let _guard = locale_lock();
    let db = setup_db().await;
    let movie = saved_in_other_locales(&db).await;

    assert_eq!(
        movie.translation_coverage(),
        report(&[("title", &["en", "ru", "tr"]), ("description", &["en", "de"])])
    );
    assert_eq!(
        movie.translation_coverage_for("title").unwrap(),
        vec!["en", "ru", "tr"]
    );
    assert_eq!(
        movie.translation_coverage_for("description").unwrap(),
        vec!["en", "de"]
    );
}

#[tokio::test]
async fn test_missing_after_other_locales() {
    let _guard = locale_lock();
    let db = setup_db().await;
    let movie = saved_in_other_locales(&db).await;

    assert_eq!(
        movie.translation_missing(),
        report(&[("description", &["ru", "tr"]), ("title", &["de"])])
    );
    assert_eq!(movie.translation_missing_for("title").unwrap(), vec!["de"]);
    assert_eq!(
        movie.translation_missing_for("description").unwrap(),
        vec!["ru", "tr"]
    );
}

#[tokio::test]
async fn test_native_title_column_is_independent() {
    let _guard = locale_lock();
    let db = setup_db().await;

    let mut movie = Movie {
        title: Some("native title".to_string()),
        other: Some("untranslated".to_string()),
        ..Movie::default()
    };
    movie.set_title(TITLE_EN);
    movie.set_title_in(&loc("tr"), TITLE_TR);
    db.save(&mut movie).await.unwrap();

    let found: Movie = db.find(movie.id.unwrap()).await.unwrap();
    assert_eq!(found.title.as_deref(), Some("native title"));
    assert_eq!(found.other.as_deref(), Some("untranslated"));
    assert_eq!(found.title(), Some(TITLE_EN));
    assert_eq!(found.title_in(&loc("tr")), Some(TITLE_TR));

    let native: Vec<(Option<String>,)> = db
        .fetch_all("SELECT title FROM movies WHERE title = 'native title'")
        .await
        .unwrap();
    assert_eq!(native.len(), 1);
}

#[tokio::test]
async fn test_reload_discards_unsaved_changes() {
    let _guard = locale_lock();
    let db = setup_db().await;
    let mut movie = saved_in_default_locale(&db).await;

    movie.set_title_in(&loc("ko"), "블레이드 러너");
    assert_eq!(movie.translated_locales(), vec!["en", "ko"]);
    db.reload(&mut movie).await.unwrap();
    assert_eq!(movie.translated_locales(), vec!["en"]);
    assert_eq!(movie.title_in(&loc("ko")), None);
}
