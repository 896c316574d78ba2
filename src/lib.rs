//! Per-locale translated attributes for persisted models.
//!
//! A model declares which attributes are translated; their values live in a
//! single `i18n` column holding locale -> attribute -> value. Native columns
//! sit next to it untouched, even when they share a name with a translated
//! attribute.
//!
//! ```ignore
//! #[derive(Debug, Default, Model)]
//! #[translates(title, description)]
//! pub struct Movie {
//!     pub id: Option<i64>,
//!     pub title: Option<String>,
//!     pub i18n: TranslationStore,
//!     pub other: Option<String>,
//! }
//!
//! let mut movie = Movie::default().with_title("Blade Runner");
//! movie.set_title_in(&"de".parse()?, "Der Blade Runner");
//! db.save(&mut movie).await?;
//! ```

// Lets derive output, which names `::translatable`, compile inside this crate.
extern crate self as translatable;

pub mod error;
pub mod locale;
pub mod model;
pub mod orm;
pub mod settings;
pub mod store;

pub use error::{Error, Result};
pub use locale::Locale;
pub use model::{LocaleReport, Translatable};
pub use orm::Model;
pub use store::TranslationStore;
pub use translatable_derive::Model;

#[doc(hidden)]
pub use chrono;
#[doc(hidden)]
pub use inventory;

inventory::collect!(crate::orm::Migration);

/// Traits needed to call the class and instance APIs.
pub mod prelude {
    pub use crate::locale::Locale;
    pub use crate::model::Translatable;
    pub use crate::Model;
    pub use crate::orm::Db;
    pub use crate::store::TranslationStore;
}
