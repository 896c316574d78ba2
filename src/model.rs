//! Localized accessors and coverage reporting for translatable models.

use crate::error::{Error, Result};
use crate::locale::{self, Locale};
use crate::orm::Model;
use crate::store::TranslationStore;
use log::debug;
use std::collections::BTreeMap;

/// Attribute name -> locales, as reported by coverage and missing queries.
pub type LocaleReport = BTreeMap<&'static str, Vec<Locale>>;

/// Instance side of a model that declares translated attributes.
///
/// The class side (`translates`, `translated_attributes`, `is_translated`)
/// lives on [`Model`]. `#[derive(Model)]` with `#[translates(..)]` implements
/// both, plus named accessors per attribute.
pub trait Translatable: Model {
    fn i18n(&self) -> &TranslationStore;
    fn i18n_mut(&mut self) -> &mut TranslationStore;

    /// Resolves `attribute` to its declared `'static` name.
    fn translated_attribute(attribute: &str) -> Result<&'static str> {
        Self::translated_attribute_names()
            .iter()
            .copied()
            .find(|name| *name == attribute)
            .ok_or_else(|| Error::UntranslatedAttribute {
                model: Self::model_name(),
                attribute: attribute.to_string(),
            })
    }

    fn get_localized_attribute(&self, attribute: &str, locale: &Locale) -> Result<Option<&str>> {
        let attribute = Self::translated_attribute(attribute)?;
        Ok(self.i18n().get(locale, attribute))
    }

    fn set_localized_attribute(
        &mut self,
        attribute: &str,
        locale: &Locale,
        value: Option<&str>,
    ) -> Result<()> {
        let attribute = Self::translated_attribute(attribute)?;
        debug!(
            "Setting {}.{} [{}] to {:?}",
            Self::model_name(),
            attribute,
            locale,
            value
        );
        self.i18n_mut()
            .set(locale, attribute, value.map(str::to_string));
        Ok(())
    }

    /// Reads `attribute` in the current locale.
    fn get(&self, attribute: &str) -> Result<Option<&str>> {
        self.get_localized_attribute(attribute, &locale::current())
    }

    /// Writes `attribute` in the current locale.
    fn set(&mut self, attribute: &str, value: Option<&str>) -> Result<()> {
        self.set_localized_attribute(attribute, &locale::current(), value)
    }

    /// Locales written so far, in first-write order. An empty store reports
    /// the default locale alone.
    fn translated_locales(&self) -> Vec<Locale> {
        if self.i18n().is_empty() {
            return vec![locale::default_locale()];
        }
        self.i18n().locales().cloned().collect()
    }

    /// Locales holding a non-null value for each declared attribute.
    /// Empty for an empty store; otherwise every attribute has an entry.
    fn translation_coverage(&self) -> LocaleReport {
        if self.i18n().is_empty() {
            return LocaleReport::new();
        }
        Self::translated_attribute_names()
            .iter()
            .map(|&name| (name, covered_locales(self.i18n(), name)))
            .collect()
    }

    /// `None` when `attribute` is not translated.
    fn translation_coverage_for(&self, attribute: &str) -> Option<Vec<Locale>> {
        let attribute = Self::translated_attribute(attribute).ok()?;
        Some(covered_locales(self.i18n(), attribute))
    }

    /// For each attribute with gaps, the translated locales lacking a value.
    /// A record with an empty store reports every attribute as missing in
    /// the default locale.
    fn translation_missing(&self) -> LocaleReport {
        let locales = self.translated_locales();
        Self::translated_attribute_names()
            .iter()
            .filter_map(|&name| {
                let missing = missing_locales(self.i18n(), &locales, name);
                (!missing.is_empty()).then_some((name, missing))
            })
            .collect()
    }

    /// `None` when nothing is missing or `attribute` is not translated.
    fn translation_missing_for(&self, attribute: &str) -> Option<Vec<Locale>> {
        let attribute = Self::translated_attribute(attribute).ok()?;
        let missing = missing_locales(self.i18n(), &self.translated_locales(), attribute);
        (!missing.is_empty()).then_some(missing)
    }

    fn is_translation_missing(&self) -> bool {
        !self.translation_missing().is_empty()
    }
}

fn covered_locales(store: &TranslationStore, attribute: &str) -> Vec<Locale> {
    store
        .locales()
        .filter(|locale| store.get(locale, attribute).is_some())
        .cloned()
        .collect()
}

fn missing_locales(store: &TranslationStore, locales: &[Locale], attribute: &str) -> Vec<Locale> {
    locales
        .iter()
        .filter(|locale| store.get(locale, attribute).is_none())
        .cloned()
        .collect()
}
