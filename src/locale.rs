//! Locale identifiers and the process-wide current locale.
//!
//! Every localized accessor takes an explicit [`Locale`]; the implicit
//! variants fall back to [`current()`]. The current locale is shared by the
//! whole process, so code that switches it temporarily must restore it.

use crate::error::{Error, Result};
use crate::settings::I18nSettings;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

static LOCALE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{2,8}(?:[-_][A-Za-z0-9]{1,8})*$").expect("locale pattern is valid")
});

/// A language/region identifier such as `en`, `ko` or `pt-BR`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale(String);

impl Locale {
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if LOCALE_PATTERN.is_match(&tag) {
            Ok(Locale(tag))
        } else {
            Err(Error::InvalidLocale(tag))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Locale::new(s)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Locale {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Locale {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Locale {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Serialize for Locale {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Locale {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Locale::new(tag).map_err(serde::de::Error::custom)
    }
}

struct LocaleState {
    default: Locale,
    current: Locale,
    available: Vec<Locale>,
}

static STATE: Lazy<RwLock<LocaleState>> = Lazy::new(|| {
    let en = Locale("en".to_string());
    RwLock::new(LocaleState {
        default: en.clone(),
        current: en,
        available: Vec::new(),
    })
});

fn read_state() -> std::sync::RwLockReadGuard<'static, LocaleState> {
    STATE.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_state() -> std::sync::RwLockWriteGuard<'static, LocaleState> {
    STATE.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The locale used by accessors called without an explicit locale.
pub fn current() -> Locale {
    read_state().current.clone()
}

pub fn set_current(locale: Locale) -> Result<()> {
    let mut state = write_state();
    if !state.available.is_empty() && !state.available.contains(&locale) {
        return Err(Error::UnavailableLocale(locale.0));
    }
    debug!("Current locale: {} -> {}", state.current, locale);
    state.current = locale;
    Ok(())
}

pub fn default_locale() -> Locale {
    read_state().default.clone()
}

/// Replaces the default locale; it must be one of the available locales.
pub fn set_default(locale: Locale) -> Result<()> {
    let mut state = write_state();
    if !state.available.is_empty() && !state.available.contains(&locale) {
        return Err(Error::UnavailableLocale(locale.0));
    }
    debug!("Default locale: {} -> {}", state.default, locale);
    state.default = locale;
    Ok(())
}

/// Locales accepted by [`set_current`]; empty means unrestricted.
pub fn available_locales() -> Vec<Locale> {
    read_state().available.clone()
}

/// Installs default and available locales and resets the current locale
/// to the new default.
pub fn configure(settings: &I18nSettings) -> Result<()> {
    let default = Locale::new(settings.default_locale.as_str())?;
    let available = settings
        .available_locales
        .iter()
        .map(|tag| Locale::new(tag.as_str()))
        .collect::<Result<Vec<_>>>()?;
    if !available.is_empty() && !available.contains(&default) {
        return Err(Error::UnavailableLocale(default.0));
    }

    let mut state = write_state();
    state.current = default.clone();
    state.default = default;
    state.available = available;
    log::info!(
        "Locales configured: default `{}`, {} available",
        state.default,
        state.available.len()
    );
    Ok(())
}

/// Serialises unit tests that read or switch the process-wide locale.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
