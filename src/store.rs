//! The per-record translation store and its column encoding.
//!
//! A store maps locale -> attribute -> value, both levels in insertion
//! order. It is persisted as one TEXT column:
//!
//! ```text
//! {"version":1,"locales":{"en":{"title":"Blade Runner","description":null}}}
//! ```
//!
//! An explicit `null` is kept and differs from an absent attribute.

use crate::error::{Error, Result};
use crate::locale::Locale;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

pub const STORE_VERSION: u64 = 1;

/// Small insertion-ordered map; stores hold a handful of locales and
/// attributes, so linear lookup is fine.
#[derive(Clone, Debug, PartialEq, Eq)]
struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        OrderedMap { entries: Vec::new() }
    }
}

impl<K: PartialEq, V> OrderedMap<K, V> {
    fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: PartialEq<Q>,
        Q: ?Sized,
    {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: PartialEq<Q>,
        Q: ?Sized,
    {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Overwrites in place, keeping the key's first insertion position.
    fn insert(&mut self, key: K, value: V) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }
}

impl<K: Serialize, V: Serialize> Serialize for OrderedMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<K, V>(PhantomData<(K, V)>);

impl<'de, K, V> Visitor<'de> for OrderedMapVisitor<K, V>
where
    K: Deserialize<'de> + PartialEq,
    V: Deserialize<'de>,
{
    type Value = OrderedMap<K, V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut map = OrderedMap::default();
        while let Some((k, v)) = access.next_entry()? {
            map.insert(k, v);
        }
        Ok(map)
    }
}

impl<'de, K, V> Deserialize<'de> for OrderedMap<K, V>
where
    K: Deserialize<'de> + PartialEq,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

type AttributeValues = OrderedMap<String, Option<String>>;

/// Locale -> attribute -> value, in insertion order at both levels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationStore {
    locales: OrderedMap<Locale, AttributeValues>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u64,
    locales: &'a TranslationStore,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    version: u64,
    locales: TranslationStore,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire {
    Versioned(Envelope),
    Unversioned(TranslationStore),
}

impl TranslationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, locale: &Locale, attribute: &str) -> Option<&str> {
        self.locales
            .get(locale)
            .and_then(|values| values.get(attribute))
            .and_then(|value| value.as_deref())
    }

    /// Writes one value, creating the locale entry on first use.
    pub fn set(&mut self, locale: &Locale, attribute: &str, value: Option<String>) {
        match self.locales.get_mut(locale) {
            Some(values) => values.insert(attribute.to_string(), value),
            None => {
                let mut values = AttributeValues::default();
                values.insert(attribute.to_string(), value);
                self.locales.insert(locale.clone(), values);
            }
        }
    }

    /// True when the attribute was written for the locale, even as null.
    pub fn contains(&self, locale: &Locale, attribute: &str) -> bool {
        self.locales
            .get(locale)
            .is_some_and(|values| values.get(attribute).is_some())
    }

    pub fn locales(&self) -> impl Iterator<Item = &Locale> {
        self.locales.keys()
    }

    /// Attributes written for `locale`, in insertion order.
    pub fn attributes(&self, locale: &Locale) -> Vec<(&str, Option<&str>)> {
        self.locales
            .get(locale)
            .map(|values| {
                values
                    .iter()
                    .map(|(attr, value)| (attr.as_str(), value.as_deref()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.locales.len() == 0
    }

    /// Number of locales.
    pub fn len(&self) -> usize {
        self.locales.len()
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&EnvelopeRef {
            version: STORE_VERSION,
            locales: self,
        })?)
    }

    /// Accepts the versioned envelope and the older bare locale map.
    /// Locales stored with no attributes are dropped.
    pub fn decode(text: &str) -> Result<Self> {
        let mut store = match serde_json::from_str::<Wire>(text) {
            Ok(Wire::Versioned(envelope)) if envelope.version == STORE_VERSION => {
                envelope.locales
            }
            Ok(Wire::Versioned(envelope)) => {
                return Err(Error::UnsupportedStoreVersion(envelope.version));
            }
            Ok(Wire::Unversioned(store)) => store,
            // untagged errors say nothing useful; reparse for the real cause
            Err(_) => {
                return Err(serde_json::from_str::<TranslationStore>(text)
                    .err()
                    .map(Error::Serialization)
                    .unwrap_or_else(|| Error::InvalidColumn {
                        column: "i18n".to_string(),
                        reason: "unrecognised translation store layout".to_string(),
                    }));
            }
        };
        store.locales.retain(|_, values| values.len() > 0);
        Ok(store)
    }
}
