use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::log_error;

/// Maps canonical landmark labels to the labels used in a given trial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarksTranslator {
    table: BTreeMap<String, String>,
}

impl LandmarksTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or overwrites an entry. Empty keys or values are ignored.
    pub fn set_landmark(&mut self, key: &str, value: &str) {
        if key.is_empty() {
            log_error!("Impossible to set a landmark translation with an empty key");
            return;
        }
        if value.is_empty() {
            log_error!("Impossible to set the translation of '{key}' to an empty label");
            return;
        }
        self.table.insert(key.to_owned(), value.to_owned());
    }

    pub fn translation(&self, key: &str) -> Option<&str> {
        self.table.get(key).map(String::as_str)
    }

    /// The translated label, or `label` itself when no entry exists.
    pub fn translate<'a>(&'a self, label: &'a str) -> &'a str {
        self.translation(label).unwrap_or(label)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.table.remove(key)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for LandmarksTranslator {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut translator = Self::new();
        for (key, value) in iter {
            translator.set_landmark(key.as_ref(), value.as_ref());
        }
        translator
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn overwriting_keeps_the_size() {
        let mut translator = LandmarksTranslator::new();
        translator.set_landmark("GT", "GREATER_TRANCHOTER");
        translator.set_landmark("GT", "GRAND_TROCHANTER");
        assert_eq!(translator.len(), 1);
        assert_eq!(translator.translation("GT"), Some("GRAND_TROCHANTER"));
    }

    #[test]
    fn empty_key_or_value_is_ignored() {
        let mut translator = LandmarksTranslator::new();
        translator.set_landmark("", "GRAND_TROCHANTER");
        translator.set_landmark("GT", "");
        assert!(translator.is_empty());
        assert_eq!(translator.translation("GT"), None);
        assert_eq!(translator.translate("GT"), "GT");
    }

    #[test]
    fn collects_from_pairs() {
        let translator: LandmarksTranslator =
            [("LFE", "LEFT_FEMORAL_EPICONDYLE"), ("", "IGNORED")].into_iter().collect();
        assert_eq!(translator.len(), 1);
        assert_eq!(translator.translate("LFE"), "LEFT_FEMORAL_EPICONDYLE");
    }

    proptest! {
        #[test]
        fn size_counts_distinct_keys(keys in prop::collection::vec("[A-Z]{1,3}", 0..20)) {
            let mut translator = LandmarksTranslator::new();
            for key in &keys {
                translator.set_landmark(key, "X");
            }
            let mut distinct = keys.clone();
            distinct.sort();
            distinct.dedup();
            prop_assert_eq!(translator.len(), distinct.len());
        }
    }
}
