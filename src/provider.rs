//! Translation provider capability.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::LangPair;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("unsupported language pair {source_lang}->{target_lang}")]
    UnsupportedLanguagePair {
        source_lang: String,
        target_lang: String,
    },
    #[error("translation failed: {0}")]
    Failed(String),
}

impl ProviderError {
    pub fn unsupported(pair: &LangPair) -> Self {
        Self::UnsupportedLanguagePair {
            source_lang: pair.source.clone(),
            target_lang: pair.target.clone(),
        }
    }
}

/// Maps text in one language to another.
///
/// Calls may block for a long time (model inference, network); the pipeline
/// runs them on the blocking pool.
pub trait TranslationProvider: Send + Sync + 'static {
    fn supports(&self, pair: &LangPair) -> bool;
    fn translate(&self, text: &str, pair: &LangPair) -> Result<String, ProviderError>;
}

/// Language pairs a provider accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub pairs: Vec<LangPair>,
    /// Known phrase translations, keyed by `"src->tgt"`. Defaults to the
    /// Hello/Bonjour pair in both directions.
    pub glossary: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            pairs: vec![LangPair::new("en", "fr"), LangPair::new("fr", "en")],
            glossary: [("en->fr", "Hello", "Bonjour"), ("fr->en", "Bonjour", "Hello")]
                .into_iter()
                .map(|(pair, from, to)| {
                    (
                        pair.to_string(),
                        BTreeMap::from([(from.to_string(), to.to_string())]),
                    )
                })
                .collect(),
        }
    }
}

/// Phrase-table provider over a configured set of language pairs.
///
/// Unknown phrases fail with [`ProviderError::Failed`]; pairs outside the
/// configured set fail with [`ProviderError::UnsupportedLanguagePair`].
#[derive(Debug, Clone, Default)]
pub struct GlossaryProvider {
    pairs: HashSet<LangPair>,
    phrases: HashMap<LangPair, HashMap<String, String>>,
}

impl GlossaryProvider {
    pub fn new(pairs: impl IntoIterator<Item = LangPair>) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
            phrases: HashMap::new(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut provider = Self::new(config.pairs.iter().cloned());
        for (key, table) in &config.glossary {
            let Some((source, target)) = key.split_once("->") else {
                tracing::warn!(key = %key, "ignoring glossary section without `src->tgt` key");
                continue;
            };
            let pair = LangPair::new(source.trim(), target.trim());
            for (from, to) in table {
                provider = provider.with_phrase(pair.clone(), from, to);
            }
        }
        provider
    }

    pub fn with_phrase(mut self, pair: LangPair, from: &str, to: &str) -> Self {
        self.phrases
            .entry(pair)
            .or_default()
            .insert(normalize(from), to.to_string());
        self
    }
}

impl TranslationProvider for GlossaryProvider {
    fn supports(&self, pair: &LangPair) -> bool {
        self.pairs.contains(pair)
    }

    fn translate(&self, text: &str, pair: &LangPair) -> Result<String, ProviderError> {
        if !self.supports(pair) {
            return Err(ProviderError::unsupported(pair));
        }
        self.phrases
            .get(pair)
            .and_then(|table| table.get(&normalize(text)))
            .cloned()
            .ok_or_else(|| ProviderError::Failed(format!("no {pair} translation for {text:?}")))
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en_fr() -> LangPair {
        LangPair::new("en", "fr")
    }

    #[test]
    fn translates_known_phrase_ignoring_case_and_padding() {
        let provider = GlossaryProvider::new([en_fr()]).with_phrase(en_fr(), "Hello", "Bonjour");
        assert_eq!(provider.translate("  hello ", &en_fr()).unwrap(), "Bonjour");
    }

    #[test]
    fn rejects_pairs_outside_configured_set() {
        let provider = GlossaryProvider::new([en_fr()]);
        let err = provider
            .translate("Hello", &LangPair::new("en", "de"))
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::UnsupportedLanguagePair {
                source_lang: "en".to_string(),
                target_lang: "de".to_string(),
            }
        );
    }

    #[test]
    fn default_config_translates_the_greeting_both_ways() {
        let provider = GlossaryProvider::from_config(&ProviderConfig::default());
        assert_eq!(provider.translate("Hello", &en_fr()).unwrap(), "Bonjour");
        assert_eq!(
            provider.translate("Bonjour", &LangPair::new("fr", "en")).unwrap(),
            "Hello"
        );
    }

    #[test]
    fn glossary_config_keys_build_phrase_tables() {
        let mut config = ProviderConfig::default();
        config.glossary.insert(
            "fr->en".to_string(),
            [("Bonjour".to_string(), "Hello".to_string())].into_iter().collect(),
        );
        let provider = GlossaryProvider::from_config(&config);
        assert!(provider.supports(&LangPair::new("en", "fr")));
        assert_eq!(
            provider.translate("bonjour", &LangPair::new("fr", "en")).unwrap(),
            "Hello"
        );
    }
}
