use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

// ─── Errors / availability ───────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation engine unavailable: {0}")]
    Unavailable(String),
    #[error("invalid language code: {0}")]
    InvalidLanguage(String),
    #[error("{0} engine is not implemented")]
    NotImplemented(&'static str),
    #[error("translation failed: {0}")]
    Failed(String),
}

/// Readiness of a backend for a given language pair. Backends with a
/// one-time downloadable-model step report the intermediate states;
/// `prepare` drives them towards `Available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelAvailability {
    Unavailable,
    Downloadable,
    Downloading,
    Available,
}

// ─── Capability trait ────────────────────────────────────────────────

/// Pluggable translation backend. The engine core only ever calls through
/// this seam; swapping providers is a configuration change, never a code
/// change in the detection path.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn is_available(&self) -> bool;

    /// Readiness for one language pair. Default: mirrors `is_available`.
    async fn availability(&self, _source: &str, _target: &str) -> ModelAvailability {
        if self.is_available().await {
            ModelAvailability::Available
        } else {
            ModelAvailability::Unavailable
        }
    }

    /// One-time setup for a language pair (model download, session
    /// creation). Default: nothing to prepare.
    async fn prepare(&self, _source: &str, _target: &str) -> Result<(), TranslateError> {
        Ok(())
    }

    /// Translate `text`. An empty `source` means auto-detect.
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError>;
}

// ─── Engine kinds ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Deepl,
    Google,
    Custom,
}

impl EngineKind {
    pub fn label(&self) -> &'static str {
        match self {
            EngineKind::Deepl => "deepl",
            EngineKind::Google => "google",
            EngineKind::Custom => "custom",
        }
    }
}

// ─── DeepL engine ────────────────────────────────────────────────────

pub struct DeepLEngine {
    api: deepl::DeepLApi,
    api_key: String,
    // Language pairs that survived a prepare() probe.
    prepared: Mutex<HashSet<(String, String)>>,
}

impl DeepLEngine {
    pub fn new(api_key: &str) -> Self {
        Self {
            api: deepl::DeepLApi::with(api_key).new(),
            api_key: api_key.to_string(),
            prepared: Mutex::new(HashSet::new()),
        }
    }

    /// Normalize a configured language code to a DeepL one. Empty means
    /// auto-detect (valid for the source side only). "NO" maps to "NB":
    /// DeepL models Norwegian as Bokmål.
    fn parse_lang(code: &str) -> Result<Option<deepl::Lang>, TranslateError> {
        if code.is_empty() {
            return Ok(None);
        }
        let upper = code.to_uppercase();
        let upper = if upper == "NO" { "NB".to_string() } else { upper };
        match deepl::Lang::from_str(&upper) {
            Ok(lang) => Ok(Some(lang)),
            Err(_) => Err(TranslateError::InvalidLanguage(code.to_string())),
        }
    }

    fn mark_prepared(&self, source: &str, target: &str) {
        self.prepared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((source.to_string(), target.to_string()));
    }

    fn is_prepared(&self, source: &str, target: &str) -> bool {
        self.prepared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(source.to_string(), target.to_string()))
    }
}

#[async_trait]
impl TranslationEngine for DeepLEngine {
    fn name(&self) -> &str {
        "DeepL"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn availability(&self, source: &str, target: &str) -> ModelAvailability {
        if self.api_key.is_empty() {
            return ModelAvailability::Unavailable;
        }
        if Self::parse_lang(target).map_or(true, |l| l.is_none())
            || Self::parse_lang(source).is_err()
        {
            return ModelAvailability::Unavailable;
        }
        if self.is_prepared(source, target) {
            ModelAvailability::Available
        } else {
            // No model to download for an API backend, but the pair has
            // not been probed yet.
            ModelAvailability::Downloadable
        }
    }

    /// Probe the API once per language pair so a bad key or unsupported
    /// pair surfaces before captions start flowing.
    async fn prepare(&self, source: &str, target: &str) -> Result<(), TranslateError> {
        if self.is_prepared(source, target) {
            return Ok(());
        }
        Self::parse_lang(target)?
            .ok_or_else(|| TranslateError::InvalidLanguage("empty target".into()))?;
        Self::parse_lang(source)?;
        match self.api.languages(deepl::LangType::Target).await {
            Ok(langs) => {
                info!(
                    "DeepL ready ({} target languages), pair {}→{}",
                    langs.len(),
                    if source.is_empty() { "auto" } else { source },
                    target
                );
                self.mark_prepared(source, target);
                Ok(())
            }
            Err(e) => Err(TranslateError::Unavailable(friendly_deepl_error(&e))),
        }
    }

    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError> {
        if self.api_key.is_empty() {
            return Err(TranslateError::Unavailable("no API key configured".into()));
        }
        let target_lang = Self::parse_lang(target)?
            .ok_or_else(|| TranslateError::InvalidLanguage("empty target".into()))?;
        let source_lang = Self::parse_lang(source)?;

        let mut builder = self.api.translate_text(text, target_lang);
        if let Some(src) = source_lang {
            builder.source_lang(src);
        }

        match (&mut builder).await {
            Ok(resp) => match resp.translations.first() {
                Some(sentence) => {
                    debug!("DeepL translated {} chars", text.len());
                    Ok(sentence.text.clone())
                }
                None => Err(TranslateError::Failed("no translation returned".into())),
            },
            Err(e) => Err(TranslateError::Failed(friendly_deepl_error(&e))),
        }
    }
}

/// Map common DeepL HTTP failures to user-readable messages.
fn friendly_deepl_error(e: &deepl::Error) -> String {
    let s = format!("{}", e);
    if s.contains("403") {
        "Invalid API key".into()
    } else if s.contains("429") {
        "Rate limit exceeded, please wait".into()
    } else if s.contains("456") {
        "Translation quota exceeded".into()
    } else {
        s
    }
}

// ─── Registry ────────────────────────────────────────────────────────

/// Explicit engine-instance cache: one instance per backend kind, reused
/// across lifecycle reinitializations, disposed together via `clear`.
/// Owned by whoever composes the lifecycle controller.
pub struct EngineRegistry {
    engines: HashMap<EngineKind, Arc<dyn TranslationEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// Pre-register an engine under a kind (tests, alternative backends).
    pub fn register(&mut self, kind: EngineKind, engine: Arc<dyn TranslationEngine>) {
        self.engines.insert(kind, engine);
    }

    /// Cached instance for the configured kind, created on first use.
    pub fn engine_for(
        &mut self,
        kind: EngineKind,
        deepl_api_key: &str,
    ) -> Result<Arc<dyn TranslationEngine>, TranslateError> {
        if let Some(engine) = self.engines.get(&kind) {
            return Ok(engine.clone());
        }
        let engine: Arc<dyn TranslationEngine> = match kind {
            EngineKind::Deepl => {
                if deepl_api_key.is_empty() {
                    warn!("DeepL engine requested without an API key");
                }
                Arc::new(DeepLEngine::new(deepl_api_key))
            }
            EngineKind::Google => return Err(TranslateError::NotImplemented("google")),
            EngineKind::Custom => return Err(TranslateError::NotImplemented("custom")),
        };
        info!("created translation engine: {}", engine.name());
        self.engines.insert(kind, engine.clone());
        Ok(engine)
    }

    /// Drop every cached instance.
    pub fn clear(&mut self) {
        if !self.engines.is_empty() {
            info!("clearing {} cached translation engine(s)", self.engines.len());
        }
        self.engines.clear();
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
