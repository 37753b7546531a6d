use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::TtsError;

pub const DEFAULT_VOICE: &str = "rachel";
pub const VOICE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Named premium voices and their engine ids.
pub const PREMIUM_VOICES: [(&str, &str); 8] = [
    ("rachel", "21m00Tcm4TlvDq8ikWAM"),
    ("adam", "pNInz6obpgDQGcFmaJgB"),
    ("antoni", "ErXwobaYiN019PkySvjV"),
    ("bella", "EXAVITQu4vr4xnSDxMaL"),
    ("domi", "AZnzlk1XvdvUeBnXmlld"),
    ("elli", "MF3mGyEYCl7XYWbV9V6O"),
    ("josh", "TxGEqnHWrfWFTfGW9XjX"),
    ("sam", "yoZ06aMxZJJ28mfd3POQ"),
];

/// A free voice: a language plus the regional host that picks the accent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeVoice {
    pub id: &'static str,
    pub name: &'static str,
    pub lang: &'static str,
    pub tld: &'static str,
}

const fn free(id: &'static str, name: &'static str, lang: &'static str, tld: &'static str) -> FreeVoice {
    FreeVoice { id, name, lang, tld }
}

pub const FREE_VOICES: [FreeVoice; 12] = [
    free("gtts_us", "English (US)", "en", "com"),
    free("gtts_uk", "English (British)", "en", "co.uk"),
    free("gtts_au", "English (Australian)", "en", "com.au"),
    free("gtts_in", "English (Indian)", "en", "co.in"),
    free("gtts_za", "English (South African)", "en", "co.za"),
    free("gtts_ie", "English (Irish)", "en", "ie"),
    free("gtts_ca", "English (Canadian)", "en", "ca"),
    free("gtts_es", "Spanish", "es", "com"),
    free("gtts_fr", "French", "fr", "com"),
    free("gtts_pt", "Portuguese", "pt", "com"),
    free("gtts_de", "German", "de", "com"),
    free("gtts_hi", "Hindi", "hi", "com"),
];

/// Used by the free engine when it stands in for a premium voice.
pub const FALLBACK_FREE_VOICE: FreeVoice = FREE_VOICES[0];

pub fn free_voice(id: &str) -> Option<FreeVoice> {
    FREE_VOICES.iter().copied().find(|v| v.id == id)
}

pub fn premium_voice_id(name: &str) -> Option<&'static str> {
    PREMIUM_VOICES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, id)| *id)
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceSelection {
    Premium { voice_id: String },
    Free(FreeVoice),
}

impl VoiceSelection {
    pub fn is_free(&self) -> bool {
        matches!(self, VoiceSelection::Free(_))
    }
}

fn looks_like_engine_id(value: &str) -> bool {
    value.len() == 20 && value.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Free voice ids first, then premium names, then raw premium engine ids.
/// Anything else gets the default premium voice.
pub fn resolve_voice(selector: &str) -> VoiceSelection {
    let selector = selector.trim();
    if let Some(voice) = free_voice(selector) {
        return VoiceSelection::Free(voice);
    }
    let voice_id = match premium_voice_id(&selector.to_lowercase()) {
        Some(id) => id.to_string(),
        None if looks_like_engine_id(selector) => selector.to_string(),
        None => PREMIUM_VOICES[0].1.to_string(),
    };
    VoiceSelection::Premium { voice_id }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceCatalog {
    pub free: Vec<VoiceInfo>,
    pub premium: Vec<VoiceInfo>,
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn free_voice_list() -> Vec<VoiceInfo> {
    FREE_VOICES
        .iter()
        .map(|v| VoiceInfo {
            voice_id: v.id.to_string(),
            name: v.name.to_string(),
        })
        .collect()
}

pub fn default_premium_list() -> Vec<VoiceInfo> {
    PREMIUM_VOICES
        .iter()
        .map(|(name, id)| VoiceInfo {
            voice_id: id.to_string(),
            name: capitalize(name),
        })
        .collect()
}

/// Lists the voices available to a premium key.
#[async_trait]
pub trait PremiumVoiceSource: Send + Sync {
    async fn list_voices(&self, api_key: &str) -> Result<Vec<VoiceInfo>, TtsError>;
}

struct CachedCatalog {
    key_digest: String,
    catalog: VoiceCatalog,
    fetched_at: Instant,
}

/// Voice listing with a single-entry cache keyed by a digest of the API key.
pub struct VoiceDirectory {
    source: Arc<dyn PremiumVoiceSource>,
    ttl: Duration,
    cache: Mutex<Option<CachedCatalog>>,
}

fn key_digest(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

impl VoiceDirectory {
    pub fn new(source: Arc<dyn PremiumVoiceSource>) -> Self {
        Self::with_ttl(source, VOICE_CACHE_TTL)
    }

    pub fn with_ttl(source: Arc<dyn PremiumVoiceSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Without a key, or when the engine listing fails, premium voices come from the
    /// built-in table.
    pub async fn catalog(&self, api_key: Option<&str>) -> VoiceCatalog {
        let api_key = api_key.map(str::trim).filter(|k| !k.is_empty());
        let digest = key_digest(api_key.unwrap_or_default());

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.key_digest == digest && cached.fetched_at.elapsed() < self.ttl {
                debug!("Serving cached voice list");
                return cached.catalog.clone();
            }
        }

        let premium = match api_key {
            Some(key) => match self.source.list_voices(key).await {
                Ok(voices) => voices,
                Err(e) => {
                    warn!(error = %e, "Failed to fetch premium voices, using built-in list");
                    default_premium_list()
                }
            },
            None => default_premium_list(),
        };
        let catalog = VoiceCatalog {
            free: free_voice_list(),
            premium,
        };
        *cache = Some(CachedCatalog {
            key_digest: digest,
            catalog: catalog.clone(),
            fetched_at: Instant::now(),
        });
        catalog
    }
}
