//! Text recognition capability and the region recognition worker.

pub mod task;

use std::path::PathBuf;

use image::RgbaImage;

pub use task::{RecognitionDispatcher, RecognitionJob, RecognitionOutcome};

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("recognition engine unavailable")]
    Unavailable,
    #[error("engine initialization failed: {message}")]
    EngineInit { message: String },
    #[error("recognition failed: {message}")]
    Recognition { message: String },
    #[error("invalid region: {message}")]
    InvalidRegion { message: String },
}

pub type OcrResult<T> = Result<T, OcrError>;

/// An OCR backend. Called from worker threads, one sub-image per call.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &RgbaImage, language: OcrLanguage) -> OcrResult<String>;
}

#[cfg(feature = "paddle-ocr")]
pub use paddle::PaddleRecognizer;

const SYSTEM_MODEL_DIR: &str = "/usr/share/retext/models";

/// Supported OCR language identifiers.
///
/// Each variant maps to a specific recognition model and character-set file
/// shipped in the model directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrLanguage {
    Korean,
    English,
    Chinese,
    Latin,
    Cyrillic,
    Arabic,
    Thai,
    Greek,
    Devanagari,
    Tamil,
    Telugu,
}

impl OcrLanguage {
    /// Recognition-model filename inside the model directory.
    #[cfg_attr(not(feature = "paddle-ocr"), allow(dead_code))]
    fn rec_model_filename(self) -> &'static str {
        match self {
            Self::Korean => "korean_PP-OCRv5_mobile_rec_infer.mnn",
            Self::English => "en_PP-OCRv5_mobile_rec_infer.mnn",
            Self::Chinese => "PP-OCRv5_mobile_rec.mnn",
            Self::Latin => "latin_PP-OCRv5_mobile_rec_infer.mnn",
            Self::Cyrillic => "cyrillic_PP-OCRv5_mobile_rec_infer.mnn",
            Self::Arabic => "arabic_PP-OCRv5_mobile_rec_infer.mnn",
            Self::Thai => "th_PP-OCRv5_mobile_rec_infer.mnn",
            Self::Greek => "el_PP-OCRv5_mobile_rec_infer.mnn",
            Self::Devanagari => "devanagari_PP-OCRv5_mobile_rec_infer.mnn",
            Self::Tamil => "ta_PP-OCRv5_mobile_rec_infer.mnn",
            Self::Telugu => "te_PP-OCRv5_mobile_rec_infer.mnn",
        }
    }

    /// Character-set filename inside the model directory.
    #[cfg_attr(not(feature = "paddle-ocr"), allow(dead_code))]
    fn keys_filename(self) -> &'static str {
        match self {
            Self::Korean => "ppocr_keys_korean.txt",
            Self::English => "ppocr_keys_en.txt",
            Self::Chinese => "ppocr_keys_v5.txt",
            Self::Latin => "ppocr_keys_latin.txt",
            Self::Cyrillic => "ppocr_keys_cyrillic.txt",
            Self::Arabic => "ppocr_keys_arabic.txt",
            Self::Thai => "ppocr_keys_th.txt",
            Self::Greek => "ppocr_keys_el.txt",
            Self::Devanagari => "ppocr_keys_devanagari.txt",
            Self::Tamil => "ppocr_keys_ta.txt",
            Self::Telugu => "ppocr_keys_te.txt",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Korean => "Korean",
            Self::English => "English",
            Self::Chinese => "Chinese",
            Self::Latin => "Latin",
            Self::Cyrillic => "Cyrillic",
            Self::Arabic => "Arabic",
            Self::Thai => "Thai",
            Self::Greek => "Greek",
            Self::Devanagari => "Devanagari",
            Self::Tamil => "Tamil",
            Self::Telugu => "Telugu",
        }
    }

    /// Config string used in `config.json`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Korean => "korean",
            Self::English => "en",
            Self::Chinese => "chinese",
            Self::Latin => "latin",
            Self::Cyrillic => "cyrillic",
            Self::Arabic => "arabic",
            Self::Thai => "th",
            Self::Greek => "el",
            Self::Devanagari => "devanagari",
            Self::Tamil => "ta",
            Self::Telugu => "te",
        }
    }
}

/// Parse a config string into an [`OcrLanguage`]. Returns `None` for
/// unrecognised values so the caller can fall back to system detection.
pub fn parse_ocr_language(value: &str) -> Option<OcrLanguage> {
    match value.to_ascii_lowercase().as_str() {
        "korean" | "ko" => Some(OcrLanguage::Korean),
        "en" | "english" => Some(OcrLanguage::English),
        "chinese" | "zh" | "ch" | "zh-tw" | "chi_tra" => Some(OcrLanguage::Chinese),
        "latin" => Some(OcrLanguage::Latin),
        "cyrillic" | "ru" => Some(OcrLanguage::Cyrillic),
        "arabic" | "ar" => Some(OcrLanguage::Arabic),
        "th" | "thai" => Some(OcrLanguage::Thai),
        "el" | "greek" => Some(OcrLanguage::Greek),
        "devanagari" | "hi" => Some(OcrLanguage::Devanagari),
        "ta" | "tamil" => Some(OcrLanguage::Tamil),
        "te" | "telugu" => Some(OcrLanguage::Telugu),
        _ => None,
    }
}

/// Detect the OCR language from the system `LANG` environment variable.
pub fn detect_system_ocr_language() -> OcrLanguage {
    let lang = std::env::var("LANG").unwrap_or_default();
    language_for_locale(&lang)
}

fn language_for_locale(locale: &str) -> OcrLanguage {
    match locale.split('_').next().unwrap_or("en") {
        "ko" => OcrLanguage::Korean,
        "zh" => OcrLanguage::Chinese,
        "ru" | "uk" | "be" => OcrLanguage::Cyrillic,
        "ar" => OcrLanguage::Arabic,
        "th" => OcrLanguage::Thai,
        "el" => OcrLanguage::Greek,
        "hi" | "mr" | "ne" => OcrLanguage::Devanagari,
        "ta" => OcrLanguage::Tamil,
        "te" => OcrLanguage::Telugu,
        _ => OcrLanguage::English,
    }
}

/// Resolve the effective OCR language from an optional user config value.
/// Falls back to system language detection when the config is absent or invalid.
pub fn resolve_ocr_language(config_value: Option<&str>) -> OcrLanguage {
    config_value
        .and_then(parse_ocr_language)
        .unwrap_or_else(detect_system_ocr_language)
}

pub fn resolve_model_dir() -> Option<PathBuf> {
    let xdg_data_home = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from);
    let home = std::env::var_os("HOME").map(PathBuf::from);
    resolve_model_dir_with(xdg_data_home, home)
}

fn resolve_model_dir_with(
    xdg_data_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    let user_dir = xdg_data_home
        .filter(|val| !val.as_os_str().is_empty())
        .or_else(|| home.map(|home| home.join(".local/share")))
        .map(|base| base.join("retext/models"));

    if let Some(dir) = user_dir.filter(|dir| dir.is_dir()) {
        return Some(dir);
    }

    let system_dir = PathBuf::from(SYSTEM_MODEL_DIR);
    system_dir.is_dir().then_some(system_dir)
}

/// The recognizer backed by installed models, if this build has one and the
/// models are present.
#[cfg(feature = "paddle-ocr")]
pub fn installed_recognizer() -> Option<std::sync::Arc<dyn TextRecognizer>> {
    match PaddleRecognizer::from_installed_models() {
        Some(recognizer) => Some(std::sync::Arc::new(recognizer)),
        None => {
            tracing::warn!("no OCR models installed; regions will not be recognized");
            None
        }
    }
}

#[cfg(not(feature = "paddle-ocr"))]
pub fn installed_recognizer() -> Option<std::sync::Arc<dyn TextRecognizer>> {
    tracing::warn!("built without an OCR backend; regions will not be recognized");
    None
}

#[cfg(feature = "paddle-ocr")]
mod paddle {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use image::{DynamicImage, RgbaImage};
    use ocr_rs::OcrEngine;

    use super::{OcrError, OcrLanguage, OcrResult, TextRecognizer};

    /// PaddleOCR backend. Engines are created lazily, one per language, the
    /// first time that language is requested.
    pub struct PaddleRecognizer {
        model_dir: PathBuf,
        engines: Mutex<HashMap<OcrLanguage, OcrEngine>>,
    }

    impl PaddleRecognizer {
        pub fn new(model_dir: PathBuf) -> Self {
            Self {
                model_dir,
                engines: Mutex::new(HashMap::new()),
            }
        }

        /// `None` when no model directory is installed.
        pub fn from_installed_models() -> Option<Self> {
            super::resolve_model_dir().map(Self::new)
        }
    }

    impl TextRecognizer for PaddleRecognizer {
        fn recognize(&self, image: &RgbaImage, language: OcrLanguage) -> OcrResult<String> {
            let mut engines = self.engines.lock().map_err(|_| OcrError::Recognition {
                message: "engine lock poisoned".to_string(),
            })?;
            if !engines.contains_key(&language) {
                tracing::info!(language = language.display_name(), "initializing OCR engine");
                let engine = create_engine(&self.model_dir, language)?;
                engines.insert(language, engine);
            }
            let engine = engines.get(&language).ok_or(OcrError::Unavailable)?;
            recognize_text(engine, &DynamicImage::ImageRgba8(image.clone()))
        }
    }

    fn create_engine(model_dir: &Path, language: OcrLanguage) -> OcrResult<OcrEngine> {
        let det_path = model_dir.join("PP-OCRv5_mobile_det.mnn");
        let rec_path = model_dir.join(language.rec_model_filename());
        let keys_path = model_dir.join(language.keys_filename());

        OcrEngine::new(
            det_path.to_str().unwrap_or_default(),
            rec_path.to_str().unwrap_or_default(),
            keys_path.to_str().unwrap_or_default(),
            None,
        )
        .map_err(|err| OcrError::EngineInit {
            message: err.to_string(),
        })
    }

    fn recognize_text(engine: &OcrEngine, image: &DynamicImage) -> OcrResult<String> {
        let results = engine
            .recognize(image)
            .map_err(|err| OcrError::Recognition {
                message: err.to_string(),
            })?;

        let mut lines: Vec<_> = results
            .into_iter()
            .map(|r| {
                let y = r.bbox.rect.top();
                (y, r.text)
            })
            .collect();
        lines.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(lines
            .into_iter()
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
