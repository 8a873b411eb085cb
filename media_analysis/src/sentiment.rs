use crate::language::{detect_language, language_code, TranslationError, Translator};
use serde::Serialize;
use std::sync::Arc;
use whatlang::Lang;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolarityScores {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    pub compound: f64,
}

pub fn polarity_scores(text: &str) -> PolarityScores {
    let analyzer = vader_sentiment::SentimentIntensityAnalyzer::new();
    let scores = analyzer.polarity_scores(text);
    let score = |key: &str| scores.get(key).copied().unwrap_or_default();

    PolarityScores {
        neg: score("neg"),
        neu: score("neu"),
        pos: score("pos"),
        compound: score("compound"),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextAnalysis {
    pub sentiment: PolarityScores,
    pub language: String,
    #[serde(rename = "translatedText")]
    pub translated_text: String,
}

/// Scores text with VADER, translating non-English input first when a
/// translator is configured.
pub struct SentimentService {
    translator: Option<Arc<dyn Translator>>,
}

impl SentimentService {
    pub fn new(translator: Option<Arc<dyn Translator>>) -> Self {
        Self { translator }
    }

    pub async fn analyze(&self, text: &str) -> Result<TextAnalysis, TranslationError> {
        let lang = detect_language(text);

        let translated_text = match (&self.translator, lang) {
            (Some(translator), Some(lang)) if lang != Lang::Eng => {
                tracing::debug!("Translating {} text to English", lang.code());
                translator.translate_to_english(text).await?
            }
            _ => text.to_string(),
        };

        let sentiment = polarity_scores(&translated_text);
        tracing::debug!("Text Sentiment Analysis: {:?}", sentiment);

        Ok(TextAnalysis {
            sentiment,
            language: language_code(lang).to_string(),
            translated_text,
        })
    }
}
