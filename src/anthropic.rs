//! Anthropic-backed implementation of the external classification
//! capability. The engine only sees the `Classifier` trait; everything
//! HTTP-shaped lives here.

use std::time::Duration;

use serde::Deserialize;

use crate::classifier::{AiClassification, ClassificationRequest, Classifier};
use crate::error::{ContoError, Result};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_TOKENS: u32 = 4000;

const SYSTEM_PROMPT: &str = r#"Sei un assistente specializzato nella classificazione di transazioni bancarie italiane.

Per ogni transazione, restituisci un oggetto JSON con:
- "type": una delle seguenti opzioni: expense, income, fee, transfer, card, atm, sdd, tax, dividend, interest, investment, subscription, salary, refund, other
- "category": una delle seguenti opzioni: groceries, restaurants, fuel, utilities, telecom, health, transport, credit card, subscriptions, insurance, investments, taxes, transfers, entertainment, shopping, travel, personal_care, education, home, pets, charity, atm, fees, salary, rent, uncategorized
- "merchant": nome del merchant/beneficiario pulito (opzionale, solo se identificabile)
- "confidence": score 0.0-1.0

Regole di classificazione:
- "Redditi" o "Cash Dividend" -> type: income, category: dividend
- "Pagamento degli interessi" o "Interest payment" -> type: income, category: interest
- "Cedole" o "Cedola" -> type: income, category: interest
- "Transazione con carta" + nome esercente -> type: card, category: basata su esercente
- "Commercio" + "Buy trade"/"Sell trade" -> type: investment, category: investments
- "Bonifico" -> type: transfer, category: transfers
- "Imposte"/"Stamp Duty" -> type: tax, category: taxes
- "Commissioni"/"Comm." -> type: fee, category: fees
- Supermercati (CONAD, ESSELUNGA, LIDL, COOP, etc.) -> category: groceries
- Farmacie -> category: health
- Ristoranti/Bar/Pizzerie -> category: restaurants
- Benzina (ENI, Q8, IP, SHELL, TAMOIL) -> category: fuel
- Telepass, autostrada -> category: transport
- Netflix, Spotify, Amazon Prime, Disney -> category: subscriptions
- Utilizzo Carta Di Credito -> type: card, category: credit card

Rispondi SOLO con un array JSON valido, senza markdown, commenti o testo aggiuntivo."#;

pub struct ClaudeClassifier {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(rename = "type")]
    type_: String,
    category: String,
    #[serde(default)]
    merchant: Option<String>,
    #[serde(default)]
    confidence: f64,
}

impl From<RawClassification> for AiClassification {
    fn from(raw: RawClassification) -> Self {
        Self {
            type_: raw.type_,
            category: raw.category,
            merchant: raw.merchant.filter(|m| !m.trim().is_empty()),
            confidence: raw.confidence.clamp(0.0, 1.0),
        }
    }
}

impl ClaudeClassifier {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ContoError::Classify(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    /// Build the classifier from `ANTHROPIC_API_KEY`, if set.
    pub fn from_env(model: &str) -> Result<Option<Self>> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(Some(Self::new(key, model.to_string())?)),
            _ => Ok(None),
        }
    }
}

fn build_listing(batch: &[ClassificationRequest]) -> String {
    batch
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. [{}] {} - {}", i + 1, r.bank, r.type_raw, r.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_code_fences(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```") {
        t = rest.strip_prefix("json").unwrap_or(rest).trim_start();
        if let Some(body) = t.strip_suffix("```") {
            t = body.trim_end();
        }
    }
    t
}

fn parse_response_text(text: &str) -> Result<Vec<AiClassification>> {
    let raw: Vec<RawClassification> = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| ContoError::Classify(format!("response is not a classification array: {e}")))?;
    Ok(raw.into_iter().map(Into::into).collect())
}

impl Classifier for ClaudeClassifier {
    fn classify(&self, batch: &[ClassificationRequest]) -> Result<Vec<AiClassification>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": 0,
            "system": SYSTEM_PROMPT,
            "messages": [{
                "role": "user",
                "content": format!(
                    "Classifica queste {} transazioni:\n\n{}",
                    batch.len(),
                    build_listing(batch)
                ),
            }],
        });

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| ContoError::Classify(format!("classification request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(ContoError::Classify(format!(
                "classification API returned {status}: {detail}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .map_err(|e| ContoError::Classify(format!("invalid API response: {e}")))?;
        let text = payload["content"][0]["text"]
            .as_str()
            .ok_or_else(|| ContoError::Classify("API response has no text content".to_string()))?;
        parse_response_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_listing_numbers_entries() {
        let batch = vec![
            ClassificationRequest {
                bank: "widiba".to_string(),
                type_raw: "PAGAMENTO POS".to_string(),
                description: "CONAD VIA ROMA".to_string(),
            },
            ClassificationRequest {
                bank: "traderepublic".to_string(),
                type_raw: "Bonifico".to_string(),
                description: "Deposito accettato".to_string(),
            },
        ];
        let listing = build_listing(&batch);
        assert_eq!(
            listing,
            "1. [widiba] PAGAMENTO POS - CONAD VIA ROMA\n2. [traderepublic] Bonifico - Deposito accettato"
        );
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("[1, 2]"), "[1, 2]");
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\n[1, 2]\n```"), "[1, 2]");
    }

    #[test]
    fn test_parse_response_text() {
        let text = r#"[
            {"type": "card", "category": "groceries", "merchant": "Conad", "confidence": 0.95},
            {"type": "transfer", "category": "transfers", "confidence": 0.8}
        ]"#;
        let parsed = parse_response_text(text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].merchant.as_deref(), Some("Conad"));
        assert!(parsed[1].merchant.is_none());
        assert_eq!(parsed[1].type_, "transfer");
    }

    #[test]
    fn test_malformed_response_fails_loudly() {
        assert!(parse_response_text("non sono JSON").is_err());
        assert!(parse_response_text(r#"{"type": "card"}"#).is_err());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let parsed = parse_response_text(r#"[{"type": "x", "category": "y", "confidence": 3.5}]"#).unwrap();
        assert_eq!(parsed[0].confidence, 1.0);
    }
}
