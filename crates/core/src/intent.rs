//! Intent Classification
//!
//! Decides whether the latest human turn explicitly asked for a fraction
//! diagram. Two strategies share the [`IntentClassifier`] contract:
//!
//! - [`KeywordIntentClassifier`]: pure, synchronous multilingual token matching.
//! - [`LLMIntentClassifier`]: asks a text model for a strict JSON verdict.
//!
//! Both lean towards "no image" when the request is ambiguous.

use crate::{
    diagram::DiagramType,
    error::UpstreamError,
    fraction::{FractionParameters, extract_fraction},
    llm_client::{ChatMessage, CompletionRequest, LLMClient},
};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Instruction used by [`LLMIntentClassifier`] unless a prompt asset replaces it.
pub const DEFAULT_INTENT_INSTRUCTION: &str = r#"You are an intent detector. Output ONLY valid JSON.

Decide whether the user explicitly requests a visual or diagram of a fraction.
This includes requests like drawing, showing, visualizing, number line, area model,
or equivalent expressions in ANY language.

If the user does NOT explicitly request a visual, return:
{"generate_image": false}

If the user DOES explicitly request a visual, return:
{
  "generate_image": true,
  "image_type": "numberline" or "areamodel",
  "numerator": integer or null,
  "denominator": integer or null
}

Do not explain anything. Do not suggest visuals."#;

const CLASSIFIER_TEMPERATURE: f32 = 0.0;
const CLASSIFIER_MAX_TOKENS: u32 = 80;

/// Whether to draw, what to draw, and (optionally) which fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IntentDecision {
    pub wants_image: bool,
    pub image_type: DiagramType,
    pub numerator: Option<i64>,
    pub denominator: Option<i64>,
}

impl IntentDecision {
    pub fn no_image() -> Self {
        Self::default()
    }

    /// The fraction named by the classifier, if both parts form a drawable fraction.
    pub fn fraction(&self) -> Option<FractionParameters> {
        FractionParameters::from_signed(self.numerator?, self.denominator?)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classifies the text of the latest human turn.
    async fn classify(&self, text: &str) -> Result<IntentDecision, UpstreamError>;
}

/// Token lists for the keyword strategy.
///
/// Matching is case-insensitive and on whole words, so "draw" does not fire
/// inside "withdraw". A token ending in `*` is a stem and also matches longer
/// words ("zeig*" matches "zeige"). A token preceded in the same clause by a
/// negation ("no diagram please") is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordSet {
    pub action_verbs: Vec<String>,
    pub diagram_names: Vec<String>,
    /// Subset of diagram names that select the area model.
    pub area_model_names: Vec<String>,
    /// Single words that cancel a following token. Words ending in "n't" always do.
    #[serde(default = "default_negations")]
    pub negations: Vec<String>,
}

fn owned(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

fn default_negations() -> Vec<String> {
    owned(&[
        "no", "not", "dont", "never", "without", "nicht", "kein", "keine", "keinen", "nie",
        "sin", "nunca", "değil", "degil", "hayır",
    ])
}

impl Default for KeywordSet {
    fn default() -> Self {
        let area_model_names = owned(&[
            "area model*",
            "areamodel*",
            "area-model*",
            "area modle",
            "aera model",
            "alan modeli",
            "flächenmodell*",
            "flaechenmodell*",
            "modelo de área",
            "modelo de area",
        ]);
        let mut diagram_names = owned(&[
            "number line*",
            "numberline*",
            "number-line*",
            "numer line",
            "numbr line",
            "nubmer line",
            "zahlenstrahl*",
            "sayı doğrusu",
            "sayi dogrusu",
            "recta numérica",
            "recta numerica",
        ]);
        diagram_names.extend(area_model_names.iter().cloned());

        Self {
            action_verbs: owned(&[
                "show",
                "draw",
                "visualize",
                "visualise",
                "illustrate",
                "diagram",
                "plot",
                "sketch",
                // de
                "zeig*",
                "zeichn*",
                "visualisier*",
                "veranschaulich*",
                "darstell*",
                // es
                "muéstrame",
                "muestrame",
                "dibuja*",
                "ilustra",
                "visualiza",
                "grafica",
                // tr
                "göster*",
                "goster*",
                "çiz",
                "görselleştir*",
            ]),
            diagram_names,
            area_model_names,
            negations: default_negations(),
        }
    }
}

impl KeywordSet {
    /// Lower-cases every token so lookups only need to lower-case the input.
    fn normalized(self) -> Self {
        let lower = |tokens: Vec<String>| {
            tokens
                .into_iter()
                .map(|t| t.trim().to_lowercase().replace('’', "'"))
                .filter(|t| !t.trim_end_matches('*').is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            action_verbs: lower(self.action_verbs),
            diagram_names: lower(self.diagram_names),
            area_model_names: lower(self.area_model_names),
            negations: lower(self.negations),
        }
    }
}

/// Words before a token that are checked for a negation.
const NEGATION_WINDOW: usize = 4;

/// One whole-word alternation over `tokens`, or `None` when there are none.
fn compile_tokens(tokens: &[String]) -> Result<Option<Regex>, regex::Error> {
    if tokens.is_empty() {
        return Ok(None);
    }
    let alternatives = tokens
        .iter()
        .map(|token| match token.strip_suffix('*') {
            Some(stem) => format!(r"{}\w*", regex::escape(stem)),
            None => regex::escape(token),
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternatives)).map(Some)
}

fn is_negated(lowered: &str, start: usize, negations: &[String]) -> bool {
    let before = &lowered[..start];
    let clause_start = before
        .rfind(['.', '!', '?', ',', ';', ':'])
        .map(|i| i + 1)
        .unwrap_or(0);
    before[clause_start..]
        .split_whitespace()
        .rev()
        .take(NEGATION_WINDOW)
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .any(|word| word.ends_with("n't") || negations.iter().any(|n| n == word))
}

/// Rule-based classifier. Performs no I/O.
#[derive(Debug, Clone)]
pub struct KeywordIntentClassifier {
    actions: Option<Regex>,
    diagrams: Option<Regex>,
    area_models: Option<Regex>,
    negations: Vec<String>,
}

impl Default for KeywordIntentClassifier {
    fn default() -> Self {
        Self::new(KeywordSet::default()).expect("built-in keyword tokens are escaped literals")
    }
}

impl KeywordIntentClassifier {
    pub fn new(keywords: KeywordSet) -> Result<Self, regex::Error> {
        let keywords = keywords.normalized();
        Ok(Self {
            actions: compile_tokens(&keywords.action_verbs)?,
            diagrams: compile_tokens(&keywords.diagram_names)?,
            area_models: compile_tokens(&keywords.area_model_names)?,
            negations: keywords.negations,
        })
    }

    /// Whether any un-negated occurrence of a token appears in `lowered`.
    fn mentions(&self, pattern: &Option<Regex>, lowered: &str) -> bool {
        pattern.as_ref().is_some_and(|re| {
            re.find_iter(lowered)
                .any(|m| !is_negated(lowered, m.start(), &self.negations))
        })
    }

    /// Synchronous classification of a single human message.
    pub fn decide(&self, text: &str) -> IntentDecision {
        let lowered = text.to_lowercase().replace('’', "'");

        let wants_image =
            self.mentions(&self.actions, &lowered) || self.mentions(&self.diagrams, &lowered);
        if !wants_image {
            return IntentDecision::no_image();
        }

        let image_type = if self.mentions(&self.area_models, &lowered) {
            DiagramType::AreaModel
        } else {
            DiagramType::NumberLine
        };
        let fraction = extract_fraction(text);

        IntentDecision {
            wants_image,
            image_type,
            numerator: fraction.map(|f| i64::from(f.numerator())),
            denominator: fraction.map(|f| i64::from(f.denominator())),
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    async fn classify(&self, text: &str) -> Result<IntentDecision, UpstreamError> {
        Ok(self.decide(text))
    }
}

/// The JSON shape the classifier model is instructed to emit. Only
/// `generate_image` is required; the other fields are read leniently.
#[derive(Debug, Deserialize)]
struct ClassifierVerdict {
    generate_image: bool,
    #[serde(default)]
    image_type: Option<Value>,
    #[serde(default)]
    numerator: Option<Value>,
    #[serde(default)]
    denominator: Option<Value>,
}

/// Largest magnitude at which every `f64` integer is exact.
const MAX_EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

/// Reads an integer written as `3`, `3.0` or `"3"`. Anything else is `None`.
fn integer_field(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_EXACT_F64_INT)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses the model's answer as JSON. An answer that is not a JSON object
/// with a boolean `generate_image` is reported as malformed. Fraction fields
/// that are not integers are dropped, leaving the fraction to be recovered
/// from the conversation.
pub fn parse_verdict(raw: &str) -> Result<IntentDecision, UpstreamError> {
    let verdict: ClassifierVerdict = serde_json::from_str(raw.trim())
        .map_err(|e| UpstreamError::Malformed(format!("intent verdict: {}", e)))?;

    if !verdict.generate_image {
        return Ok(IntentDecision::no_image());
    }
    Ok(IntentDecision {
        wants_image: true,
        image_type: verdict
            .image_type
            .as_ref()
            .and_then(Value::as_str)
            .map(DiagramType::from_label)
            .unwrap_or_default(),
        numerator: integer_field(verdict.numerator.as_ref()),
        denominator: integer_field(verdict.denominator.as_ref()),
    })
}

/// Model-based classifier backed by any [`LLMClient`].
pub struct LLMIntentClassifier {
    llm: Arc<dyn LLMClient>,
    instruction: String,
}

impl LLMIntentClassifier {
    /// # Arguments
    ///
    /// * `llm` - Text model used for the verdict.
    /// * `instruction` - System instruction; usually [`DEFAULT_INTENT_INSTRUCTION`].
    pub fn new(llm: Arc<dyn LLMClient>, instruction: String) -> Self {
        Self { llm, instruction }
    }
}

#[async_trait]
impl IntentClassifier for LLMIntentClassifier {
    async fn classify(&self, text: &str) -> Result<IntentDecision, UpstreamError> {
        if text.trim().is_empty() {
            debug!("No human text to classify; skipping intent call");
            return Ok(IntentDecision::no_image());
        }

        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(self.instruction.clone()),
                ChatMessage::user(text),
            ],
            temperature: CLASSIFIER_TEMPERATURE,
            max_tokens: CLASSIFIER_MAX_TOKENS,
        };
        let raw = self.llm.complete(request).await?;
        parse_verdict(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLLMClient;

    #[test]
    fn draw_request_for_number_line() {
        let decision = KeywordIntentClassifier::default().decide("can you draw a number line for 3/4");
        assert!(decision.wants_image);
        assert_eq!(decision.image_type, DiagramType::NumberLine);
        assert_eq!(decision.fraction(), FractionParameters::new(3, 4));
    }

    #[test]
    fn plain_answer_does_not_request_image() {
        let decision = KeywordIntentClassifier::default().decide("I think the answer is 5/12");
        assert_eq!(decision, IntentDecision::no_image());
    }

    #[test]
    fn mixed_language_area_model_request() {
        let decision = KeywordIntentClassifier::default().decide("zeig mir ein alan modeli");
        assert!(decision.wants_image);
        assert_eq!(decision.image_type, DiagramType::AreaModel);
        assert_eq!(decision.fraction(), None);
    }

    #[test]
    fn diagram_name_alone_is_enough() {
        let decision = KeywordIntentClassifier::default().decide("What about an AREA MODEL of 2/3?");
        assert!(decision.wants_image);
        assert_eq!(decision.image_type, DiagramType::AreaModel);
    }

    #[test]
    fn arithmetic_question_is_not_a_draw_request() {
        let decision = KeywordIntentClassifier::default().decide("What is 1/4 + 1/6?");
        assert!(!decision.wants_image);
    }

    #[test]
    fn custom_keywords_replace_defaults() {
        let classifier = KeywordIntentClassifier::new(KeywordSet {
            action_verbs: vec!["  RENDER ".to_string()],
            diagram_names: vec![],
            area_model_names: vec![],
            negations: vec![],
        })
        .unwrap();
        assert!(classifier.decide("please render 1/2").wants_image);
        assert!(!classifier.decide("please draw 1/2").wants_image);
    }

    #[test]
    fn tokens_inside_other_words_do_not_match() {
        let classifier = KeywordIntentClassifier::default();
        assert!(!classifier.decide("I'd like to withdraw my last hint about 1/2").wants_image);
        assert!(!classifier.decide("Check the drawer, is 3/4 bigger than 2/3?").wants_image);
        assert!(!classifier.decide("That was a showstopper, 5/6 is right").wants_image);
    }

    #[test]
    fn negated_requests_do_not_ask_for_an_image() {
        let classifier = KeywordIntentClassifier::default();
        assert!(!classifier.decide("no diagram please, just tell me if 2/4 equals 1/2").wants_image);
        assert!(!classifier.decide("Please don't draw it, I get 3/4 now").wants_image);
        assert!(!classifier.decide("Don’t show me a number line").wants_image);
        assert!(!classifier.decide("bitte keinen zahlenstrahl").wants_image);
    }

    #[test]
    fn negation_only_covers_its_own_clause() {
        let decision = KeywordIntentClassifier::default().decide("I'm not sure, can you draw 3/4?");
        assert!(decision.wants_image);
        assert_eq!(decision.fraction(), FractionParameters::new(3, 4));
    }

    #[test]
    fn stems_match_inflected_forms() {
        let classifier = KeywordIntentClassifier::default();
        assert!(classifier.decide("zeige mir 1/2").wants_image);
        assert!(classifier.decide("kannst du 2/5 zeichnen").wants_image);
        assert!(classifier.decide("compare them on two number lines").wants_image);
    }

    #[test]
    fn stem_marker_alone_is_dropped() {
        let classifier = KeywordIntentClassifier::new(KeywordSet {
            action_verbs: vec!["*".to_string(), "render".to_string()],
            diagram_names: vec![],
            area_model_names: vec![],
            negations: vec![],
        })
        .unwrap();
        assert!(!classifier.decide("what is 1/2 of 4").wants_image);
    }

    #[test]
    fn keyword_set_deserializes_from_json() {
        let json = r#"{
            "action_verbs": ["show"],
            "diagram_names": ["number line", "area model"],
            "area_model_names": ["area model"]
        }"#;
        let set: KeywordSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.area_model_names, vec!["area model".to_string()]);
        assert_eq!(set.negations, default_negations());
    }

    #[test]
    fn verdict_without_image() {
        assert_eq!(
            parse_verdict(r#"{"generate_image": false}"#).unwrap(),
            IntentDecision::no_image()
        );
    }

    #[test]
    fn verdict_with_area_model_and_fraction() {
        let decision = parse_verdict(
            r#"{"generate_image": true, "image_type": "areamodel", "numerator": 3, "denominator": 4}"#,
        )
        .unwrap();
        assert!(decision.wants_image);
        assert_eq!(decision.image_type, DiagramType::AreaModel);
        assert_eq!(decision.fraction(), FractionParameters::new(3, 4));
    }

    #[test]
    fn verdict_with_null_fraction_parts() {
        let decision = parse_verdict(
            r#"{"generate_image": true, "image_type": "numberline", "numerator": null, "denominator": null}"#,
        )
        .unwrap();
        assert!(decision.wants_image);
        assert_eq!(decision.fraction(), None);
    }

    #[test]
    fn verdict_accepts_integral_floats_and_numeric_strings() {
        let decision = parse_verdict(
            r#"{"generate_image": true, "image_type": "numberline", "numerator": 3.0, "denominator": " 4 "}"#,
        )
        .unwrap();
        assert!(decision.wants_image);
        assert_eq!(decision.fraction(), FractionParameters::new(3, 4));
    }

    #[test]
    fn verdict_with_unreadable_numbers_still_wants_image() {
        let decision = parse_verdict(
            r#"{"generate_image": true, "image_type": 7, "numerator": "three", "denominator": 2.5}"#,
        )
        .unwrap();
        assert!(decision.wants_image);
        assert_eq!(decision.image_type, DiagramType::NumberLine);
        assert_eq!(decision.numerator, None);
        assert_eq!(decision.denominator, None);
    }

    #[test]
    fn verdict_with_invalid_denominator_has_no_fraction() {
        let decision = parse_verdict(
            r#"{"generate_image": true, "image_type": "numberline", "numerator": 1, "denominator": 0}"#,
        )
        .unwrap();
        assert_eq!(decision.fraction(), None);
    }

    #[test]
    fn non_json_verdict_is_malformed() {
        assert!(matches!(
            parse_verdict("Sure! Here is the JSON: {\"generate_image\": true}"),
            Err(UpstreamError::Malformed(_))
        ));
        assert!(parse_verdict("").is_err());
        assert!(parse_verdict(r#"{"image_type": "numberline"}"#).is_err());
    }

    #[tokio::test]
    async fn llm_classifier_sends_instruction_and_latest_text() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .withf(|request| {
                request.temperature == 0.0
                    && request.max_tokens == 80
                    && request.messages
                        == vec![
                            ChatMessage::system("detect"),
                            ChatMessage::user("show me 5/12 on a number line"),
                        ]
            })
            .times(1)
            .returning(|_| {
                Ok(r#"{"generate_image": true, "image_type": "numberline", "numerator": 5, "denominator": 12}"#.to_string())
            });

        let classifier = LLMIntentClassifier::new(Arc::new(llm), "detect".to_string());
        let decision = classifier
            .classify("show me 5/12 on a number line")
            .await
            .unwrap();

        assert!(decision.wants_image);
        assert_eq!(decision.fraction(), FractionParameters::new(5, 12));
    }

    #[tokio::test]
    async fn llm_classifier_skips_call_for_empty_text() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete().never();

        let classifier = LLMIntentClassifier::new(Arc::new(llm), "detect".to_string());
        let decision = classifier.classify("   ").await.unwrap();
        assert_eq!(decision, IntentDecision::no_image());
    }

    #[tokio::test]
    async fn llm_classifier_reports_upstream_failure() {
        let mut llm = MockLLMClient::new();
        llm.expect_complete().returning(|_| {
            Err(UpstreamError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        });

        let classifier = LLMIntentClassifier::new(Arc::new(llm), "detect".to_string());
        assert!(classifier.classify("draw 1/2").await.is_err());
    }
}
