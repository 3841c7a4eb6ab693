//! Question classification.
//!
//! An explicit, ordered rule table maps raw question text to a task family;
//! the first matching rule wins and anything unmatched lands in `Generic`.
//! Classification is pure string work, deterministic and idempotent, and it
//! fixes the sub-question order the assembler later relies on.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PipelineError, Result};
use crate::types::{AnswerKind, SubQuestion, TaskFamily};

/// Source used when a scrape question names no URL of its own
pub const DEFAULT_SCRAPE_URL: &str =
    "https://en.wikipedia.org/wiki/List_of_highest-grossing_films";

// Statically valid patterns; a failed compile here is a programming error
// caught by the classifier unit tests.
fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static classifier pattern")
}

static SCRAPE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex(r"scrape"),
        regex(r"wikipedia"),
        regex(r"highest[ -]grossing"),
    ]
});

static DATASET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex(r"duckdb"),
        regex(r"parquet"),
        regex(r"high\s+court"),
        regex(r"judgments?\b"),
        regex(r"\bdataset\b"),
    ]
});

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| regex(r#"https?://[^\s"')\]]+"#));
static NUMBERED_ITEM: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*\d+\.\s*(.+?)\s*$"));

static IMAGE_KIND: Lazy<Regex> =
    Lazy::new(|| regex(r"\b(plot|chart|graph|scatterplot|visuali[sz]ation|draw)\b"));
static SCALAR_KIND: Lazy<Regex> =
    Lazy::new(|| regex(r"\b(correlation|regression|slope|trend|coefficient)\b"));
static COUNT_KIND: Lazy<Regex> = Lazy::new(|| regex(r"\b(how many|count|number of)\b"));

static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| regex(r"\b(?:19|20)\d{2}\b"));
static AMOUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| regex(r"\$?\s*(\d+(?:\.\d+)?)\s*(?:bn\b|billion\b)"));
static BETWEEN_COLUMNS: Lazy<Regex> =
    Lazy::new(|| regex(r"between\s+(?:the\s+)?(\w+)\s+and\s+(?:the\s+)?(\w+)"));
static VERSUS_COLUMNS: Lazy<Regex> =
    Lazy::new(|| regex(r"of\s+(\w+)\s+(?:vs\.?|versus|against)\s+(\w+)"));

/// Parameters mined out of a sub-question's text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryParams {
    /// Four-digit years, in order of appearance
    pub years: Vec<f64>,
    /// Dollar amounts given in billions, in order of appearance
    pub amounts: Vec<f64>,
    /// A referenced column pair ("between X and Y", "of X vs Y")
    pub columns: Option<(String, String)>,
}

/// Extract years, amounts and column references from question text
pub fn extract_parameters(text: &str) -> QueryParams {
    let lower = text.to_lowercase();
    let years = YEAR_PATTERN
        .find_iter(&lower)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect();
    let amounts = AMOUNT_PATTERN
        .captures_iter(&lower)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<f64>().ok()))
        .collect();
    let columns = BETWEEN_COLUMNS
        .captures(text)
        .or_else(|| VERSUS_COLUMNS.captures(text))
        .and_then(|c| match (c.get(1), c.get(2)) {
            (Some(a), Some(b)) => Some((a.as_str().to_string(), b.as_str().to_string())),
            _ => None,
        });
    QueryParams {
        years,
        amounts,
        columns,
    }
}

/// Infer the expected answer shape from a sub-question's wording
pub fn infer_kind(text: &str) -> AnswerKind {
    let lower = text.to_lowercase();
    // Order matters: "plot ... with a regression line" is an image request.
    if IMAGE_KIND.is_match(&lower) {
        AnswerKind::Image
    } else if SCALAR_KIND.is_match(&lower) {
        AnswerKind::Scalar
    } else if COUNT_KIND.is_match(&lower) {
        AnswerKind::Count
    } else {
        AnswerKind::Text
    }
}

/// Maps raw question text to (task family, ordered sub-questions)
#[derive(Debug, Clone, Copy, Default)]
pub struct QuestionClassifier;

impl QuestionClassifier {
    /// Classify a question file.
    ///
    /// Fails only on blank input; unrecognized phrasing falls back to the
    /// `Generic` family with a single sub-question wrapping the whole text.
    pub fn classify(&self, text: &str) -> Result<(TaskFamily, Vec<SubQuestion>)> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::invalid_input("question text is empty"));
        }
        let lower = trimmed.to_lowercase();

        // Ordered rule table, first match wins.
        let family = if SCRAPE_PATTERNS.iter().any(|p| p.is_match(&lower)) {
            TaskFamily::ScrapedTable {
                source_url: extract_url(trimmed)
                    .unwrap_or_else(|| DEFAULT_SCRAPE_URL.to_string()),
            }
        } else if DATASET_PATTERNS.iter().any(|p| p.is_match(&lower)) {
            TaskFamily::QueryDataset {
                reference: extract_url(trimmed).unwrap_or_else(|| first_line(trimmed)),
            }
        } else {
            TaskFamily::Generic
        };

        let sub_questions = match family {
            TaskFamily::Generic => vec![SubQuestion {
                text: trimmed.to_string(),
                kind: infer_kind(trimmed),
                position: 0,
            }],
            _ => split_sub_questions(trimmed),
        };

        log::info!(
            "Classified question as {} with {} sub-question(s)",
            family.name(),
            sub_questions.len()
        );
        Ok((family, sub_questions))
    }
}

/// First URL appearing in the text, with trailing punctuation trimmed
fn extract_url(text: &str) -> Option<String> {
    URL_PATTERN
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or(text).trim().to_string()
}

/// Split a question file into ordered sub-questions.
///
/// Numbered items win; otherwise lines ending in `?`; otherwise the whole
/// text as a single sub-question. Order always follows appearance order.
fn split_sub_questions(text: &str) -> Vec<SubQuestion> {
    let mut fragments: Vec<String> = NUMBERED_ITEM
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if fragments.is_empty() {
        fragments = text
            .lines()
            .map(str::trim)
            .filter(|line| line.ends_with('?'))
            .map(str::to_string)
            .collect();
    }
    if fragments.is_empty() {
        fragments.push(text.to_string());
    }

    fragments
        .into_iter()
        .enumerate()
        .map(|(position, text)| SubQuestion {
            kind: infer_kind(&text),
            text,
            position,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIKI_QUESTION: &str = "Scrape the list of highest grossing films from Wikipedia at \
https://en.wikipedia.org/wiki/List_of_highest-grossing_films and answer:\n\
1. How many $2 bn movies were released before 2000?\n\
2. Which is the earliest film that grossed over $1.5 bn?\n\
3. What's the correlation between the Rank and Peak?\n\
4. Draw a scatterplot of Rank vs Peak with a dotted red regression line.\n";

    #[test]
    fn wikipedia_question_is_array_shaped_with_four_subs() {
        let classifier = QuestionClassifier;
        let (family, subs) = classifier.classify(WIKI_QUESTION).unwrap();
        assert!(matches!(family, TaskFamily::ScrapedTable { .. }));
        assert!(family.is_array_shaped());
        assert_eq!(subs.len(), 4);
        assert_eq!(
            subs.iter().map(|s| s.kind).collect::<Vec<_>>(),
            vec![
                AnswerKind::Count,
                AnswerKind::Text,
                AnswerKind::Scalar,
                AnswerKind::Image
            ]
        );
        // Positions follow appearance order
        assert_eq!(subs.iter().map(|s| s.position).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn url_in_text_is_extracted() {
        let classifier = QuestionClassifier;
        let (family, _) = classifier
            .classify("Please scrape https://example.org/tables/films.json, then count rows.")
            .unwrap();
        match family {
            TaskFamily::ScrapedTable { source_url } => {
                assert_eq!(source_url, "https://example.org/tables/films.json");
            }
            other => panic!("unexpected family: {:?}", other),
        }
    }

    #[test]
    fn missing_url_falls_back_to_default() {
        let classifier = QuestionClassifier;
        let (family, _) = classifier
            .classify("Scrape wikipedia for the highest grossing films and count them.")
            .unwrap();
        match family {
            TaskFamily::ScrapedTable { source_url } => assert_eq!(source_url, DEFAULT_SCRAPE_URL),
            other => panic!("unexpected family: {:?}", other),
        }
    }

    #[test]
    fn dataset_question_is_object_shaped() {
        let classifier = QuestionClassifier;
        let text = "The Indian high court judgments dataset is queryable with DuckDB.\n\
Which high court disposed the most cases from 2019 - 2022?\n\
What's the regression slope of registration date by year?\n";
        let (family, subs) = classifier.classify(text).unwrap();
        assert!(matches!(family, TaskFamily::QueryDataset { .. }));
        assert!(!family.is_array_shaped());
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].kind, AnswerKind::Text);
        assert_eq!(subs[1].kind, AnswerKind::Scalar);
    }

    #[test]
    fn scrape_rule_outranks_dataset_rule() {
        let classifier = QuestionClassifier;
        let (family, _) = classifier
            .classify("Scrape the film dataset from wikipedia and count the rows.")
            .unwrap();
        assert!(matches!(family, TaskFamily::ScrapedTable { .. }));
    }

    #[test]
    fn unrecognized_text_is_generic_with_one_sub() {
        let classifier = QuestionClassifier;
        let (family, subs) = classifier
            .classify("Tell me something interesting about penguins.")
            .unwrap();
        assert_eq!(family, TaskFamily::Generic);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "Tell me something interesting about penguins.");
    }

    #[test]
    fn blank_input_is_invalid() {
        let classifier = QuestionClassifier;
        let err = classifier.classify("   \n  ").unwrap_err();
        assert!(err.is_user_visible());
    }

    #[test]
    fn classification_is_idempotent() {
        let classifier = QuestionClassifier;
        let first = classifier.classify(WIKI_QUESTION).unwrap();
        let second = classifier.classify(WIKI_QUESTION).unwrap();
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn parameters_are_extracted() {
        let params =
            extract_parameters("How many $2 bn movies were released before 2000?");
        assert_eq!(params.amounts, vec![2.0]);
        assert_eq!(params.years, vec![2000.0]);

        let params = extract_parameters("What's the correlation between the Rank and Peak?");
        assert_eq!(params.columns, Some(("Rank".into(), "Peak".into())));

        let params = extract_parameters("Draw a scatterplot of Rank vs Peak.");
        assert_eq!(params.columns, Some(("Rank".into(), "Peak".into())));
    }

    #[test]
    fn question_mark_lines_split_when_not_numbered() {
        let subs = split_sub_questions(
            "Scrape the table.\nHow many rows are there?\nWhat is the correlation between A and B?",
        );
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].kind, AnswerKind::Count);
        assert_eq!(subs[1].kind, AnswerKind::Scalar);
    }
}
