use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Label of the "not an in-scope incident" sentinel.
pub const NOT_APPLICABLE: &str = "N/A";

/// Incident domain half of a taxonomy label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentDomain {
    AutonomousMobility,
    IndustrialRobotics,
    ClinicalMedicalAi,
    ConsumerChatbots,
    GeneratedManipulation,
    PublicSafety,
}

impl IncidentDomain {
    pub const ALL: [IncidentDomain; 6] = [
        IncidentDomain::AutonomousMobility,
        IncidentDomain::IndustrialRobotics,
        IncidentDomain::ClinicalMedicalAi,
        IncidentDomain::ConsumerChatbots,
        IncidentDomain::GeneratedManipulation,
        IncidentDomain::PublicSafety,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            IncidentDomain::AutonomousMobility => "Autonomous Mobility",
            IncidentDomain::IndustrialRobotics => "Industrial & Workplace Robotics",
            IncidentDomain::ClinicalMedicalAi => "Clinical & Medical AI",
            IncidentDomain::ConsumerChatbots => "Consumer Chatbots & LLM Advice",
            IncidentDomain::GeneratedManipulation => "AI-Generated Manipulation & Abuse",
            IncidentDomain::PublicSafety => "Public Safety & Critical Infrastructure",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.label() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Death,
    Accident,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Death => "Death",
            Severity::Accident => "Accident",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "Death" => Some(Severity::Death),
            "Accident" => Some(Severity::Accident),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A label from the closed incident taxonomy.
///
/// Renders and parses as the verbatim label, e.g. `Clinical & Medical AI/Death`
/// or `N/A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Incident {
        domain: IncidentDomain,
        severity: Severity,
    },
    NotApplicable,
}

impl Category {
    /// Every valid label, incident labels first and `N/A` last.
    pub fn taxonomy() -> Vec<Category> {
        let mut all = Vec::with_capacity(IncidentDomain::ALL.len() * 2 + 1);
        for domain in IncidentDomain::ALL {
            for severity in [Severity::Death, Severity::Accident] {
                all.push(Category::Incident { domain, severity });
            }
        }
        all.push(Category::NotApplicable);
        all
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            Category::Incident { severity, .. } => Some(*severity),
            Category::NotApplicable => None,
        }
    }

    pub fn is_incident(&self) -> bool {
        matches!(self, Category::Incident { .. })
    }

    /// Normalize free-form model output into the taxonomy.
    ///
    /// Surrounding whitespace and one pair of matching quotes or backticks are
    /// stripped; anything that is then not an exact label becomes `N/A`.
    pub fn from_model_output(raw: &str) -> Category {
        let trimmed = raw.trim();
        let unquoted = ['"', '\'', '`']
            .iter()
            .find_map(|q| {
                trimmed
                    .strip_prefix(*q)
                    .and_then(|s| s.strip_suffix(*q))
            })
            .unwrap_or(trimmed)
            .trim();

        match unquoted.parse::<Category>() {
            Ok(category) => category,
            Err(_) => {
                tracing::warn!(output = %raw, "model output outside taxonomy, using N/A");
                Category::NotApplicable
            }
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::NotApplicable
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Incident { domain, severity } => {
                write!(f, "{}/{}", domain.label(), severity.label())
            }
            Category::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == NOT_APPLICABLE {
            return Ok(Category::NotApplicable);
        }
        let (domain, severity) = s
            .rsplit_once('/')
            .ok_or_else(|| Error::Inference(format!("Unknown category: {}", s)))?;
        match (IncidentDomain::from_label(domain), Severity::from_label(severity)) {
            (Some(domain), Some(severity)) => Ok(Category::Incident { domain, severity }),
            _ => Err(Error::Inference(format!("Unknown category: {}", s))),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.to_string()
    }
}

/// A normalized article moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub country: Vec<String>,
    pub category: Option<Category>,
}

/// A persisted article row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: i64,
    #[serde(flatten)]
    pub article: Article,
}

impl StoredArticle {
    pub fn severity(&self) -> Option<Severity> {
        self.article.category.and_then(|c| c.severity())
    }
}

/// Country as the search API reports it: a single code or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountryField {
    One(String),
    Many(Vec<String>),
}

impl CountryField {
    pub fn into_vec(self) -> Vec<String> {
        let values = match self {
            CountryField::One(c) => vec![c],
            CountryField::Many(cs) => cs,
        };
        values
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// An article record exactly as a search API page returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
    pub country: Option<CountryField>,
    #[serde(default)]
    pub duplicate: Option<bool>,
}

impl RawArticle {
    /// Convert into an [`Article`], or `None` when a required field is missing,
    /// the date does not parse, or the source flagged the record as a duplicate.
    pub fn normalize(self) -> Option<Article> {
        if self.duplicate == Some(true) {
            return None;
        }
        let published_at = parse_pub_date(self.pub_date.as_deref()?)?;
        let country = self.country?.into_vec();
        if country.is_empty() {
            return None;
        }
        Some(Article {
            url: self.link?,
            title: self.title?,
            description: self.description?,
            content: self.content?,
            published_at,
            country,
            category: None,
        })
    }
}

/// Parse the publication date formats seen from news APIs.
pub fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Half-open time range `[start, end)` a fetch cycle covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::Config(format!(
                "Window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The window of length `span` ending `lag` before now.
    pub fn trailing(lag: Duration, span: Duration) -> Self {
        Self::trailing_from(Utc::now(), lag, span)
    }

    pub fn trailing_from(now: DateTime<Utc>, lag: Duration, span: Duration) -> Self {
        let end = now - lag;
        Self { start: end - span, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw() -> RawArticle {
        RawArticle {
            title: Some("Robotaxi crash".to_string()),
            link: Some("https://news.example/robotaxi".to_string()),
            description: Some("A driverless car collided".to_string()),
            content: Some("The vehicle crashed into a barrier.".to_string()),
            pub_date: Some("2025-09-21 13:45:00".to_string()),
            country: Some(CountryField::Many(vec!["united states of america".to_string()])),
            duplicate: Some(false),
        }
    }

    #[test]
    fn test_taxonomy_labels_round_trip() {
        let taxonomy = Category::taxonomy();
        assert_eq!(taxonomy.len(), 13);
        assert_eq!(taxonomy.last(), Some(&Category::NotApplicable));
        for category in taxonomy {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
        assert_eq!(
            Category::Incident {
                domain: IncidentDomain::IndustrialRobotics,
                severity: Severity::Accident,
            }
            .to_string(),
            "Industrial & Workplace Robotics/Accident"
        );
    }

    #[test]
    fn test_unknown_label_rejected() {
        assert!("Autonomous Mobility/Injury".parse::<Category>().is_err());
        assert!("autonomous mobility/death".parse::<Category>().is_err());
        assert!("".parse::<Category>().is_err());
    }

    #[test]
    fn test_model_output_normalization() {
        assert_eq!(
            Category::from_model_output("  Clinical & Medical AI/Death\n"),
            Category::Incident {
                domain: IncidentDomain::ClinicalMedicalAi,
                severity: Severity::Death,
            }
        );
        assert_eq!(
            Category::from_model_output("\"Autonomous Mobility/Accident\""),
            Category::Incident {
                domain: IncidentDomain::AutonomousMobility,
                severity: Severity::Accident,
            }
        );
        assert_eq!(
            Category::from_model_output("The category is Autonomous Mobility/Accident"),
            Category::NotApplicable
        );
        assert_eq!(Category::from_model_output("N/A"), Category::NotApplicable);
        assert_eq!(Category::from_model_output(""), Category::NotApplicable);
    }

    #[test]
    fn test_severity_derivation() {
        let death: Category = "Public Safety & Critical Infrastructure/Death".parse().unwrap();
        assert_eq!(death.severity(), Some(Severity::Death));
        assert!(death.is_incident());
        assert_eq!(Category::NotApplicable.severity(), None);
    }

    #[test]
    fn test_category_serde_uses_label() {
        let category: Category = "Consumer Chatbots & LLM Advice/Accident".parse().unwrap();
        let json = serde_json::to_string(&category).unwrap();
        assert_eq!(json, "\"Consumer Chatbots & LLM Advice/Accident\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, category);
        assert!(serde_json::from_str::<Category>("\"Something else\"").is_err());
    }

    #[test]
    fn test_normalize_complete_record() {
        let article = raw().normalize().unwrap();
        assert_eq!(article.url, "https://news.example/robotaxi");
        assert_eq!(article.country, vec!["united states of america"]);
        assert_eq!(
            article.published_at,
            Utc.with_ymd_and_hms(2025, 9, 21, 13, 45, 0).unwrap()
        );
        assert_eq!(article.category, None);
    }

    #[test]
    fn test_normalize_drops_incomplete_records() {
        let mut missing_country = raw();
        missing_country.country = None;
        assert!(missing_country.normalize().is_none());

        let mut empty_country = raw();
        empty_country.country = Some(CountryField::Many(vec![]));
        assert!(empty_country.normalize().is_none());

        let mut missing_content = raw();
        missing_content.content = None;
        assert!(missing_content.normalize().is_none());

        let mut bad_date = raw();
        bad_date.pub_date = Some("yesterday".to_string());
        assert!(bad_date.normalize().is_none());

        let mut flagged = raw();
        flagged.duplicate = Some(true);
        assert!(flagged.normalize().is_none());
    }

    #[test]
    fn test_raw_article_from_api_json() {
        let json = r#"{
            "title": "Chatbot advice linked to overdose",
            "link": "https://news.example/chatbot",
            "description": "Family says chatbot gave dosage advice",
            "content": "The patient died after ...",
            "pubDate": "2025-09-22 10:20:02",
            "country": "india",
            "duplicate": false,
            "source_id": "example"
        }"#;
        let raw: RawArticle = serde_json::from_str(json).unwrap();
        let article = raw.normalize().unwrap();
        assert_eq!(article.country, vec!["india"]);
    }

    #[test]
    fn test_time_window() {
        let now = Utc.with_ymd_and_hms(2025, 9, 22, 12, 0, 0).unwrap();
        let window = TimeWindow::trailing_from(now, Duration::hours(1), Duration::hours(1));
        assert_eq!(window.end, Utc.with_ymd_and_hms(2025, 9, 22, 11, 0, 0).unwrap());
        assert_eq!(window.start, Utc.with_ymd_and_hms(2025, 9, 22, 10, 0, 0).unwrap());
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));

        assert!(TimeWindow::new(window.end, window.start).is_err());
    }
}
