//! Keyword pre-filter run before any model call.
//!
//! Content that mentions none of the incident keywords is never sent to the
//! model. The list favours recall: false positives are caught by the model's
//! own `N/A`, articles phrased without any listed word are missed.

const INCIDENT_KEYWORDS: &[&str] = &[
    // mortality
    "death", "deceased", "died", "demise", "lifeless", "perished", "dead", "fatality",
    "passing", "gone", "expired", "mortality", "corpse", "cadaver", "postmortem", "autopsy",
    "obituary", "burial", "funeral", "suicide", "homicide", "murder", "killing",
    "manslaughter", "euthanasia", "slaying", "execution", "sids",
    // accidents and collisions
    "accident", "mishap", "crash", "collision", "wreck", "impact", "smash", "prang",
    "incident", "disaster", "catastrophe", "calamity", "hazard", "emergency",
    // harm and response
    "injury", "wound", "trauma", "damage", "destruction", "rescue", "paramedic",
    "hospitalization", "casualty", "survivor",
    // settings
    "car", "vehicle", "traffic", "workplace", "industrial", "domestic",
    // mechanisms
    "slip", "trip", "fall", "burn", "fire", "explosion", "drowning", "electrocution",
    "amputation",
];

#[derive(Debug, Clone)]
pub struct ContentGate {
    keywords: Vec<String>,
}

impl Default for ContentGate {
    fn default() -> Self {
        Self::with_keywords(INCIDENT_KEYWORDS.iter().copied())
    }
}

impl ContentGate {
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// First keyword found in `content`, matched case-insensitively as a substring.
    pub fn matched_keyword(&self, content: &str) -> Option<&str> {
        let content = content.to_lowercase();
        self.keywords
            .iter()
            .find(|k| content.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn is_eligible(&self, content: &str) -> bool {
        self.matched_keyword(content).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keyword_list() {
        let gate = ContentGate::default();
        assert!(gate.keywords().len() >= 65);
        assert!(gate.keywords().iter().any(|k| k == "crash"));
    }

    #[test]
    fn test_matching_is_case_insensitive_substring() {
        let gate = ContentGate::default();
        assert!(gate.is_eligible("Robotaxi CRASHES into bus"));
        assert_eq!(gate.matched_keyword("Two people DIED"), Some("died"));
        // substring matching on purpose: "scarf" contains "car"
        assert!(gate.is_eligible("a new scarf"));
    }

    #[test]
    fn test_ineligible_content() {
        let gate = ContentGate::default();
        assert!(!gate.is_eligible("Quarterly earnings beat analyst estimates"));
        assert!(!gate.is_eligible(""));
    }

    #[test]
    fn test_custom_keywords() {
        let gate = ContentGate::with_keywords(["Meltdown", ""]);
        assert_eq!(gate.keywords(), &["meltdown".to_string()]);
        assert!(gate.is_eligible("reactor meltdown"));
        assert!(!gate.is_eligible("car crash"));
    }
}
