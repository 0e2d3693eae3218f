use super::registry::ProviderRegistry;
use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

/// Matches identity claims (typically a `User-Agent`) against every provider
/// name in one precompiled, case-insensitive alternation.
#[derive(Debug)]
pub struct IdentifierMatcher {
    pattern: Regex,
    // Canonical provider names; group `i + 1` of the pattern is `names[i]`.
    names: Vec<String>,
}

impl IdentifierMatcher {
    pub fn new(registry: &ProviderRegistry) -> Result<Self> {
        let names: Vec<String> = registry
            .all()
            .iter()
            .map(|p| p.name().to_string())
            .collect();

        let alternation = names
            .iter()
            .map(|name| format!("({})", regex::escape(&name.to_lowercase())))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()
            .context("Failed to compile identifier pattern")?;

        Ok(Self { pattern, names })
    }

    /// Returns the canonical name of the first provider named in `claim`.
    pub fn match_claim(&self, claim: Option<&str>) -> Option<&str> {
        let claim = claim?;
        if claim.is_empty() {
            return None;
        }

        let caps = self.pattern.captures(claim)?;
        let idx = caps.iter().skip(1).position(|group| group.is_some())?;
        self.names.get(idx).map(String::as_str)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> IdentifierMatcher {
        IdentifierMatcher::new(&ProviderRegistry::builtin().unwrap()).unwrap()
    }

    #[test]
    fn test_pattern_covers_registry() {
        assert_eq!(matcher().pattern(), "(google)|(yahoo)|(bing)|(baidu)");
    }

    #[test]
    fn test_matches_real_user_agents() {
        let m = matcher();
        assert_eq!(
            m.match_claim(Some(
                "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
            )),
            Some("Google")
        );
        assert_eq!(
            m.match_claim(Some("Mozilla/5.0 (compatible; bingbot/2.0)")),
            Some("Bing")
        );
        assert_eq!(
            m.match_claim(Some("Mozilla/5.0 (compatible; Baiduspider/2.0)")),
            Some("Baidu")
        );
        assert_eq!(
            m.match_claim(Some("Mozilla/5.0 (compatible; Yahoo! Slurp)")),
            Some("Yahoo")
        );
    }

    #[test]
    fn test_no_match() {
        let m = matcher();
        assert_eq!(m.match_claim(None), None);
        assert_eq!(m.match_claim(Some("")), None);
        assert_eq!(m.match_claim(Some("curl/8.4.0")), None);
        assert_eq!(m.match_claim(Some("(((((.*")), None);
    }

    #[test]
    fn test_names_are_escaped() {
        let registry =
            ProviderRegistry::new(vec![("Ask.com", vec!["ask.com"])]).unwrap();
        let m = IdentifierMatcher::new(&registry).unwrap();
        assert_eq!(m.match_claim(Some("Ask.com crawler")), Some("Ask.com"));
        assert_eq!(m.match_claim(Some("AskXcom crawler")), None);
    }

    #[test]
    fn test_unicode_case_folding_maps_to_provider() {
        let registry = ProviderRegistry::new(vec![
            ("Яндекс", vec!["yandex.ru"]),
            ("DuckDuckBot", vec!["duckduckgo.com"]),
        ])
        .unwrap();
        let m = IdentifierMatcher::new(&registry).unwrap();
        assert_eq!(m.match_claim(Some("яндекс bot")), Some("Яндекс"));
        assert_eq!(m.match_claim(Some("Mozilla/5.0 (ЯНДЕКС)")), Some("Яндекс"));
        // Kelvin sign folds to 'k'
        assert_eq!(
            m.match_claim(Some("Duc\u{212A}DuckBot/1.1")),
            Some("DuckDuckBot")
        );
    }
}
