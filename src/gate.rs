//! Title relevance gate, applied before any detail fetch.

use std::fmt;

use crate::config::Settings;

/// Allow/deny keyword policy. Keywords are kept uppercase.
#[derive(Debug, Clone)]
pub struct Policy {
    allow: Vec<String>,
    deny: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    EmptyTitle,
    Blacklisted(String),
    NotRelevant,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::EmptyTitle => write!(f, "empty title"),
            Rejection::Blacklisted(keyword) => write!(f, "blacklisted:{}", keyword),
            Rejection::NotRelevant => write!(f, "not relevant"),
        }
    }
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn reason(&self) -> String {
        match self {
            Verdict::Accepted => "ok".to_string(),
            Verdict::Rejected(r) => r.to_string(),
        }
    }
}

impl Policy {
    pub fn new<A, D>(allow: A, deny: D) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let upper = |k: &str| k.trim().to_uppercase();
        Policy {
            allow: allow.into_iter().map(|k| upper(k.as_ref())).filter(|k| !k.is_empty()).collect(),
            deny: deny.into_iter().map(|k| upper(k.as_ref())).filter(|k| !k.is_empty()).collect(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Policy::new(&settings.allow_keywords, &settings.deny_keywords)
    }

    /// Deny keywords are checked first, so a title matching both lists is rejected.
    pub fn classify(&self, title: &str) -> Verdict {
        let title = title.trim();
        if title.is_empty() {
            return Verdict::Rejected(Rejection::EmptyTitle);
        }
        let upper = title.to_uppercase();

        if let Some(keyword) = self.deny.iter().find(|k| upper.contains(k.as_str())) {
            return Verdict::Rejected(Rejection::Blacklisted(keyword.clone()));
        }
        if self.allow.iter().any(|k| upper.contains(k.as_str())) {
            return Verdict::Accepted;
        }
        Verdict::Rejected(Rejection::NotRelevant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Policy {
        Policy::new(["DATA", "ETL", "analytics"], ["SALES", "marketing"])
    }

    #[test]
    fn deny_keyword_wins_over_allow_keyword() {
        let v = policy().classify("Data Engineer - Sales Support");
        assert!(!v.is_accepted());
        assert_eq!(v.reason(), "blacklisted:SALES");
    }

    #[test]
    fn unmatched_title_is_not_relevant() {
        let v = policy().classify("Barista");
        assert_eq!(v, Verdict::Rejected(Rejection::NotRelevant));
        assert_eq!(v.reason(), "not relevant");
    }

    #[test]
    fn allow_keyword_accepts() {
        let v = policy().classify("Senior Data Engineer");
        assert!(v.is_accepted());
        assert_eq!(v.reason(), "ok");
    }

    #[test]
    fn matching_ignores_case_on_both_sides() {
        assert!(policy().classify("head of analytics").is_accepted());
        assert_eq!(
            policy().classify("Digital Marketing Data Lead").reason(),
            "blacklisted:MARKETING"
        );
    }

    #[test]
    fn blank_title_has_its_own_reason() {
        assert_eq!(policy().classify(""), Verdict::Rejected(Rejection::EmptyTitle));
        assert_eq!(policy().classify("   \n").reason(), "empty title");
    }
}
