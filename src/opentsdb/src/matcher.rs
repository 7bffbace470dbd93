//! Prometheus label matchers
//!
//! Matchers are evaluated locally only for validation and tests. The backend-bound
//! path never evaluates a regex: [`crate::translate`] rejects regex matchers.

use std::collections::HashMap;
use std::fmt;

use common::prompb::{self, label_matcher};
use regex::Regex;

use crate::error::OpenTsdbError;
use crate::types::TagValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    Equal,
    NotEqual,
    RegexMatch,
    RegexNoMatch,
}

impl MatchType {
    pub fn is_regex(self) -> bool {
        matches!(self, Self::RegexMatch | Self::RegexNoMatch)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::RegexMatch => "=~",
            Self::RegexNoMatch => "!~",
        };
        f.write_str(op)
    }
}

impl From<label_matcher::Type> for MatchType {
    fn from(value: label_matcher::Type) -> Self {
        match value {
            label_matcher::Type::Eq => Self::Equal,
            label_matcher::Type::Neq => Self::NotEqual,
            label_matcher::Type::Re => Self::RegexMatch,
            label_matcher::Type::Nre => Self::RegexNoMatch,
        }
    }
}

/// Matching of one label. Create with [`LabelMatcher::new`].
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    pub match_type: MatchType,
    pub name: String,
    pub value: String,
    re: Option<Regex>,
}

impl LabelMatcher {
    /// Regex matchers are anchored to the full label value
    pub fn new(
        match_type: MatchType,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, OpenTsdbError> {
        let name = name.into();
        let value = value.into();

        let re = if match_type.is_regex() {
            let anchored = format!("^(?:{value})$");
            let re = Regex::new(&anchored).map_err(|e| {
                OpenTsdbError::InvalidMatcher(format!("{name}{match_type}\"{value}\": {e}"))
            })?;
            Some(re)
        } else {
            None
        };

        Ok(Self {
            match_type,
            name,
            value,
            re,
        })
    }

    /// Whether the supplied label value satisfies this matcher
    pub fn matches(&self, value: &str) -> bool {
        match (self.match_type, &self.re) {
            (MatchType::Equal, _) => self.value == value,
            (MatchType::NotEqual, _) => self.value != value,
            (MatchType::RegexMatch, Some(re)) => re.is_match(value),
            (MatchType::RegexNoMatch, Some(re)) => !re.is_match(value),
            // new() always compiles a regex for the regex types
            (MatchType::RegexMatch | MatchType::RegexNoMatch, None) => false,
        }
    }
}

impl TryFrom<&prompb::LabelMatcher> for LabelMatcher {
    type Error = OpenTsdbError;

    fn try_from(matcher: &prompb::LabelMatcher) -> Result<Self, Self::Error> {
        let match_type = label_matcher::Type::try_from(matcher.r#type)
            .map_err(|_| {
                OpenTsdbError::InvalidMatcher(format!(
                    "unknown match type {} for label {}",
                    matcher.r#type, matcher.name
                ))
            })?
            .into();

        Self::new(match_type, matcher.name.as_str(), matcher.value.as_str())
    }
}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.match_type, self.value)
    }
}

/// A conjunction of label matchers
#[derive(Debug, Clone, Default)]
pub struct SeriesMatcher(pub Vec<LabelMatcher>);

impl SeriesMatcher {
    /// Evaluate every matcher against a tag set; a missing tag reads as ""
    pub fn matches(&self, tags: &HashMap<String, TagValue>) -> bool {
        self.0.iter().all(|m| {
            let value = tags.get(&m.name).map(TagValue::as_str).unwrap_or_default();
            m.matches(value)
        })
    }
}
