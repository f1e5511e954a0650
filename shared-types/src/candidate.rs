use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use ts_rs::TS;

use crate::contact::Contact;

/// Which search strategy produced a candidate, and on what evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedOn {
    Email(String),
    Mobile(String),
    NameSimilarity,
}

impl fmt::Display for MatchedOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedOn::Email(email) => write!(f, "Email: {}", email),
            MatchedOn::Mobile(mobile) => write!(f, "Mobile: {}", mobile),
            MatchedOn::NameSimilarity => write!(f, "Name similarity"),
        }
    }
}

impl MatchedOn {
    pub fn parse(label: &str) -> Option<Self> {
        if let Some(email) = label.strip_prefix("Email: ") {
            Some(MatchedOn::Email(email.to_string()))
        } else if let Some(mobile) = label.strip_prefix("Mobile: ") {
            Some(MatchedOn::Mobile(mobile.to_string()))
        } else if label == "Name similarity" {
            Some(MatchedOn::NameSimilarity)
        } else {
            None
        }
    }
}

impl Serialize for MatchedOn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MatchedOn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        MatchedOn::parse(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown match label: {}", label)))
    }
}

/// A contact proposed as a possible duplicate of the subject contact.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct Candidate {
    #[serde(flatten)]
    pub contact: Contact,
    #[ts(type = "string")]
    pub matched_on: MatchedOn,
    pub company_name: Option<String>,
}

impl Candidate {
    pub fn new(contact: Contact, matched_on: MatchedOn) -> Self {
        Self {
            contact,
            matched_on,
            company_name: None,
        }
    }

    pub fn contact_id(&self) -> i64 {
        self.contact.contact_id
    }
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DuplicateSearchResponse {
    pub subject_id: i64,
    pub candidates: Vec<Candidate>,
    pub warnings: Vec<String>,
}
