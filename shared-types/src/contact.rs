use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Category assigned by intake before a contact has been enriched.
pub const CATEGORY_INBOX: &str = "Inbox";
/// Category given to the subsumed side of a completed merge.
pub const CATEGORY_MERGED: &str = "Merged";

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct Contact {
    pub contact_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub linkedin: Option<String>,
    pub job_role: Option<String>,
    pub description: Option<String>,
    pub score: Option<u8>,
    pub category: Option<String>,
    pub keep_in_touch_frequency: Option<String>,
    pub birthday: Option<String>,
    pub created_at: i64,
    pub last_modified_at: i64,
}

impl Contact {
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            format!("Contact #{}", self.contact_id)
        } else {
            parts.join(" ")
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq, Default)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum ContactPointType {
    #[default]
    Personal,
    Work,
    Other,
}

impl ContactPointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactPointType::Personal => "personal",
            ContactPointType::Work => "work",
            ContactPointType::Other => "other",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "personal" => ContactPointType::Personal,
            "work" => ContactPointType::Work,
            _ => ContactPointType::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct ContactEmail {
    pub email_id: Option<i64>,
    pub email: String,
    #[serde(rename = "type", default)]
    pub email_type: ContactPointType,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct ContactMobile {
    pub mobile_id: Option<i64>,
    pub mobile: String,
    #[serde(rename = "type", default)]
    pub mobile_type: ContactPointType,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct Tag {
    pub tag_id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct City {
    pub city_id: Option<i64>,
    pub name: String,
    pub country: Option<String>,
}

/// Association between a contact and a company.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct ContactCompany {
    pub company_id: i64,
    pub name: String,
    pub relationship: Option<String>,
    pub is_primary: bool,
}

/// A contact together with every child collection it owns.
///
/// This is the shape frozen into a duplicate pair when a merge is submitted,
/// and the shape the merge job writes back onto the surviving contact.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[ts(export)]
pub struct ContactRecord {
    pub contact: Contact,
    #[serde(default)]
    pub emails: Vec<ContactEmail>,
    #[serde(default)]
    pub mobiles: Vec<ContactMobile>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub cities: Vec<City>,
    #[serde(default)]
    pub companies: Vec<ContactCompany>,
}

impl ContactRecord {
    pub fn new(contact: Contact) -> Self {
        Self {
            contact,
            emails: Vec::new(),
            mobiles: Vec::new(),
            tags: Vec::new(),
            cities: Vec::new(),
            companies: Vec::new(),
        }
    }

    /// Primary email, falling back to the first email row and then the contact field.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.is_primary)
            .or_else(|| self.emails.first())
            .map(|e| e.email.as_str())
            .or(self.contact.email.as_deref())
    }

    pub fn primary_mobile(&self) -> Option<&str> {
        self.mobiles
            .iter()
            .find(|m| m.is_primary)
            .or_else(|| self.mobiles.first())
            .map(|m| m.mobile.as_str())
            .or(self.contact.mobile.as_deref())
    }
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContactRecordResponse {
    pub record: ContactRecord,
}
