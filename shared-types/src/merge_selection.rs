use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

/// Resolution for a scalar contact field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    #[default]
    Current,
    Duplicate,
}

/// Resolution for a child collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMode {
    Current,
    Duplicate,
    #[default]
    Combine,
}

impl CollectionMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "current" => Some(CollectionMode::Current),
            "duplicate" => Some(CollectionMode::Duplicate),
            "combine" => Some(CollectionMode::Combine),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeField {
    FirstName,
    LastName,
    Category,
    JobRole,
    Linkedin,
    Description,
    Score,
    KeepInTouchFrequency,
}

impl MergeField {
    pub const ALL: [MergeField; 8] = [
        MergeField::FirstName,
        MergeField::LastName,
        MergeField::Category,
        MergeField::JobRole,
        MergeField::Linkedin,
        MergeField::Description,
        MergeField::Score,
        MergeField::KeepInTouchFrequency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeField::FirstName => "first_name",
            MergeField::LastName => "last_name",
            MergeField::Category => "category",
            MergeField::JobRole => "job_role",
            MergeField::Linkedin => "linkedin",
            MergeField::Description => "description",
            MergeField::Score => "score",
            MergeField::KeepInTouchFrequency => "keep_in_touch_frequency",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeCollection {
    Emails,
    Mobiles,
    Tags,
    Cities,
    Companies,
}

impl MergeCollection {
    pub const ALL: [MergeCollection; 5] = [
        MergeCollection::Emails,
        MergeCollection::Mobiles,
        MergeCollection::Tags,
        MergeCollection::Cities,
        MergeCollection::Companies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeCollection::Emails => "emails",
            MergeCollection::Mobiles => "mobiles",
            MergeCollection::Tags => "tags",
            MergeCollection::Cities => "cities",
            MergeCollection::Companies => "companies",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeSelectionError {
    #[error("Unknown merge field: {0}")]
    UnknownKey(String),

    #[error("Unknown merge mode '{mode}' for field {key}")]
    UnknownMode { key: String, mode: String },

    #[error("Field {0} cannot be combined; choose current or duplicate")]
    CombineNotAllowed(String),
}

/// Field-by-field plan for merging two contacts.
///
/// `current` refers to the contact under review, `duplicate` to the chosen
/// candidate it is being merged into.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq, Eq, Default)]
#[ts(export)]
#[serde(deny_unknown_fields)]
pub struct MergeSelection {
    pub first_name: FieldMode,
    pub last_name: FieldMode,
    pub category: FieldMode,
    pub job_role: FieldMode,
    pub linkedin: FieldMode,
    pub description: FieldMode,
    pub score: FieldMode,
    pub keep_in_touch_frequency: FieldMode,
    pub emails: CollectionMode,
    pub mobiles: CollectionMode,
    pub tags: CollectionMode,
    pub cities: CollectionMode,
    pub companies: CollectionMode,
}

impl MergeSelection {
    pub fn field(&self, field: MergeField) -> FieldMode {
        match field {
            MergeField::FirstName => self.first_name,
            MergeField::LastName => self.last_name,
            MergeField::Category => self.category,
            MergeField::JobRole => self.job_role,
            MergeField::Linkedin => self.linkedin,
            MergeField::Description => self.description,
            MergeField::Score => self.score,
            MergeField::KeepInTouchFrequency => self.keep_in_touch_frequency,
        }
    }

    pub fn set_field(&mut self, field: MergeField, mode: FieldMode) {
        let slot = match field {
            MergeField::FirstName => &mut self.first_name,
            MergeField::LastName => &mut self.last_name,
            MergeField::Category => &mut self.category,
            MergeField::JobRole => &mut self.job_role,
            MergeField::Linkedin => &mut self.linkedin,
            MergeField::Description => &mut self.description,
            MergeField::Score => &mut self.score,
            MergeField::KeepInTouchFrequency => &mut self.keep_in_touch_frequency,
        };
        *slot = mode;
    }

    pub fn collection(&self, collection: MergeCollection) -> CollectionMode {
        match collection {
            MergeCollection::Emails => self.emails,
            MergeCollection::Mobiles => self.mobiles,
            MergeCollection::Tags => self.tags,
            MergeCollection::Cities => self.cities,
            MergeCollection::Companies => self.companies,
        }
    }

    pub fn set_collection(&mut self, collection: MergeCollection, mode: CollectionMode) {
        let slot = match collection {
            MergeCollection::Emails => &mut self.emails,
            MergeCollection::Mobiles => &mut self.mobiles,
            MergeCollection::Tags => &mut self.tags,
            MergeCollection::Cities => &mut self.cities,
            MergeCollection::Companies => &mut self.companies,
        };
        *slot = mode;
    }

    /// Apply loosely-typed operator overrides on top of this selection.
    ///
    /// Every key must name a known field or collection and every value a mode
    /// that field accepts; on error nothing is applied.
    pub fn with_overrides<I, K, V>(&self, overrides: I) -> Result<Self, MergeSelectionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut selection = self.clone();

        for (key, value) in overrides {
            let (key, value) = (key.as_ref(), value.as_ref());

            if let Some(field) = MergeField::from_key(key) {
                let mode = match value {
                    "current" => FieldMode::Current,
                    "duplicate" => FieldMode::Duplicate,
                    "combine" => return Err(MergeSelectionError::CombineNotAllowed(key.to_string())),
                    other => {
                        return Err(MergeSelectionError::UnknownMode {
                            key: key.to_string(),
                            mode: other.to_string(),
                        })
                    }
                };
                selection.set_field(field, mode);
            } else if let Some(collection) = MergeCollection::from_key(key) {
                let mode = CollectionMode::parse(value).ok_or_else(|| {
                    MergeSelectionError::UnknownMode {
                        key: key.to_string(),
                        mode: value.to_string(),
                    }
                })?;
                selection.set_collection(collection, mode);
            } else {
                return Err(MergeSelectionError::UnknownKey(key.to_string()));
            }
        }

        Ok(selection)
    }

    /// Build a selection from the flat key/value form; missing keys keep their defaults.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, MergeSelectionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::default().with_overrides(pairs)
    }
}

/// Request to merge the contact under review into one of its candidates.
#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct SubmitMergeRequest {
    pub candidate_id: i64,
    pub selections: Option<BTreeMap<String, String>>,
    /// Evidence shown with the candidate, e.g. "Email: j@x.com".
    pub matched_on: Option<String>,
    pub notes: Option<String>,
    pub resolved_by: Option<String>,
}

#[derive(Debug, Default, Deserialize, TS)]
#[ts(export)]
pub struct FalsePositiveRequest {
    pub resolved_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MergePlanResponse {
    pub subject_id: i64,
    pub candidate_id: i64,
    pub selections: MergeSelection,
}
