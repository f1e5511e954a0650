use shared_types::{Contact, FieldMode, MergeField, MergeSelection, CATEGORY_INBOX};

use crate::normalize::present;

fn text_value(contact: &Contact, field: MergeField) -> Option<&str> {
    let value = match field {
        MergeField::FirstName => contact.first_name.as_deref(),
        MergeField::LastName => contact.last_name.as_deref(),
        MergeField::Category => contact.category.as_deref(),
        MergeField::JobRole => contact.job_role.as_deref(),
        MergeField::Linkedin => contact.linkedin.as_deref(),
        MergeField::Description => contact.description.as_deref(),
        MergeField::KeepInTouchFrequency => contact.keep_in_touch_frequency.as_deref(),
        MergeField::Score => return None,
    };
    present(value)
}

fn has_value(contact: &Contact, field: MergeField) -> bool {
    match field {
        MergeField::Score => contact.score.is_some(),
        _ => text_value(contact, field).is_some(),
    }
}

/// Default merge plan for folding `current` into `duplicate`.
///
/// Every scalar keeps the current contact's value unless it is blank and the
/// duplicate has one. A current category of "Inbox" yields to any other
/// category on the duplicate. All collections default to combine.
pub fn propose(current: &Contact, duplicate: &Contact) -> MergeSelection {
    let mut selection = MergeSelection::default();

    for field in MergeField::ALL {
        if !has_value(current, field) && has_value(duplicate, field) {
            selection.set_field(field, FieldMode::Duplicate);
        }
    }

    let current_category = text_value(current, MergeField::Category);
    let duplicate_category = text_value(duplicate, MergeField::Category);
    if current_category == Some(CATEGORY_INBOX) && duplicate_category != Some(CATEGORY_INBOX) {
        selection.set_field(MergeField::Category, FieldMode::Duplicate);
    }

    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::CollectionMode;

    fn contact(id: i64) -> Contact {
        Contact {
            contact_id: id,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: None,
            mobile: None,
            linkedin: None,
            job_role: None,
            description: None,
            score: None,
            category: Some("Founder".to_string()),
            keep_in_touch_frequency: None,
            birthday: None,
            created_at: 0,
            last_modified_at: 0,
        }
    }

    #[test]
    fn test_prefers_current_when_both_filled() {
        let mut current = contact(1);
        current.job_role = Some("CTO".to_string());
        let mut duplicate = contact(2);
        duplicate.job_role = Some("Engineer".to_string());

        let plan = propose(&current, &duplicate);

        assert_eq!(plan.job_role, FieldMode::Current);
        assert_eq!(plan.first_name, FieldMode::Current);
        assert_eq!(plan.category, FieldMode::Current);
    }

    #[test]
    fn test_fills_blanks_from_duplicate() {
        let mut current = contact(1);
        current.last_name = Some("  ".to_string());
        let mut duplicate = contact(2);
        duplicate.linkedin = Some("https://linkedin.com/in/ada".to_string());
        duplicate.score = Some(4);
        duplicate.keep_in_touch_frequency = Some("Monthly".to_string());

        let plan = propose(&current, &duplicate);

        assert_eq!(plan.last_name, FieldMode::Duplicate);
        assert_eq!(plan.linkedin, FieldMode::Duplicate);
        assert_eq!(plan.score, FieldMode::Duplicate);
        assert_eq!(plan.keep_in_touch_frequency, FieldMode::Duplicate);
        // Neither side has a description
        assert_eq!(plan.description, FieldMode::Current);
    }

    #[test]
    fn test_inbox_category_yields() {
        let mut current = contact(1);
        current.category = Some("Inbox".to_string());
        let duplicate = contact(2);

        assert_eq!(propose(&current, &duplicate).category, FieldMode::Duplicate);

        let mut inbox_duplicate = contact(2);
        inbox_duplicate.category = Some("Inbox".to_string());
        assert_eq!(propose(&current, &inbox_duplicate).category, FieldMode::Current);
    }

    #[test]
    fn test_collections_default_to_combine() {
        let plan = propose(&contact(1), &contact(2));

        assert_eq!(plan.emails, CollectionMode::Combine);
        assert_eq!(plan.mobiles, CollectionMode::Combine);
        assert_eq!(plan.tags, CollectionMode::Combine);
        assert_eq!(plan.cities, CollectionMode::Combine);
        assert_eq!(plan.companies, CollectionMode::Combine);
    }

    #[test]
    fn test_propose_is_deterministic() {
        let mut current = contact(1);
        current.category = Some("Inbox".to_string());
        let mut duplicate = contact(2);
        duplicate.description = Some("Met at a conference".to_string());

        assert_eq!(propose(&current, &duplicate), propose(&current, &duplicate));
    }
}
