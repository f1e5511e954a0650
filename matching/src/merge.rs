use shared_types::{
    CollectionMode, ContactEmail, ContactMobile, ContactPointType, ContactRecord, FieldMode,
    MergeCollection, MergeField, MergeSelection,
};
use std::collections::HashSet;
use std::hash::Hash;

use crate::normalize::{normalize_email, normalize_label, normalize_mobile, present};

/// Resolve `selection` over two records into the record the survivor should hold.
///
/// The survivor is `duplicate`: its id and timestamps are kept. `current` is
/// the contact being folded into it. Combined collections list current's items
/// first, drop repeats by natural key and keep at most one primary entry.
/// An email or mobile held only on a contact row counts as that side's primary entry.
pub fn apply_selection(
    current: &ContactRecord,
    duplicate: &ContactRecord,
    selection: &MergeSelection,
) -> ContactRecord {
    let current = &fold_contact_points(current);
    let duplicate = &fold_contact_points(duplicate);
    let mut contact = duplicate.contact.clone();

    for field in MergeField::ALL {
        if selection.field(field) == FieldMode::Duplicate {
            continue;
        }
        let source = &current.contact;
        match field {
            MergeField::FirstName => contact.first_name = source.first_name.clone(),
            MergeField::LastName => contact.last_name = source.last_name.clone(),
            MergeField::Category => contact.category = source.category.clone(),
            MergeField::JobRole => contact.job_role = source.job_role.clone(),
            MergeField::Linkedin => contact.linkedin = source.linkedin.clone(),
            MergeField::Description => contact.description = source.description.clone(),
            MergeField::Score => contact.score = source.score,
            MergeField::KeepInTouchFrequency => {
                contact.keep_in_touch_frequency = source.keep_in_touch_frequency.clone()
            }
        }
    }

    let mut emails = resolve(
        selection.collection(MergeCollection::Emails),
        &current.emails,
        &duplicate.emails,
        |e| normalize_email(&e.email),
    );
    keep_single_primary(&mut emails, |e| &mut e.is_primary);

    let mut mobiles = resolve(
        selection.collection(MergeCollection::Mobiles),
        &current.mobiles,
        &duplicate.mobiles,
        |m| normalize_mobile(&m.mobile),
    );
    keep_single_primary(&mut mobiles, |m| &mut m.is_primary);

    let tags = resolve(
        selection.collection(MergeCollection::Tags),
        &current.tags,
        &duplicate.tags,
        |t| normalize_label(&t.name),
    );

    let cities = resolve(
        selection.collection(MergeCollection::Cities),
        &current.cities,
        &duplicate.cities,
        |c| normalize_label(&c.name),
    );

    let mut companies = resolve(
        selection.collection(MergeCollection::Companies),
        &current.companies,
        &duplicate.companies,
        |c| c.company_id,
    );
    keep_single_primary(&mut companies, |c| &mut c.is_primary);

    let mut record = ContactRecord {
        contact,
        emails,
        mobiles,
        tags,
        cities,
        companies,
    };
    record.contact.email = record.primary_email().map(String::from);
    record.contact.mobile = record.primary_mobile().map(String::from);
    record
}

/// Copy of `record` whose collections include the contact row's email and mobile.
fn fold_contact_points(record: &ContactRecord) -> ContactRecord {
    let mut record = record.clone();

    if let Some(email) = present(record.contact.email.as_deref()).map(str::to_string) {
        let key = normalize_email(&email);
        if !record.emails.iter().any(|e| normalize_email(&e.email) == key) {
            record.emails.iter_mut().for_each(|e| e.is_primary = false);
            record.emails.insert(
                0,
                ContactEmail {
                    email_id: None,
                    email,
                    email_type: ContactPointType::default(),
                    is_primary: true,
                },
            );
        }
    }

    if let Some(mobile) = present(record.contact.mobile.as_deref()).map(str::to_string) {
        let key = normalize_mobile(&mobile);
        if !record.mobiles.iter().any(|m| normalize_mobile(&m.mobile) == key) {
            record.mobiles.iter_mut().for_each(|m| m.is_primary = false);
            record.mobiles.insert(
                0,
                ContactMobile {
                    mobile_id: None,
                    mobile,
                    mobile_type: ContactPointType::default(),
                    is_primary: true,
                },
            );
        }
    }

    record
}

fn resolve<T, K, F>(mode: CollectionMode, current: &[T], duplicate: &[T], key: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let sources: Vec<&[T]> = match mode {
        CollectionMode::Current => vec![current],
        CollectionMode::Duplicate => vec![duplicate],
        CollectionMode::Combine => vec![current, duplicate],
    };

    let mut seen = HashSet::new();
    sources
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(key(*item)))
        .cloned()
        .collect()
}

fn keep_single_primary<T, F>(items: &mut [T], mut flag: F)
where
    F: FnMut(&mut T) -> &mut bool,
{
    let mut found = false;
    for item in items.iter_mut() {
        let is_primary = flag(item);
        if *is_primary {
            if found {
                *is_primary = false;
            }
            found = true;
        }
    }
}
