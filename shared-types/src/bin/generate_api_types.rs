use shared_types::*;
use std::fs;
use std::path::PathBuf;
use ts_rs::TS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate TypeScript definitions for the intake UI
    let mut types = Vec::new();

    // Contact types
    types.push(clean_type(Contact::export_to_string()?));
    types.push(clean_type(ContactPointType::export_to_string()?));
    types.push(clean_type(ContactEmail::export_to_string()?));
    types.push(clean_type(ContactMobile::export_to_string()?));
    types.push(clean_type(Tag::export_to_string()?));
    types.push(clean_type(City::export_to_string()?));
    types.push(clean_type(ContactCompany::export_to_string()?));
    types.push(clean_type(ContactRecord::export_to_string()?));
    types.push(clean_type(ContactRecordResponse::export_to_string()?));

    // Duplicate search types
    types.push(clean_type(Candidate::export_to_string()?));
    types.push(clean_type(DuplicateSearchResponse::export_to_string()?));

    // Merge types
    types.push(clean_type(FieldMode::export_to_string()?));
    types.push(clean_type(CollectionMode::export_to_string()?));
    types.push(clean_type(MergeSelection::export_to_string()?));
    types.push(clean_type(SubmitMergeRequest::export_to_string()?));
    types.push(clean_type(FalsePositiveRequest::export_to_string()?));
    types.push(clean_type(MergePlanResponse::export_to_string()?));

    // Duplicate pair types
    types.push(clean_type(DuplicateStatus::export_to_string()?));
    types.push(clean_type(DuplicatePair::export_to_string()?));
    types.push(clean_type(DuplicatePairStatus::export_to_string()?));

    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("../ui/src/api-types"));
    fs::create_dir_all(&output_dir)?;

    let output_path = output_dir.join("types.ts");
    let output = types.join("\n\n");

    fs::write(&output_path, output)?;
    println!("Generated TypeScript types in {}", output_path.display());

    Ok(())
}

fn clean_type(mut type_def: String) -> String {
    type_def.retain(|c| c != '\r');

    // All types land in one file, so cross-type imports are dropped
    let result = type_def
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("import type")
                && !trimmed.starts_with("// This file was generated")
                && !trimmed.starts_with("/* This file was generated")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    if result.is_empty() {
        result
    } else {
        format!("{}\n", result)
    }
}
