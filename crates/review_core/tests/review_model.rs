use chrono::{NaiveDate, TimeZone, Utc};
use review_core::{ExtensionValue, ReviewCandidate, ReviewDocument, ReviewPatch, StandardField};
use uuid::Uuid;

fn sample_document() -> ReviewDocument {
    let candidate = ReviewCandidate::new(
        7,
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        " Maria Chen ",
        4.5,
    )
    .with_standard(StandardField::Strengths, "Mentoring")
    .with_standard(StandardField::AreasForImprovement, "  ")
    .with_extension("certifications", vec!["AWS"])
    .with_extension("notes", "  spaced  ");

    ReviewDocument::from_candidate(
        Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap(),
        3,
        candidate,
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap(),
    )
}

#[test]
fn from_candidate_normalizes_text_fields() {
    let document = sample_document();

    assert_eq!(document.reviewer_name, "Maria Chen");
    assert_eq!(document.strengths.as_deref(), Some("Mentoring"));
    assert_eq!(document.areas_for_improvement, None);
    assert_eq!(
        document.extension("notes"),
        Some(&ExtensionValue::Text("spaced".to_string()))
    );
}

#[test]
fn document_serialization_uses_expected_field_names() {
    let json = serde_json::to_value(sample_document()).unwrap();

    assert_eq!(json["_id"], "11111111-2222-4333-8444-555555555555");
    assert_eq!(json["review_number"], 3);
    assert_eq!(json["employee_id"], 7);
    assert_eq!(json["review_date"], "2024-01-15");
    assert_eq!(json["created_at"], "2024-01-15T09:30:00.000000Z");
    assert_eq!(json["extensions"]["certifications"][0], "AWS");
    assert!(json.get("areas_for_improvement").is_none());
    assert!(json.get("goals_for_next_period").is_none());

    let decoded: ReviewDocument = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, sample_document());
}

#[test]
fn extension_values_keep_integer_and_real_forms() {
    let value: ExtensionValue = serde_json::from_str(
        r#"{"team_size": 5, "score": 4.5, "remote": true, "tags": ["a", 2], "nested": {"k": "v"}}"#,
    )
    .unwrap();

    let ExtensionValue::Map(entries) = value else {
        panic!("expected a map");
    };
    assert_eq!(entries["team_size"], ExtensionValue::Integer(5));
    assert_eq!(entries["score"], ExtensionValue::Number(4.5));
    assert_eq!(entries["remote"], ExtensionValue::Bool(true));
    assert_eq!(
        entries["tags"],
        ExtensionValue::List(vec![
            ExtensionValue::Text("a".to_string()),
            ExtensionValue::Integer(2)
        ])
    );
    assert_eq!(entries["nested"].as_text(), None);
}

#[test]
fn documents_without_optional_fields_deserialize() {
    let value = serde_json::json!({
        "_id": "11111111-2222-4333-8444-555555555555",
        "review_number": 1,
        "employee_id": 1,
        "review_date": "2024-01-15",
        "reviewer_name": "Sam",
        "overall_rating": 4,
        "created_at": "2024-01-15T09:30:00.000000Z"
    });

    let document: ReviewDocument = serde_json::from_value(value).unwrap();
    assert_eq!(document.overall_rating, 4.0);
    assert!(document.extensions.is_empty());
    assert_eq!(document.standard_field(StandardField::Comments), None);
}

#[test]
fn patch_emptiness_tracks_every_field() {
    assert!(ReviewPatch::default().is_empty());
    assert!(!ReviewPatch::default()
        .with_standard(StandardField::Comments, "x")
        .is_empty());
    assert!(!ReviewPatch::default().without_extension("k").is_empty());
    assert!(!ReviewPatch {
        overall_rating: Some(3.0),
        ..ReviewPatch::default()
    }
    .is_empty());
}
