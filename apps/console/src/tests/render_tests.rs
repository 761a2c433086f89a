use super::*;
use chrono::NaiveDate;
use client_core::{
    sync::Snapshot,
    view_model::{build_view, FilterSpec, SortSpec},
    FieldFilter,
};
use shared::domain::{
    Ethnicity, FieldKey, Gender, Race, RecipientFields, RecipientId, RecipientRecord,
    RevisionMarker,
};

fn snapshot() -> Snapshot {
    let record = |id, last_name: &str, veteran_status| {
        RecipientRecord::new(
            RecipientId(id),
            RecipientFields {
                first_name: "Sam".into(),
                last_name: last_name.into(),
                date_of_birth: NaiveDate::from_ymd_opt(1970, 4, 2).expect("date"),
                gender: Gender::Nonbinary,
                race: Race::SomeOtherRace,
                ethnicity: Ethnicity::Hispanic,
                veteran_status,
                household_id: "HH-2".into(),
                active_status: true,
            },
        )
    };
    Snapshot {
        revision: Some(RevisionMarker(7)),
        records: vec![record(1, "Alam", false), record(2, "Chen", true)],
    }
}

#[test]
fn renders_labels_markers_and_footer() {
    let filters = FilterSpec::new()
        .with(FieldKey::VeteranStatus, FieldFilter::flag(true))
        .expect("filter");
    let sort = SortSpec::descending(FieldKey::LastName);
    let view = build_view(&snapshot(), Some(&sort), &filters, None, true);

    let text = render_table(&view);
    let lines: Vec<_> = text.lines().collect();

    assert!(lines[0].contains("Name v"));
    assert!(lines[0].contains("Veteran *"));
    assert!(lines[1].starts_with("2 "));
    assert!(lines[1].contains("Non Binary"));
    assert!(lines[1].contains("Other"));
    assert_eq!(
        lines.last().copied(),
        Some("1 of 2 recipients at r7 (stale: last refresh failed)")
    );
}

#[test]
fn loading_view_renders_placeholder() {
    let view = build_view(&Snapshot::default(), None, &FilterSpec::new(), None, false);
    assert_eq!(render_table(&view), "loading recipients...\n");
}
