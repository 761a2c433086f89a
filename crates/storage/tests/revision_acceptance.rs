use chrono::NaiveDate;
use shared::domain::{Ethnicity, Gender, Race, RecipientFields, RevisionMarker};
use storage::Storage;

fn fields(last: &str) -> RecipientFields {
    RecipientFields {
        first_name: "Sam".into(),
        last_name: last.into(),
        date_of_birth: NaiveDate::from_ymd_opt(2001, 6, 15).expect("date"),
        gender: Gender::Male,
        race: Race::Black,
        ethnicity: Ethnicity::NonHispanic,
        veteran_status: false,
        household_id: "HH-1".into(),
        active_status: true,
    }
}

#[tokio::test]
async fn revision_tracks_every_successful_mutation_across_reopen() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("recipients.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    let (a, _) = storage.create_recipient(&fields("Alam")).await.expect("create a");
    let (b, _) = storage.create_recipient(&fields("Chen")).await.expect("create b");
    storage
        .update_recipient(a, &fields("Alam-Rahman"))
        .await
        .expect("update")
        .expect("a exists");
    storage.delete_recipient(b).await.expect("delete").expect("b exists");
    drop(storage);

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let (revision, records) = reopened.list_recipients().await.expect("list");
    assert_eq!(revision, RevisionMarker(4));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].recipient_id, a);
    assert_eq!(records[0].fields.last_name, "Alam-Rahman");
}
