use super::*;
use chrono::NaiveDate;
use shared::domain::{Ethnicity, Gender, Race};

async fn setup() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext { storage }
}

fn fields(last: &str) -> RecipientFields {
    RecipientFields {
        first_name: "Ada".into(),
        last_name: last.into(),
        date_of_birth: NaiveDate::from_ymd_opt(1962, 8, 21).expect("date"),
        gender: Gender::Female,
        race: Race::HawaiianPacificIslander,
        ethnicity: Ethnicity::NonHispanic,
        veteran_status: true,
        household_id: "HH-40".into(),
        active_status: true,
    }
}

#[tokio::test]
async fn create_then_list_reports_new_revision() {
    let ctx = setup().await;
    let created = create_recipient(&ctx, fields("Okafor")).await.expect("create");

    let list = list_recipients(&ctx).await.expect("list");
    assert_eq!(list.revision, created.revision);
    assert_eq!(list.recipients.len(), 1);
    assert_eq!(list.recipients[0].recipient_id, created.recipient_id);
    assert_eq!(current_revision(&ctx).await.expect("rev"), created.revision);
}

#[tokio::test]
async fn blank_required_field_is_a_validation_error() {
    let ctx = setup().await;
    let err = create_recipient(&ctx, fields("  ")).await.expect_err("must fail");
    assert!(matches!(err.code, ErrorCode::Validation));
    assert!(err.message.contains("last_name"));
    assert_eq!(current_revision(&ctx).await.expect("rev"), RevisionMarker(0));
}

#[tokio::test]
async fn update_unknown_recipient_is_not_found() {
    let ctx = setup().await;
    let err = update_recipient(&ctx, RecipientId(77), fields("Okafor"))
        .await
        .expect_err("must fail");
    assert!(matches!(err.code, ErrorCode::NotFound));
}

#[tokio::test]
async fn update_changes_only_the_target() {
    let ctx = setup().await;
    let a = create_recipient(&ctx, fields("Okafor")).await.expect("a");
    let b = create_recipient(&ctx, fields("Silva")).await.expect("b");

    let mut changed = fields("Okafor");
    changed.active_status = false;
    let updated = update_recipient(&ctx, a.recipient_id, changed.clone())
        .await
        .expect("update");
    assert!(updated.revision > b.revision);

    assert_eq!(get_recipient(&ctx, a.recipient_id).await.expect("a").fields, changed);
    assert_eq!(
        get_recipient(&ctx, b.recipient_id).await.expect("b").fields,
        fields("Silva")
    );
}

#[tokio::test]
async fn delete_twice_reports_not_found_the_second_time() {
    let ctx = setup().await;
    let a = create_recipient(&ctx, fields("Okafor")).await.expect("a");
    delete_recipient(&ctx, a.recipient_id).await.expect("delete");
    let err = delete_recipient(&ctx, a.recipient_id)
        .await
        .expect_err("gone");
    assert!(matches!(err.code, ErrorCode::NotFound));
}
