use super::*;
use std::collections::BTreeSet;

use shared::domain::Gender;

#[test]
fn sort_defaults_to_ascending_and_accepts_aliases() {
    assert_eq!(
        parse_sort("name").expect("sort"),
        SortSpec::ascending(FieldKey::LastName)
    );
    assert_eq!(
        parse_sort("dob:DESC").expect("sort"),
        SortSpec::descending(FieldKey::DateOfBirth)
    );
    assert!(parse_sort("first_name:sideways").is_err());
    assert!(parse_sort("shoe_size").is_err());
}

#[test]
fn filter_parses_typed_values() {
    let (field, filter) = parse_filter("gender=Male,Female").expect("filter");
    assert_eq!(field, FieldKey::Gender);
    assert_eq!(
        filter,
        FieldFilter::Gender(BTreeSet::from([Gender::Male, Gender::Female]))
    );

    let (field, filter) = parse_filter("veteran=yes").expect("filter");
    assert_eq!(field, FieldKey::VeteranStatus);
    assert_eq!(filter, FieldFilter::flag(true));

    assert!(parse_filter("gender").is_err());
    assert!(parse_filter("race=Martian").is_err());
}

#[test]
fn assignment_keeps_raw_value() {
    assert_eq!(
        parse_assignment("household_id=HH=7").expect("assignment"),
        (FieldKey::HouseholdId, "HH=7".to_string())
    );
}

#[test]
fn list_accepts_repeated_filters() {
    let cli = Cli::try_parse_from([
        "recipients",
        "list",
        "--sort-age",
        "--filter",
        "active=true",
        "--filter",
        "last_name=chen",
        "--json",
    ])
    .expect("parse");

    assert!(cli.json);
    let Command::List(view) = cli.command else {
        panic!("expected list");
    };
    assert!(view.sort_age);
    assert_eq!(view.filters.len(), 2);
}

#[test]
fn conflicting_sorts_are_rejected() {
    assert!(Cli::try_parse_from(["recipients", "list", "--sort", "race", "--sort-name"]).is_err());
}

#[test]
fn edit_requires_an_assignment() {
    assert!(Cli::try_parse_from(["recipients", "edit", "4"]).is_err());
    let cli = Cli::try_parse_from(["recipients", "edit", "4", "--set", "race=White"])
        .expect("parse");
    assert!(matches!(cli.command, Command::Edit { id: 4, .. }));
}
