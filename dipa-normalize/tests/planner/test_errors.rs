//! Configuration and grouping failures

use super::common::*;
use dipa_normalize::{plan, EntityTable, ErrorKind, NormalizeConfig, PlanError};

#[test]
fn test_unknown_species_fails_before_table_is_read() {
    let empty = EntityTable::from_csv_str("NOTHING\n").unwrap();
    let config = NormalizeConfig {
        species: "Dog".into(),
        ..Default::default()
    };
    let err = plan(&empty, &config).unwrap_err();
    assert!(matches!(err, PlanError::UnknownSpecies(ref s) if s == "Dog"));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_missing_columns() {
    let table = EntityTable::from_csv_str("ID,IMAGE\ns1,a.nii.gz\n").unwrap();
    let err = plan(&table, &config(1, 1, 1)).unwrap_err();
    assert!(matches!(err, PlanError::MissingColumns { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_empty_table() {
    let table = EntityTable::from_csv_str("ID,SPD\n").unwrap();
    let err = plan(&table, &config(1, 1, 1)).unwrap_err();
    assert!(matches!(err, PlanError::EmptyTable));
}

#[test]
fn test_invalid_hierarchy() {
    let config = NormalizeConfig {
        hierarchy: vec!["ID".into(), "SITE".into()],
        ..Default::default()
    };
    let err = plan(&flat_table(&["A"]), &config).unwrap_err();
    assert!(matches!(err, PlanError::InvalidHierarchy { .. }));
}

#[test]
fn test_subject_split_across_sites_is_a_grouping_error() {
    let table = EntityTable::from_csv_str(
        "SITE,SUBJECT,ID,SPD\n\
         north,sub1,s1,a\n\
         north,sub2,s2,b\n\
         south,sub2,s3,c\n",
    )
    .unwrap();
    let config = NormalizeConfig {
        hierarchy: vec!["SITE".into(), "SUBJECT".into()],
        ..config(1, 1, 1)
    };
    let err = plan(&table, &config).unwrap_err();
    match &err {
        PlanError::AmbiguousGroup {
            level,
            value,
            first,
            second,
            ..
        } => {
            assert_eq!(level, "SUBJECT");
            assert_eq!(value, "sub2");
            assert_eq!(first, "north");
            assert_eq!(second, "south");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::Grouping);
}

#[test]
fn test_two_projects_rejected() {
    let table = EntityTable::from_csv_str("PROJECT,ID,SPD\nA,s1,a\nB,s2,b\n").unwrap();
    let err = plan(&table, &config(1, 1, 1)).unwrap_err();
    assert!(matches!(err, PlanError::MultipleRoots { .. }));
    assert_eq!(err.kind(), ErrorKind::Grouping);
}
