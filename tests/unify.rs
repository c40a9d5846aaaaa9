use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_table_curator::domain::Key;
use kira_table_curator::error::CurateError;
use kira_table_curator::unify::{CategoryUnifier, UnifyConfig};

fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

fn reaction_config(root: &Utf8PathBuf) -> UnifyConfig {
    UnifyConfig {
        data_dir: root.clone(),
        manifest: vec![
            "glycolysis.tsv".to_string(),
            "tca_cycle.tsv".to_string(),
            "nitrogen.tsv".to_string(),
        ],
        key: Some(Key::single("Reaction ID")),
        priority_columns: vec![
            "Reaction ID".to_string(),
            "Equation".to_string(),
            "Category".to_string(),
            "EC Number".to_string(),
            "KEGG ID".to_string(),
            "Gene Link".to_string(),
            "Note".to_string(),
        ],
        link_column: Some("Gene Link".to_string()),
        category_column: None,
    }
}

#[test]
fn unifies_manifest_in_priority_order() {
    let (_temp, root) = scratch();
    fs::write(
        root.join("glycolysis.tsv"),
        "note\tReaction ID\tEquation\tgene link\n\
         first\tR00200\tADP + PEP = ATP + pyruvate\tpykF\n\
         \tR00658\t2PG = PEP + H2O\t\n",
    )
    .unwrap();
    fs::write(
        root.join("tca_cycle.tsv"),
        "Reaction ID\tEC Number\tEquation\tGene Link\n\
         R00351\t2.3.3.1\tAcCoA + OAA = citrate\tgltA\n\
         R00200\t2.7.1.40\tduplicate of glycolysis\tpykA\n",
    )
    .unwrap();

    let unified = CategoryUnifier::new(reaction_config(&root)).unify().unwrap();

    assert_eq!(
        unified.table.columns(),
        ["Reaction ID", "Equation", "EC Number", "gene link", "note"]
    );
    let ids = unified
        .table
        .column_values("Reaction ID")
        .unwrap()
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["R00200", "R00658", "R00351"]);
    assert_eq!(
        unified.table.rows()[0].values(),
        ["R00200", "ADP + PEP = ATP + pyruvate", "", "pykF", "first"]
    );

    let report = &unified.report;
    assert_eq!(report.skipped, vec!["nitrogen.tsv".to_string()]);
    assert_eq!(report.categories.len(), 2);
    assert_eq!(report.categories[0].file, "glycolysis.tsv");
    assert_eq!(
        (report.categories[0].rows_before, report.categories[0].rows_after),
        (2, 2)
    );
    assert_eq!(
        (report.categories[1].rows_before, report.categories[1].rows_after),
        (2, 1)
    );
    assert_eq!(
        (report.categories[1].linked_before, report.categories[1].linked_after),
        (2, 1)
    );
    assert_eq!(report.total_before, 4);
    assert_eq!(report.total_after, 3);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.linked_total, 2);
}

#[test]
fn empty_manifest_is_a_configuration_error() {
    let (_temp, root) = scratch();
    let mut config = reaction_config(&root);
    config.manifest.clear();

    let err = CategoryUnifier::new(config).unify().unwrap_err();

    assert_matches!(err, CurateError::EmptyManifest);
}

#[test]
fn key_missing_from_every_category_is_fatal() {
    let (_temp, root) = scratch();
    fs::write(root.join("glycolysis.tsv"), "Equation\nA = B\n").unwrap();

    let err = CategoryUnifier::new(reaction_config(&root))
        .unify()
        .unwrap_err();

    assert_matches!(err, CurateError::UnknownColumn { column, .. } if column == "Reaction ID");
}
