//! Continuation-mode calculation scenarios.

use super::test_utils::*;
use std::fs;
use tempfile::TempDir;
use treesum::calculate::CalcOptions;
use treesum::compare::compare_trees;

fn run_continuation(parallel: usize) {
    let resources = TempDir::new().unwrap();
    let temp_a = TempDir::new().unwrap();
    let temp_b = TempDir::new().unwrap();
    build_resources(resources.path());
    copy_dir(resources.path(), temp_a.path());
    copy_dir(resources.path(), temp_b.path());

    let with_parallel = |continue_previous: bool| CalcOptions {
        continue_previous,
        detail_files: true,
        parallel,
        ..CalcOptions::default()
    };

    calculate(temp_a.path(), true, with_parallel(false));
    calculate(temp_b.path(), true, with_parallel(false));
    let report = compare_trees(
        &temp_a.path().join("Folder_C/Folder_C2"),
        &temp_b.path().join("Folder_C/Folder_C2"),
        4,
    )
    .unwrap();
    assert!(report.contains("No differences found."), "{report}");

    // A continuation pass picks up the new folder but skips the already
    // finished Folder_C, so the change inside it goes unnoticed for now.
    let continue_text = "This file should be added by continuation.";
    fs::create_dir(temp_a.path().join("Continuation_Folder_A")).unwrap();
    fs::write(
        temp_a.path().join("Continuation_Folder_A/File_A.txt"),
        continue_text,
    )
    .unwrap();
    fs::write(
        temp_a.path().join("Folder_C/Ignored_file_A.txt"),
        "This file should go unnoticed in continuation.",
    )
    .unwrap();
    calculate(temp_a.path(), false, with_parallel(true));

    // Mirror only the new folder on B with a full pass.
    fs::create_dir(temp_b.path().join("Continuation_Folder_A")).unwrap();
    fs::write(
        temp_b.path().join("Continuation_Folder_A/File_A.txt"),
        continue_text,
    )
    .unwrap();
    calculate(temp_b.path(), false, with_parallel(false));

    let report = compare_trees(temp_a.path(), temp_b.path(), 4).unwrap();
    assert!(report.contains("No differences found."), "{report}");

    // A full pass on A finally observes the ignored file.
    calculate(temp_a.path(), false, with_parallel(false));
    let report = compare_trees(temp_a.path(), temp_b.path(), 4).unwrap();
    let (file_mismatches, missing_a, missing_b) = parse_results(&report, temp_a.path());
    assert_eq!(file_mismatches, vec!["Folder_C"]);
    assert!(missing_a.is_empty());
    assert!(missing_b.is_empty());
}

#[test]
fn test_continuation_sequential() {
    run_continuation(1);
}

#[test]
fn test_continuation_parallel() {
    run_continuation(5);
}
