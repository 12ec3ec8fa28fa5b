//! Calculate-then-compare scenarios over evolving trees.

use super::test_utils::*;
use std::fs;
use tempfile::TempDir;
use treesum::compare::compare_trees;

#[test]
fn test_general_comparison_flow() {
    let resources = TempDir::new().unwrap();
    let temp = TempDir::new().unwrap();
    build_resources(resources.path());
    copy_dir(resources.path(), temp.path());

    // Identical trees.
    calculate_detailed(resources.path(), true);
    calculate_detailed(temp.path(), true);
    let report = compare_trees(resources.path(), temp.path(), 4).unwrap();
    assert!(report.contains("No differences found."), "{report}");
    let report = compare_trees(
        &resources.path().join("Folder_C/Folder_C2"),
        &temp.path().join("Folder_C/Folder_C2"),
        4,
    )
    .unwrap();
    assert!(report.contains("No differences found."), "{report}");

    // Add a file in Folder_C.
    fs::write(
        temp.path().join("Folder_C/Created_File_1.txt"),
        "I was created for this test.",
    )
    .unwrap();
    calculate_detailed(temp.path(), false);
    let report = compare_trees(resources.path(), temp.path(), 4).unwrap();
    let (file_mismatches, missing_a, missing_b) = parse_results(&report, resources.path());
    assert_eq!(file_mismatches, vec!["Folder_C"]);
    assert!(missing_a.is_empty());
    assert!(missing_b.is_empty());

    // The untouched deeper subtree still matches.
    let report = compare_trees(
        &resources.path().join("Folder_C/Folder_C2"),
        &temp.path().join("Folder_C/Folder_C2"),
        4,
    )
    .unwrap();
    assert!(report.contains("No differences found."), "{report}");

    // Add a directory under Folder_C2; the created file stays too.
    fs::create_dir(temp.path().join("Folder_C/Folder_C2/New_Directory")).unwrap();
    calculate_detailed(temp.path(), false);
    let report = compare_trees(resources.path(), temp.path(), 4).unwrap();
    let (file_mismatches, missing_a, missing_b) = parse_results(&report, resources.path());
    assert_eq!(file_mismatches, vec!["Folder_C"]);
    assert_eq!(missing_a, vec!["New_Directory"]);
    assert!(missing_b.is_empty());

    // Start from within Folder_C2, with A and B swapped.
    let report = compare_trees(
        &temp.path().join("Folder_C/Folder_C2"),
        &resources.path().join("Folder_C/Folder_C2"),
        4,
    )
    .unwrap();
    let (file_mismatches, missing_a, missing_b) = parse_results(&report, temp.path());
    assert!(file_mismatches.is_empty());
    assert!(missing_a.is_empty());
    assert_eq!(missing_b, vec!["New_Directory"]);
}

#[test]
fn test_default_depth_limits_expansion() {
    let resources = TempDir::new().unwrap();
    let temp = TempDir::new().unwrap();
    build_resources(resources.path());
    copy_dir(resources.path(), temp.path());
    fs::write(
        temp.path().join("Folder_C/Folder_C2/File_C2.txt"),
        "Changed deeper contents.\n",
    )
    .unwrap();
    calculate_detailed(resources.path(), true);
    calculate_detailed(temp.path(), true);

    // The default depth of 2 stops above Folder_C2.
    let report = compare_trees(resources.path(), temp.path(), 2).unwrap();
    assert!(
        report.contains("Directory 'Folder_C2' contains differences between A and B."),
        "{report}"
    );
    assert!(!report.contains("Files within this folder mismatch."));
}
