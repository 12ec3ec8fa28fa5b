//! Duplicate detection end to end, through to the CSV report.

use super::test_utils::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use treesum::duplicates::{find_duplicates, write_duplicates_csv};

#[test]
fn test_duplicates_found_and_written_as_csv() {
    let temp = TempDir::new().unwrap();
    build_resources(temp.path());
    // Two identical copies of Folder_C next to the original content.
    copy_dir(
        &temp.path().join("Folder_C"),
        &temp.path().join("Backup_One/Folder_C"),
    );
    copy_dir(
        &temp.path().join("Folder_C"),
        &temp.path().join("Backup_Two/Folder_C"),
    );
    calculate_detailed(temp.path(), true);

    let pairs = find_duplicates(temp.path()).unwrap();
    // Backup_One and Backup_Two duplicate each other as whole trees; their
    // Folder_C copies also duplicate the original.
    assert!(pairs
        .iter()
        .any(|p| p.a == PathBuf::from("Backup_One") && p.b == PathBuf::from("Backup_Two")));
    assert!(pairs
        .iter()
        .any(|p| p.a == PathBuf::from("Backup_One/Folder_C")
            && p.b == PathBuf::from("Folder_C")));
    // Nested repeats inside an already reported pair are suppressed.
    assert!(!pairs
        .iter()
        .any(|p| p.a == PathBuf::from("Backup_One/Folder_C/Folder_C2")));
    // Descending size order.
    for window in pairs.windows(2) {
        assert!(window[0].size >= window[1].size);
    }

    let csv_path = temp.path().join("duplicates.csv");
    let out = fs::File::create(&csv_path).unwrap();
    write_duplicates_csv(out, &pairs).unwrap();
    let text = fs::read_to_string(&csv_path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "\"Size (in bytes)\",\"Folder Path\",\"Duplicate Folder Path\","
    );
    assert_eq!(lines.count(), pairs.len());
    assert!(text.contains("\"Backup_One\",\"Backup_Two\","));
}
