//! Record-driven synchronization scenarios.

use super::test_utils::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use treesum::compare::compare_trees;
use treesum::hashing::StreamingMd5;
use treesum::progress::NullProgress;
use treesum::record::{Store, STORE_FILENAME};
use treesum::update::update_tree;

fn update(src: &Path, dst: &Path, dry_run: bool) {
    let hasher = StreamingMd5::without_pause();
    update_tree(src, dst, dry_run, &hasher, &mut NullProgress).unwrap();
}

fn diverge(src: &Path, dst: &Path) {
    // Source gains changes the destination must pick up.
    fs::write(
        src.join("Folder_C/Folder_C2/File_C2.txt"),
        "Rewritten deeper contents.\n",
    )
    .unwrap();
    fs::create_dir(src.join("Fresh_Folder")).unwrap();
    fs::write(src.join("Fresh_Folder/fresh.txt"), "brand new\n").unwrap();
    // Destination holds leftovers the source no longer has.
    fs::write(dst.join("Folder_B/stray.txt"), "stray\n").unwrap();
    fs::create_dir(dst.join("Leftover_Folder")).unwrap();
    fs::write(dst.join("Leftover_Folder/old.txt"), "old\n").unwrap();
}

#[test]
fn test_update_synchronizes_and_refreshes_records() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    build_resources(src.path());
    copy_dir(src.path(), dst.path());
    diverge(src.path(), dst.path());

    calculate_detailed(src.path(), true);
    calculate_detailed(dst.path(), true);
    update(src.path(), dst.path(), false);

    assert_eq!(
        fs::read_to_string(dst.path().join("Folder_C/Folder_C2/File_C2.txt")).unwrap(),
        "Rewritten deeper contents.\n"
    );
    assert_eq!(
        fs::read_to_string(dst.path().join("Fresh_Folder/fresh.txt")).unwrap(),
        "brand new\n"
    );
    assert!(!dst.path().join("Folder_B/stray.txt").exists());
    assert!(!dst.path().join("Leftover_Folder").exists());

    let report = compare_trees(src.path(), dst.path(), 4).unwrap();
    assert!(report.contains("No differences found."), "{report}");

    // The record refreshed by the update matches a from-scratch pass.
    let refreshed = Store::at(dst.path()).unwrap().load().unwrap();
    calculate_detailed(dst.path(), false);
    let fresh = Store::at(dst.path()).unwrap().load().unwrap();
    assert_eq!(refreshed.tree_hash, fresh.tree_hash);
    assert_eq!(refreshed.n_files, fresh.n_files);
    assert_eq!(refreshed.size, fresh.size);
}

#[test]
fn test_update_dry_run_reports_without_changing() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    build_resources(src.path());
    copy_dir(src.path(), dst.path());
    diverge(src.path(), dst.path());

    calculate_detailed(src.path(), true);
    calculate_detailed(dst.path(), true);
    let store_before = fs::read(dst.path().join(STORE_FILENAME)).unwrap();

    update(src.path(), dst.path(), true);

    assert_eq!(
        fs::read_to_string(dst.path().join("Folder_C/Folder_C2/File_C2.txt")).unwrap(),
        "Deeper contents.\n"
    );
    assert!(dst.path().join("Folder_B/stray.txt").exists());
    assert!(dst.path().join("Leftover_Folder").exists());
    assert!(!dst.path().join("Fresh_Folder").exists());
    assert_eq!(
        fs::read(dst.path().join(STORE_FILENAME)).unwrap(),
        store_before
    );
}
