//! Shared fixtures and a parser for the comparison report.

use std::fs;
use std::path::{Path, PathBuf};
use treesum::calculate::{calculate_tree, CalcOptions};
use treesum::hashing::StreamingMd5;
use treesum::progress::NullProgress;

/// Lay down the standard fixture tree used across scenarios.
pub fn build_resources(root: &Path) {
    fs::create_dir_all(root.join("Folder_A")).unwrap();
    fs::create_dir_all(root.join("Folder_B")).unwrap();
    fs::create_dir_all(root.join("Folder_C/Folder_C2")).unwrap();
    fs::write(root.join("root_file.txt"), "At the top of the tree.\n").unwrap();
    fs::write(root.join("Folder_A/File_A1.txt"), "Contents of File A1.\n").unwrap();
    fs::write(root.join("Folder_B/File_B1.txt"), "Contents of File B1.\n").unwrap();
    fs::write(root.join("Folder_C/File_C1.txt"), "Contents of File C1.\n").unwrap();
    fs::write(
        root.join("Folder_C/Folder_C2/File_C2.txt"),
        "Deeper contents.\n",
    )
    .unwrap();
}

/// Recursive copy, used to clone fixtures before they gain store files.
pub fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

pub fn calculate(path: &Path, start_new: bool, options: CalcOptions) {
    let hasher = StreamingMd5::without_pause();
    calculate_tree(path, start_new, options, &hasher, &mut NullProgress).unwrap();
}

/// Full detail-recording pass, the way the scenarios invoke the tool.
pub fn calculate_detailed(path: &Path, start_new: bool) {
    calculate(
        path,
        start_new,
        CalcOptions {
            detail_files: true,
            ..CalcOptions::default()
        },
    );
}

/// Extract (file mismatch folders relative to `base_a`, names absent from A,
/// names absent from B) from a comparison report.
pub fn parse_results(text: &str, base_a: &Path) -> (Vec<String>, Vec<String>, Vec<String>) {
    let base_a = fs::canonicalize(base_a).unwrap_or_else(|_| base_a.to_path_buf());
    let mut file_mismatches = Vec::new();
    let mut missing_a = Vec::new();
    let mut missing_b = Vec::new();
    let mut current_a = base_a.clone();

    for line in text.lines() {
        if let Some(idx) = line.find(" (A) vs ") {
            current_a = PathBuf::from(line[..idx].trim());
        }
        if line.contains("Files within this folder mismatch") {
            let rel = current_a.strip_prefix(&base_a).unwrap_or(&current_a);
            file_mismatches.push(rel.to_string_lossy().into_owned());
        }
        if line.contains("absent from A") {
            missing_a.push(quoted_name(line));
        }
        if line.contains("absent from B") {
            missing_b.push(quoted_name(line));
        }
    }
    (file_mismatches, missing_a, missing_b)
}

fn quoted_name(line: &str) -> String {
    let first = line.find('\'').map(|i| i + 1).unwrap_or(0);
    let last = line.rfind('\'').unwrap_or(line.len());
    line[first..last].to_string()
}
