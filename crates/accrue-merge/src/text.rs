use accrue_types::FileContents;

/// Merge files as plain text.
///
/// Every file is split on `\n`, empty lines are dropped, and all remaining
/// lines are sorted together byte-wise. File boundaries are not kept.
pub fn sort_lines(files: &[FileContents]) -> String {
    let mut lines: Vec<&str> = files
        .iter()
        .flat_map(|file| file.contents.split('\n'))
        .filter(|line| !line.is_empty())
        .collect();
    lines.sort_unstable();
    lines.join("\n")
}
