use std::path::{Path, PathBuf};

/// Recursively find every `terragrunt.hcl` file under `root`, excluding
/// `.terragrunt-cache` directories (spec §6: "File system: terragrunt.hcl
/// files found by recursive directory walk excluding .terragrunt-cache").
pub fn find_terragrunt_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(root, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Ok(()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if path.file_name().map(|n| n == ".terragrunt-cache").unwrap_or(false) {
                continue;
            }
            walk(&path, found)?;
        } else if path.file_name().map(|n| n == "terragrunt.hcl").unwrap_or(false) {
            found.push(path);
        }
    }
    Ok(())
}
