use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::TaskManifest;

/// Resolves the manifest's `grouper` field the same way `checker::checker_path`
/// resolves `checker`: `"custom"` is task-local, anything else names a default
/// grouper shipped with the engine.
pub fn grouper_path(manifest: &TaskManifest, base_path: &Path) -> PathBuf {
    if manifest.grouper == "custom" {
        manifest.task_base_path.join("grouper")
    } else {
        base_path
            .join("config")
            .join("defaultGroupers")
            .join(&manifest.grouper)
    }
}

/// Invokes a grouper binary with `(submission_id, full_score, first_test,
/// last_test)` (both 1-based, inclusive) and parses the single floating point
/// score it prints to stdout. `None` means the grouper failed to produce a
/// usable score — the caller treats the group as ungrouped.
pub fn run_grouper(
    grouper_path: &Path,
    submission_id: &str,
    full_score: f64,
    first_test_1based: usize,
    last_test_1based: usize,
) -> Option<f64> {
    let output = Command::new(grouper_path)
        .arg(submission_id)
        .arg(full_score.to_string())
        .arg(first_test_1based.to_string())
        .arg(last_test_1based.to_string())
        .output()
        .map_err(|e| log::error!("failed to spawn grouper {}: {e}", grouper_path.display()))
        .ok()?;

    if !output.status.success() {
        log::error!("grouper {} exited with failure", grouper_path.display());
        return None;
    }

    String::from_utf8_lossy(&output.stdout).trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_grouper_resolves_to_task_directory() {
        let manifest = TaskManifest {
            id: "t".into(),
            default_limits: None,
            limits: Default::default(),
            groups: vec![],
            compile_files: Default::default(),
            checker: "custom".into(),
            grouper: "custom".into(),
            task_base_path: PathBuf::from("/tasks/t"),
            inputs_base_path: PathBuf::from("/tasks/t/inputs"),
            solutions_base_path: PathBuf::from("/tasks/t/solutions"),
            num_tests: 0,
        };
        assert_eq!(
            grouper_path(&manifest, Path::new("/base")),
            PathBuf::from("/tasks/t/grouper")
        );
    }

    #[test]
    fn named_grouper_resolves_under_default_groupers() {
        let manifest = TaskManifest {
            id: "t".into(),
            default_limits: None,
            limits: Default::default(),
            groups: vec![],
            compile_files: Default::default(),
            checker: "custom".into(),
            grouper: "min".into(),
            task_base_path: PathBuf::from("/tasks/t"),
            inputs_base_path: PathBuf::from("/tasks/t/inputs"),
            solutions_base_path: PathBuf::from("/tasks/t/solutions"),
            num_tests: 0,
        };
        assert_eq!(
            grouper_path(&manifest, Path::new("/base")),
            PathBuf::from("/base/config/defaultGroupers/min")
        );
    }
}
