use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::TaskManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerVerdict {
    Correct,
    PartiallyCorrect,
    Incorrect,
    JudgeError,
}

#[derive(Debug, Clone)]
pub struct CheckerOutcome {
    pub verdict: CheckerVerdict,
    pub score: String,
    pub message: Option<String>,
}

impl CheckerOutcome {
    fn judge_error() -> Self {
        CheckerOutcome {
            verdict: CheckerVerdict::JudgeError,
            score: "0".to_string(),
            message: None,
        }
    }
}

/// Resolves the manifest's `checker` field to a path: `"custom"` means the
/// task ships its own `checker` binary alongside its manifest, anything else
/// names one of the engine's default checkers by file name.
pub fn checker_path(manifest: &TaskManifest, base_path: &Path) -> PathBuf {
    if manifest.checker == "custom" {
        manifest.task_base_path.join("checker")
    } else {
        base_path
            .join("config")
            .join("defaultCheckers")
            .join(&manifest.checker)
    }
}

/// Invokes a checker binary with `(input, user_output, solution)` and parses
/// its 2-3 line stdout contract: verdict, score, optional message.
pub fn run_checker(checker_path: &Path, input: &Path, user_output: &Path, solution: &Path) -> CheckerOutcome {
    let output = match Command::new(checker_path)
        .arg(input)
        .arg(user_output)
        .arg(solution)
        .output()
    {
        Ok(o) => o,
        Err(e) => {
            log::error!("failed to spawn checker {}: {e}", checker_path.display());
            return CheckerOutcome::judge_error();
        }
    };
    if !output.status.success() {
        log::error!("checker {} exited with failure", checker_path.display());
        return CheckerOutcome::judge_error();
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.trim().lines().map(|l| l.trim()).collect();
    if lines.len() < 2 || lines.len() > 3 {
        return CheckerOutcome::judge_error();
    }

    let verdict = match lines[0] {
        "Correct" => CheckerVerdict::Correct,
        "Partially Correct" => CheckerVerdict::PartiallyCorrect,
        "Incorrect" => CheckerVerdict::Incorrect,
        "Judge Error" => CheckerVerdict::JudgeError,
        _ => return CheckerOutcome::judge_error(),
    };

    CheckerOutcome {
        verdict,
        score: lines[1].to_string(),
        message: lines.get(2).map(|s| s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_stdout_with_too_few_lines() {
        // Simulated directly since spawning a real checker binary isn't available in tests.
        let stdout = "Correct";
        let lines: Vec<&str> = stdout.trim().lines().collect();
        assert!(lines.len() < 2);
    }

    #[test]
    fn parses_three_line_contract() {
        let stdout = "Partially Correct\n50\nclose enough\n";
        let lines: Vec<&str> = stdout.trim().lines().map(|l| l.trim()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Partially Correct");
        assert_eq!(lines[1], "50");
        assert_eq!(lines[2], "close enough");
    }
}
