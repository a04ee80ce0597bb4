use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Semaphore;

use crate::broadcaster::Handle as BroadcasterHandle;
use crate::config::{GlobalConfig, TaskManifest};
use crate::grouper;
use crate::queue::{GradingJob, JobQueue};
use crate::types::{PerGroupResult, PerTestResult, Submission, SubmissionResult};

/// Drives one submission end to end: validate language, materialize sources,
/// compile, then walk groups in order honoring dependencies and early-exit.
/// Grounded in the original Go `GradeSubmission`/`groupIndividualResults`
/// pipeline shape, replacing its goroutine fan-out with sequential dispatch
/// onto the shared `JobQueue` per the concurrency redesign.
pub struct Orchestrator {
    pub global: Arc<GlobalConfig>,
    pub base_path: PathBuf,
    pub tmp_base: PathBuf,
    pub job_queue: Arc<JobQueue>,
    pub broadcaster: BroadcasterHandle,
    /// Bounds how many submissions are graded concurrently to
    /// `global.submission_workers`, per the fixed `S` submission-worker pool.
    pub submission_permits: Arc<Semaphore>,
}

impl Orchestrator {
    /// Waits for a free submission-worker permit, then grades the submission
    /// end to end. Bounds how many submissions are compiled/run concurrently
    /// to `global.submission_workers`, regardless of how many HTTP requests
    /// arrived at once.
    pub async fn grade(&self, submission: Submission) -> SubmissionResult {
        let _permit = self.submission_permits.clone().acquire_owned().await;
        self.broadcaster.compiling(&submission.submission_id);

        // Step 1 (§4.6): validate the language against global config *before*
        // touching the task manifest at all — an unsupported TargLang must
        // short-circuit without a manifest load, even for a nonexistent task.
        let lang_entry = match self.global.language(&submission.language_id) {
            Some(l) => l,
            None => {
                self.broadcaster
                    .compilation_error(&submission.submission_id, "unsupported language");
                return SubmissionResult::compile_failed();
            }
        };

        let manifest = match TaskManifest::load(&self.base_path, &submission.task_id) {
            Ok(m) => m,
            Err(e) => {
                log::error!(
                    "failed to load manifest for task {}: {e}",
                    submission.task_id
                );
                self.broadcaster
                    .compilation_error(&submission.submission_id, "task not found");
                return SubmissionResult::compile_failed();
            }
        };

        let limits = match manifest.limits_for(&submission.language_id) {
            Some(l) => l,
            None => {
                self.broadcaster.compilation_error(
                    &submission.submission_id,
                    "language not supported for this task",
                );
                return SubmissionResult::compile_failed();
            }
        };

        if submission.source.is_empty() {
            self.broadcaster
                .compilation_error(&submission.submission_id, "no source files provided");
            return SubmissionResult::compile_failed();
        }

        let sources = match SourceFiles::materialize(&self.tmp_base, &submission, &lang_entry.extension) {
            Ok(s) => s,
            Err(e) => {
                log::error!("failed to materialize source files: {e}");
                self.broadcaster
                    .compilation_error(&submission.submission_id, "internal error staging source");
                return SubmissionResult::compile_failed();
            }
        };

        let submission_tmp_dir = self.tmp_base.join(&submission.submission_id);
        let _tmp_guard = match TmpDirGuard::create(&submission_tmp_dir) {
            Ok(g) => g,
            Err(e) => {
                log::error!("failed to create submission tmp dir: {e}");
                self.broadcaster
                    .compilation_error(&submission.submission_id, "internal error preparing workspace");
                return SubmissionResult::compile_failed();
            }
        };

        let mut compile_inputs = sources.paths.clone();
        if let Some(extra) = manifest.compile_files.get(&submission.language_id) {
            compile_inputs.extend(extra.iter().map(|f| manifest.task_base_path.join(f)));
        }

        let user_binary_path = match self
            .compile(&submission.language_id, &compile_inputs, &submission_tmp_dir)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                log::error!("compilation failed for submission {}: {e}", submission.submission_id);
                self.broadcaster
                    .compilation_error(&submission.submission_id, "compilation failed");
                return SubmissionResult::compile_failed();
            }
        };

        let manifest = Arc::new(manifest);
        let runner_script_path = self.runner_script_path(&submission.language_id);

        let mut group_results = Vec::with_capacity(manifest.groups.len());
        let mut group_passed = vec![false; manifest.groups.len()];
        let mut grouped_successful = true;
        let mut total_score = 0.0;

        for (group_index, group) in manifest.groups.iter().enumerate() {
            let deps_satisfied = group.dependencies.iter().all(|&d| group_passed[d]);

            if !deps_satisfied {
                let test_results: Vec<PerTestResult> = group
                    .test_range
                    .clone()
                    .map(|test_index| {
                        self.broadcaster
                            .judged_test(&submission.submission_id, test_index);
                        PerTestResult::skipped()
                    })
                    .collect();
                let result = PerGroupResult {
                    score: 0.0,
                    full_score: group.full_score,
                    test_results,
                };
                self.broadcaster
                    .group_result(&submission.submission_id, group_index, result.clone());
                group_results.push(result);
                group_passed[group_index] = false;
                continue;
            }

            let mut test_results = Vec::with_capacity(group.test_range.len());
            let mut early_exit = false;
            for test_index in group.test_range.clone() {
                let result = if early_exit {
                    PerTestResult::skipped()
                } else {
                    let job = GradingJob {
                        manifest: manifest.clone(),
                        base_path: self.base_path.clone(),
                        submission_id: submission.submission_id.clone(),
                        language_id: submission.language_id.clone(),
                        user_binary_path: user_binary_path.clone(),
                        runner_script_path: runner_script_path.clone(),
                        test_index,
                        time_limit_sec: limits.time_limit_sec,
                        memory_limit_kb: limits.memory_limit_kb(),
                        submission_tmp_dir: submission_tmp_dir.clone(),
                    };
                    let result = self.job_queue.submit(job).await;
                    if !result.verdict.is_passing() {
                        early_exit = true;
                    }
                    result
                };
                self.broadcaster
                    .judged_test(&submission.submission_id, test_index);
                test_results.push(result);
            }

            let grouper_path = grouper::grouper_path(&manifest, &self.base_path);
            let first_test_1based = group.test_range.start + 1;
            let last_test_1based = group.test_range.end;
            let raw_score = grouper::run_grouper(
                &grouper_path,
                &submission.submission_id,
                group.full_score,
                first_test_1based,
                last_test_1based,
            );

            let score = match raw_score {
                Some(s) => round2(s.clamp(0.0, group.full_score)),
                None => {
                    grouped_successful = false;
                    0.0
                }
            };
            total_score += score;
            group_passed[group_index] = raw_score.is_some() && score > 0.0;

            let result = PerGroupResult {
                score,
                full_score: group.full_score,
                test_results,
            };
            self.broadcaster
                .group_result(&submission.submission_id, group_index, result.clone());
            group_results.push(result);
        }

        self.broadcaster.complete(&submission.submission_id);

        SubmissionResult {
            compile_successful: true,
            grouped_successful,
            score: round2(total_score),
            groups: group_results,
        }
    }

    fn runner_script_path(&self, language_id: &str) -> Option<PathBuf> {
        let path = self.base_path.join("config/runnerScripts").join(language_id);
        path.exists().then_some(path)
    }

    /// Invokes `<base>/config/compileScripts/<language>` when it exists
    /// (`<tmp_dir> <source>...` on the command line, `"<exit code>\n<binary
    /// path>"` on stdout), or simply renames the lone source file into place
    /// for languages with no compile step.
    async fn compile(
        &self,
        language_id: &str,
        compile_inputs: &[PathBuf],
        submission_tmp_dir: &Path,
    ) -> anyhow::Result<PathBuf> {
        let compile_script = self.base_path.join("config/compileScripts").join(language_id);

        if !compile_script.exists() {
            anyhow::ensure!(
                compile_inputs.len() == 1,
                "language {language_id} has no compile step but submission has more than one source file"
            );
            let target = submission_tmp_dir.join("bin");
            fs::rename(&compile_inputs[0], &target)
                .context("failed to rename interpreted source into place")?;
            return Ok(target);
        }

        let mut args = vec![submission_tmp_dir.to_string_lossy().into_owned()];
        args.extend(compile_inputs.iter().map(|p| p.to_string_lossy().into_owned()));

        let output = tokio::process::Command::new(&compile_script)
            .args(&args)
            .output()
            .await
            .context("failed to spawn compile script")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        let exit_code: i32 = lines
            .next()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(-1);
        let binary_path = lines.next().map(|l| l.trim().to_string());

        anyhow::ensure!(exit_code == 0, "compile script exited with code {exit_code}");
        binary_path
            .map(PathBuf::from)
            .context("compile script produced no binary path on stdout")
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Materializes submitted source text into `<tmp>/source/<id>_<n>.<ext>`
/// files and deletes them unconditionally when dropped, regardless of which
/// exit path the grading took.
struct SourceFiles {
    paths: Vec<PathBuf>,
}

impl SourceFiles {
    fn materialize(tmp_base: &Path, submission: &Submission, extension: &str) -> std::io::Result<Self> {
        let src_dir = tmp_base.join("source");
        fs::create_dir_all(&src_dir)?;
        let mut paths = Vec::with_capacity(submission.source.len());
        for (i, code) in submission.source.iter().enumerate() {
            let path = src_dir.join(format!("{}_{}.{}", submission.submission_id, i, extension));
            fs::write(&path, code)?;
            paths.push(path);
        }
        Ok(SourceFiles { paths })
    }
}

impl Drop for SourceFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = fs::remove_file(path);
        }
    }
}

/// Owns the per-submission scratch directory under `tmp_base` and removes it
/// (and everything in it — outputs, meta logs, `.check` files) once grading
/// finishes, no matter which path out of `grade` was taken.
struct TmpDirGuard {
    path: PathBuf,
}

impl TmpDirGuard {
    fn create(path: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(path)?;
        Ok(TmpDirGuard {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for TmpDirGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            log::warn!(
                "failed to remove submission tmp dir {}: {e}",
                self.path.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn rounds_to_two_decimal_places() {
        assert_eq!(round2(33.333333), 33.33);
        assert_eq!(round2(0.005), 0.01);
    }
}
