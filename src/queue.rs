use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

use crate::checker::{self, CheckerVerdict};
use crate::config::{GlobalConfig, TaskManifest};
use crate::sandbox::{BoxIdPool, IoMode, RunOutcome, SandboxConfig, SandboxDriver};
use crate::types::{PerTestResult, Verdict};

/// Extra time (seconds) isolate grants a program past its wall-clock limit
/// before SIGKILL — distinct from the per-task time limit, and not something
/// the manifest format configures, so it's a fixed engine constant.
const RUN_EXTRA_TIME_SEC: f64 = 0.5;

/// Everything one grading worker needs to run a single test case end to end:
/// sandbox it, classify the run, and (on a clean run) invoke the checker.
pub struct GradingJob {
    pub manifest: Arc<TaskManifest>,
    pub base_path: PathBuf,
    pub submission_id: String,
    pub language_id: String,
    pub user_binary_path: PathBuf,
    pub runner_script_path: Option<PathBuf>,
    pub test_index: usize,
    pub time_limit_sec: f64,
    pub memory_limit_kb: i64,
    pub submission_tmp_dir: PathBuf,
}

type ReplyTx = oneshot::Sender<PerTestResult>;

/// Bounded producer/consumer queue of `GradingJob`s, fed by a fixed pool of
/// worker tasks. Generalizes the teacher's `Mutex<VecDeque> + Notify` queue
/// into a typed `mpsc` channel with a reply channel per job, so callers await
/// the specific result instead of polling shared state.
pub struct JobQueue {
    sender: mpsc::Sender<(GradingJob, ReplyTx)>,
    cancel: CancellationToken,
}

impl JobQueue {
    pub fn new(config: Arc<GlobalConfig>, box_pool: Arc<BoxIdPool>, worker_count: usize) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let rx = Arc::new(AsyncMutex::new(rx));
        let cancel = CancellationToken::new();

        for worker_id in 0..worker_count {
            tokio::spawn(worker_loop(
                worker_id,
                rx.clone(),
                box_pool.clone(),
                config.clone(),
                cancel.clone(),
            ));
        }

        JobQueue { sender: tx, cancel }
    }

    pub async fn submit(&self, job: GradingJob) -> PerTestResult {
        let (tx, rx) = oneshot::channel();
        if self.sender.send((job, tx)).await.is_err() {
            log::error!("job queue is closed; returning judge error");
            return PerTestResult::judge_error("grading queue unavailable");
        }
        rx.await
            .unwrap_or_else(|_| PerTestResult::judge_error("grading worker dropped the job"))
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<AsyncMutex<mpsc::Receiver<(GradingJob, ReplyTx)>>>,
    box_pool: Arc<BoxIdPool>,
    config: Arc<GlobalConfig>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut guard = rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                item = guard.recv() => item,
            }
        };
        let Some((job, reply)) = next else {
            log::info!("grading worker {worker_id} shutting down");
            break;
        };

        let box_pool = box_pool.clone();
        let config = config.clone();
        let result = tokio::task::spawn_blocking(move || run_one_test(job, &config, &box_pool))
            .await
            .unwrap_or_else(|e| {
                log::error!("grading worker {worker_id} panicked: {e}");
                PerTestResult::judge_error("grading worker panicked")
            });
        let _ = reply.send(result);
    }
}

fn run_one_test(job: GradingJob, global: &GlobalConfig, box_pool: &BoxIdPool) -> PerTestResult {
    let guard = box_pool.acquire_guard();
    let test_no = job.test_index + 1;

    let input_path = job.manifest.inputs_base_path.join(format!("{test_no}.in"));
    let solution_path = job.manifest.solutions_base_path.join(format!("{test_no}.sol"));
    let output_path = job.submission_tmp_dir.join(format!("{test_no}.out"));
    let meta_path = job.submission_tmp_dir.join(format!("{test_no}.meta"));
    let check_path = job.submission_tmp_dir.join(format!("{test_no}.check"));

    let io_mode = if job.runner_script_path.is_some() {
        IoMode::Runner
    } else {
        IoMode::Program
    };

    let sandbox_config = SandboxConfig {
        isolate_bin_path: global.isolate_bin_path.clone(),
        box_id: guard.id(),
        user_binary_path: job.user_binary_path.clone(),
        runner_script_path: job.runner_script_path.clone(),
        io_mode,
        meta_log_path: meta_path,
        time_limit_sec: job.time_limit_sec,
        extra_time_sec: RUN_EXTRA_TIME_SEC,
        memory_limit_kb: job.memory_limit_kb,
        input_path,
        output_target_path: output_path.clone(),
    };

    let outcome = SandboxDriver::new(sandbox_config).execute();

    let result = match outcome {
        RunOutcome::JudgeError => {
            PerTestResult::judge_error(global.default_message(Verdict::JudgeError))
        }
        RunOutcome::TimeLimitExceeded { time_ms, memory_kb } => PerTestResult {
            verdict: Verdict::TimeLimitExceeded,
            score: "0".into(),
            time_ms,
            memory_kb,
            message: global.default_message(Verdict::TimeLimitExceeded).to_string(),
        },
        RunOutcome::MemoryLimitExceeded { time_ms, memory_kb } => PerTestResult {
            verdict: Verdict::MemoryLimitExceeded,
            score: "0".into(),
            time_ms,
            memory_kb,
            message: global.default_message(Verdict::MemoryLimitExceeded).to_string(),
        },
        RunOutcome::RuntimeError { time_ms, memory_kb } => PerTestResult {
            verdict: Verdict::RuntimeError,
            score: "0".into(),
            time_ms,
            memory_kb,
            message: global.default_message(Verdict::RuntimeError).to_string(),
        },
        RunOutcome::Ok { time_ms, memory_kb } => {
            let checker_bin = checker::checker_path(&job.manifest, &job.base_path);
            let outcome =
                checker::run_checker(&checker_bin, &input_path, &output_path, &solution_path);
            match outcome.verdict {
                CheckerVerdict::JudgeError => {
                    // A checker-produced judge error is still a judge error: metrics
                    // are zeroed like every other JudgeError/Skipped result.
                    PerTestResult::judge_error(global.default_message(Verdict::JudgeError))
                }
                CheckerVerdict::Correct
                | CheckerVerdict::PartiallyCorrect
                | CheckerVerdict::Incorrect => {
                    let verdict = match outcome.verdict {
                        CheckerVerdict::Correct => Verdict::Correct,
                        CheckerVerdict::PartiallyCorrect => Verdict::PartiallyCorrect,
                        CheckerVerdict::Incorrect => Verdict::Incorrect,
                        CheckerVerdict::JudgeError => unreachable!(),
                    };
                    let message = outcome
                        .message
                        .unwrap_or_else(|| global.default_message(verdict).to_string());
                    PerTestResult {
                        verdict,
                        score: outcome.score,
                        time_ms,
                        memory_kb,
                        message,
                    }
                }
            }
        }
    };

    write_check_file(&check_path, &result);
    result
}

/// Writes the `<verdict>\n<score>\n<message>` operator audit artifact for one
/// test. Never consumed by the engine itself — best-effort only.
fn write_check_file(path: &std::path::Path, result: &PerTestResult) {
    let content = format!("{}\n{}\n{}", result.verdict, result.score, result.message);
    if let Err(e) = fs::write(path, content) {
        log::warn!("failed to write check file {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_file_format_is_verdict_score_message() {
        let result = PerTestResult {
            verdict: Verdict::PartiallyCorrect,
            score: "50".into(),
            time_ms: 120,
            memory_kb: 2048,
            message: "close enough".into(),
        };
        let content = format!("{}\n{}\n{}", result.verdict, result.score, result.message);
        assert_eq!(content, "Partially Correct\n50\nclose enough");
    }

    #[test]
    fn judge_error_always_carries_zeroed_metrics() {
        let result = PerTestResult::judge_error("Internal Judge Error");
        assert_eq!(result.time_ms, 0);
        assert_eq!(result.memory_kb, 0);
        assert_eq!(result.verdict, Verdict::JudgeError);
    }
}
