use std::collections::{HashMap, HashSet};
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::GraderError;
use crate::types::Verdict;

/// Command-line entry point, mirroring the teacher's `CliArgs`: one required
/// path to the task/config tree, everything else lives in `globalConfig.json`
/// underneath it.
#[derive(Debug, Parser)]
#[command(name = "gradebox", about = "online-judge grading engine")]
pub struct CliArgs {
    /// Root directory containing `config/globalConfig.json` and `tasks/<id>/manifest.json`.
    #[arg(short = 'c', long = "base-path")]
    pub base_path: PathBuf,

    /// Directory grading artifacts are scratched into; cleaned per-submission.
    #[arg(short = 't', long = "tmp-path", default_value = "/tmp/grader")]
    pub tmp_path: PathBuf,

    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageEntry {
    pub id: String,
    pub extension: String,
}

fn default_box_pool_size() -> u32 {
    4
}
fn default_submission_workers() -> usize {
    4
}
fn default_grading_workers() -> usize {
    4
}

#[derive(Debug, Deserialize)]
struct RawGlobalConfig {
    lang_config: Vec<LanguageEntry>,
    default_messages: HashMap<String, String>,
    isolate_bin_path: PathBuf,
    listen_port: u16,
    update_port: u16,
    update_host: Option<String>,
    #[serde(default = "default_box_pool_size")]
    box_pool_size: u32,
    #[serde(default = "default_submission_workers")]
    submission_workers: usize,
    #[serde(default = "default_grading_workers")]
    grading_workers: usize,
}

/// Engine-wide configuration loaded from `<base_path>/config/globalConfig.json`.
///
/// **[ADD]** carries `box_pool_size`/`submission_workers`/`grading_workers`
/// beyond spec.md's literal JSON shape — see DESIGN.md's Open Question
/// resolution for §5's scheduling model.
#[derive(Debug)]
pub struct GlobalConfig {
    pub lang_config: Vec<LanguageEntry>,
    pub default_messages: HashMap<Verdict, String>,
    pub isolate_bin_path: PathBuf,
    pub listen_port: u16,
    pub update_port: u16,
    pub update_host: String,
    pub box_pool_size: u32,
    pub submission_workers: usize,
    pub grading_workers: usize,
}

const REQUIRED_MESSAGE_VERDICTS: [Verdict; 4] = [
    Verdict::Correct,
    Verdict::PartiallyCorrect,
    Verdict::Incorrect,
    Verdict::JudgeError,
];

const BLANK_ALLOWED_VERDICTS: [Verdict; 3] = [
    Verdict::TimeLimitExceeded,
    Verdict::MemoryLimitExceeded,
    Verdict::RuntimeError,
];

impl GlobalConfig {
    pub fn load(base_path: &Path) -> Result<Self, GraderError> {
        let path = base_path.join("config").join("globalConfig.json");
        let bytes = fs::read(&path).map_err(|e| {
            GraderError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let raw: RawGlobalConfig = serde_json::from_slice(&bytes).map_err(|e| {
            GraderError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })?;

        let mut default_messages = HashMap::new();
        for verdict in REQUIRED_MESSAGE_VERDICTS {
            let key = verdict_message_key(verdict);
            let msg = raw.default_messages.get(key).ok_or_else(|| {
                GraderError::Configuration(format!("default message for {verdict} is required"))
            })?;
            default_messages.insert(verdict, msg.clone());
        }
        for verdict in BLANK_ALLOWED_VERDICTS {
            let key = verdict_message_key(verdict);
            let msg = raw.default_messages.get(key).cloned().unwrap_or_default();
            default_messages.insert(verdict, msg);
        }

        Ok(GlobalConfig {
            lang_config: raw.lang_config,
            default_messages,
            isolate_bin_path: raw.isolate_bin_path,
            listen_port: raw.listen_port,
            update_port: raw.update_port,
            update_host: raw.update_host.unwrap_or_else(|| "127.0.0.1".to_string()),
            box_pool_size: raw.box_pool_size,
            submission_workers: raw.submission_workers,
            grading_workers: raw.grading_workers,
        })
    }

    pub fn language(&self, language_id: &str) -> Option<&LanguageEntry> {
        self.lang_config.iter().find(|l| l.id == language_id)
    }

    pub fn default_message(&self, verdict: Verdict) -> &str {
        self.default_messages
            .get(&verdict)
            .map(|s| s.as_str())
            .unwrap_or_default()
    }

    pub fn sync_base_url(&self) -> String {
        format!("http://{}:{}", self.update_host, self.update_port)
    }
}

fn verdict_message_key(v: Verdict) -> &'static str {
    match v {
        Verdict::Correct => "Correct",
        Verdict::PartiallyCorrect => "PartiallyCorrect",
        Verdict::Incorrect => "Incorrect",
        Verdict::TimeLimitExceeded => "TimeLimitExceeded",
        Verdict::MemoryLimitExceeded => "MemoryLimitExceeded",
        Verdict::RuntimeError => "RuntimeError",
        Verdict::JudgeError => "JudgeError",
        Verdict::Skipped => "Skipped",
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Limits {
    pub time_limit_sec: f64,
    pub memory_limit_mb: i64,
}

impl Limits {
    pub fn memory_limit_kb(&self) -> i64 {
        self.memory_limit_mb * 1024
    }

    fn is_valid(&self) -> bool {
        self.time_limit_sec != 0.0 && self.memory_limit_mb != 0
    }
}

#[derive(Debug, Deserialize)]
struct RawIndexRange {
    start: usize,
    end: usize,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    full_score: f64,
    #[serde(default)]
    dependencies: HashSet<usize>,
    test_indices: RawIndexRange,
}

#[derive(Debug, Deserialize)]
struct RawTaskManifest {
    id: String,
    default_limits: Option<Limits>,
    #[serde(default)]
    limits: HashMap<String, Limits>,
    groups: Vec<RawGroup>,
    #[serde(default)]
    compile_files: HashMap<String, Vec<String>>,
    checker: String,
    grouper: String,
}

/// One test group: a contiguous, 0-based half-open range of test indices plus
/// the groups (also 0-based) it depends on.
///
/// On disk, `test_indices.start` is the 1-based index of the group's first
/// test and `test_indices.end` is the 1-based index of its *last* test
/// (inclusive). Only `start` is decremented on load — `end` is already the
/// correct exclusive bound once reinterpreted in 0-based terms, so leaving it
/// untouched is what makes consecutive groups tile without gaps or overlaps.
#[derive(Debug, Clone)]
pub struct Group {
    pub full_score: f64,
    pub dependencies: HashSet<usize>,
    pub test_range: Range<usize>,
}

pub struct TaskManifest {
    pub id: String,
    pub default_limits: Option<Limits>,
    pub limits: HashMap<String, Limits>,
    pub groups: Vec<Group>,
    pub compile_files: HashMap<String, Vec<String>>,
    pub checker: String,
    pub grouper: String,
    pub task_base_path: PathBuf,
    pub inputs_base_path: PathBuf,
    pub solutions_base_path: PathBuf,
    pub num_tests: usize,
}

impl TaskManifest {
    pub fn load(base_path: &Path, task_id: &str) -> Result<Self, GraderError> {
        let task_base_path = base_path.join("tasks").join(task_id);
        let manifest_path = task_base_path.join("manifest.json");
        let bytes = fs::read(&manifest_path).map_err(|e| {
            GraderError::Configuration(format!("failed to read {}: {e}", manifest_path.display()))
        })?;
        let raw: RawTaskManifest = serde_json::from_slice(&bytes).map_err(|e| {
            GraderError::Configuration(format!(
                "failed to parse {}: {e}",
                manifest_path.display()
            ))
        })?;

        if raw.id != task_id {
            return Err(GraderError::Configuration(format!(
                "manifest id {} does not match requested task {task_id}",
                raw.id
            )));
        }

        let mut groups = Vec::with_capacity(raw.groups.len());
        for g in raw.groups {
            if g.test_indices.start == 0 {
                return Err(GraderError::Configuration(
                    "test_indices.start is 1-based and must be >= 1".into(),
                ));
            }
            groups.push(Group {
                full_score: g.full_score,
                dependencies: g.dependencies.into_iter().map(|d| d - 1).collect(),
                test_range: (g.test_indices.start - 1)..g.test_indices.end,
            });
        }
        for g in &groups {
            for &dep in &g.dependencies {
                if dep >= groups.len() {
                    return Err(GraderError::Configuration(format!(
                        "group dependency {} out of range",
                        dep + 1
                    )));
                }
            }
        }

        let num_tests = groups.iter().map(|g| g.test_range.end).max().unwrap_or(0);

        Ok(TaskManifest {
            id: raw.id,
            default_limits: raw.default_limits,
            limits: raw.limits,
            groups,
            compile_files: raw.compile_files,
            checker: raw.checker,
            grouper: raw.grouper,
            inputs_base_path: task_base_path.join("inputs"),
            solutions_base_path: task_base_path.join("solutions"),
            task_base_path,
            num_tests,
        })
    }

    /// A language is supported iff it has a valid (nonzero) entry in `limits`,
    /// or else `default_limits` is present to fall back on.
    pub fn limits_for(&self, language_id: &str) -> Option<Limits> {
        if let Some(l) = self.limits.get(language_id) {
            if l.is_valid() {
                return Some(*l);
            }
        }
        self.default_limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(start: usize, end: usize, deps: &[usize]) -> RawGroup {
        RawGroup {
            full_score: 50.0,
            dependencies: deps.iter().copied().collect(),
            test_indices: RawIndexRange { start, end },
        }
    }

    #[test]
    fn normalizes_test_indices_and_dependencies() {
        // tests 1-2 then 3-4, second depends on first (1-based on disk).
        let raw = vec![group(1, 2, &[]), group(3, 4, &[1])];
        let groups: Vec<Group> = raw
            .into_iter()
            .map(|g| Group {
                full_score: g.full_score,
                dependencies: g.dependencies.into_iter().map(|d| d - 1).collect(),
                test_range: (g.test_indices.start - 1)..g.test_indices.end,
            })
            .collect();
        assert_eq!(groups[0].test_range, 0..2);
        assert_eq!(groups[1].test_range, 2..4);
        assert_eq!(groups[1].dependencies, HashSet::from([0]));
    }

    #[test]
    fn limits_fall_back_to_default_when_language_entry_is_invalid() {
        let mut limits = HashMap::new();
        limits.insert(
            "cpp".to_string(),
            Limits {
                time_limit_sec: 0.0,
                memory_limit_mb: 0,
            },
        );
        let manifest = TaskManifest {
            id: "t".into(),
            default_limits: Some(Limits {
                time_limit_sec: 2.0,
                memory_limit_mb: 256,
            }),
            limits,
            groups: vec![],
            compile_files: HashMap::new(),
            checker: "custom".into(),
            grouper: "min".into(),
            task_base_path: PathBuf::new(),
            inputs_base_path: PathBuf::new(),
            solutions_base_path: PathBuf::new(),
            num_tests: 0,
        };
        let limit = manifest.limits_for("cpp").unwrap();
        assert_eq!(limit.time_limit_sec, 2.0);
    }

    #[test]
    fn unsupported_language_returns_none() {
        let manifest = TaskManifest {
            id: "t".into(),
            default_limits: None,
            limits: HashMap::new(),
            groups: vec![],
            compile_files: HashMap::new(),
            checker: "custom".into(),
            grouper: "min".into(),
            task_base_path: PathBuf::new(),
            inputs_base_path: PathBuf::new(),
            solutions_base_path: PathBuf::new(),
            num_tests: 0,
        };
        assert!(manifest.limits_for("brainfuck").is_none());
    }
}
