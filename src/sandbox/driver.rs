use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, ensure, Context};

use super::meta;

/// Whether the sandboxed program talks to isolate's stdin/stdout redirection
/// directly (`Runner`, via a staged runner script) or opens `input`/`output`
/// files in its working directory itself (`Program`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    Program,
    Runner,
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub isolate_bin_path: PathBuf,
    pub box_id: u32,
    pub user_binary_path: PathBuf,
    pub runner_script_path: Option<PathBuf>,
    pub io_mode: IoMode,
    pub meta_log_path: PathBuf,
    pub time_limit_sec: f64,
    pub extra_time_sec: f64,
    pub memory_limit_kb: i64,
    pub input_path: PathBuf,
    pub output_target_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Ok { time_ms: i64, memory_kb: i64 },
    TimeLimitExceeded { time_ms: i64, memory_kb: i64 },
    MemoryLimitExceeded { time_ms: i64, memory_kb: i64 },
    RuntimeError { time_ms: i64, memory_kb: i64 },
    JudgeError,
}

/// One `isolate` box lifecycle: `init` stages the box, `run` executes the
/// program and classifies the result, `cleanup` tears the box down. `execute`
/// drives all three and guarantees cleanup runs on every path, including
/// init failure — callers should prefer it over calling the phases by hand.
pub struct SandboxDriver {
    config: SandboxConfig,
    box_dir: Option<PathBuf>,
}

impl SandboxDriver {
    pub fn new(config: SandboxConfig) -> Self {
        SandboxDriver {
            config,
            box_dir: None,
        }
    }

    pub fn execute(mut self) -> RunOutcome {
        if let Err(e) = self.init() {
            log::error!("sandbox box {} failed to init: {e}", self.config.box_id);
            self.cleanup();
            return RunOutcome::JudgeError;
        }
        let outcome = match self.run() {
            Ok(o) => o,
            Err(e) => {
                log::error!("sandbox box {} failed to run: {e}", self.config.box_id);
                RunOutcome::JudgeError
            }
        };
        self.cleanup();
        outcome
    }

    fn init(&mut self) -> anyhow::Result<()> {
        ensure_root()?;

        let output = Command::new(&self.config.isolate_bin_path)
            .args(["--cg", "-b"])
            .arg(self.config.box_id.to_string())
            .arg("--init")
            .output()
            .context("failed to spawn isolate --init")?;
        ensure!(
            output.status.success(),
            "isolate --init exited with non-zero status"
        );
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        ensure!(!root.is_empty(), "isolate --init produced no box root path");
        let box_dir = PathBuf::from(root).join("box");

        fs::copy(&self.config.input_path, box_dir.join("input"))
            .context("failed to stage input file")?;
        fs::copy(&self.config.user_binary_path, box_dir.join("program"))
            .context("failed to stage user binary")?;
        if let Some(runner) = &self.config.runner_script_path {
            let target = box_dir.join(runner_file_name(runner));
            fs::copy(runner, &target).context("failed to stage runner script")?;
            let mut perms = fs::metadata(&target)
                .context("failed to stat runner script")?
                .permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&target, perms)
                .context("failed to mark runner script executable")?;
        }

        self.box_dir = Some(box_dir);
        Ok(())
    }

    fn run(&self) -> anyhow::Result<RunOutcome> {
        let Some(box_dir) = self.box_dir.as_ref() else {
            bail!("run called before init");
        };

        let args = self.build_run_args();
        let status = Command::new(&self.config.isolate_bin_path)
            .args(&args)
            .status()
            .context("failed to spawn isolate --run")?;
        let exit_success = status.success();

        let meta_content = match fs::read_to_string(&self.config.meta_log_path) {
            Ok(c) => c,
            Err(_) => return Ok(RunOutcome::JudgeError),
        };
        let parsed = match meta::parse_meta_log(&meta_content) {
            Ok(m) => m,
            Err(_) => return Ok(RunOutcome::JudgeError),
        };
        let has_cgroup = parsed.contains_key("cg-mem");

        Ok(
            match meta::classify(&parsed, exit_success, self.config.memory_limit_kb, has_cgroup) {
                meta::ClassifiedOutcome::JudgeError => RunOutcome::JudgeError,
                meta::ClassifiedOutcome::Ok { time_ms, memory_kb } => {
                    let produced = box_dir.join("output");
                    if fs::copy(&produced, &self.config.output_target_path).is_err() {
                        RunOutcome::JudgeError
                    } else {
                        RunOutcome::Ok { time_ms, memory_kb }
                    }
                }
                meta::ClassifiedOutcome::Tle { time_ms, memory_kb } => {
                    RunOutcome::TimeLimitExceeded { time_ms, memory_kb }
                }
                meta::ClassifiedOutcome::Mle { time_ms, memory_kb } => {
                    RunOutcome::MemoryLimitExceeded { time_ms, memory_kb }
                }
                meta::ClassifiedOutcome::Re { time_ms, memory_kb } => {
                    RunOutcome::RuntimeError { time_ms, memory_kb }
                }
            },
        )
    }

    fn cleanup(&mut self) {
        let _ = fs::remove_file(&self.config.meta_log_path);
        let result = Command::new(&self.config.isolate_bin_path)
            .args(["--cg", "-b"])
            .arg(self.config.box_id.to_string())
            .arg("--cleanup")
            .output();
        match result {
            Ok(o) if o.status.success() => {
                log::debug!("sandbox box {} cleaned up", self.config.box_id)
            }
            _ => log::error!("sandbox box {} failed to clean up", self.config.box_id),
        }
        self.box_dir = None;
    }

    fn build_run_args(&self) -> Vec<String> {
        let mut args = vec![
            "--cg".to_string(),
            "--cg-timing".to_string(),
            "--processes=128".to_string(),
            "-b".to_string(),
            self.config.box_id.to_string(),
            "-M".to_string(),
            self.config.meta_log_path.to_string_lossy().into_owned(),
        ];

        args.push("-t".to_string());
        args.push(format!("{:.3}", self.config.time_limit_sec));
        args.push(format!("--cg-mem={}", self.config.memory_limit_kb));
        args.push("-w".to_string());
        args.push(format!("{:.3}", self.config.time_limit_sec + 5.0));
        args.push("-x".to_string());
        args.push(format!("{:.3}", self.config.extra_time_sec));

        if self.config.io_mode == IoMode::Runner {
            args.push("-i".to_string());
            args.push("input".to_string());
            args.push("-o".to_string());
            args.push("output".to_string());
        }

        if Path::new("/etc/alternatives").exists() {
            args.push("--dir=/etc/alternatives".to_string());
        }

        args.push("--run".to_string());
        args.push("--".to_string());
        args.push(match (self.config.io_mode, &self.config.runner_script_path) {
            (IoMode::Runner, Some(runner)) => format!("./{}", runner_file_name(runner)),
            _ => "./program".to_string(),
        });
        args
    }
}

fn runner_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "runner".to_string())
}

fn ensure_root() -> anyhow::Result<()> {
    let uid = unsafe { libc::geteuid() };
    ensure!(
        uid == 0,
        "isolate requires the grading engine to run as root"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> SandboxConfig {
        SandboxConfig {
            isolate_bin_path: PathBuf::from("/usr/bin/isolate"),
            box_id: 0,
            user_binary_path: PathBuf::from("/tmp/prog"),
            runner_script_path: None,
            io_mode: IoMode::Program,
            meta_log_path: PathBuf::from("/tmp/meta"),
            time_limit_sec: 1.0,
            extra_time_sec: 0.5,
            memory_limit_kb: 65536,
            input_path: PathBuf::from("/tmp/in"),
            output_target_path: PathBuf::from("/tmp/out"),
        }
    }

    #[test]
    fn run_args_omit_io_flags_in_program_mode() {
        let driver = SandboxDriver::new(base_config());
        let args = driver.build_run_args();
        assert!(!args.iter().any(|a| a == "-i"));
        assert!(args.contains(&"./program".to_string()));
    }

    #[test]
    fn run_args_include_io_flags_in_runner_mode() {
        let mut config = base_config();
        config.io_mode = IoMode::Runner;
        config.runner_script_path = Some(PathBuf::from("/tmp/runner.sh"));
        let driver = SandboxDriver::new(config);
        let args = driver.build_run_args();
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"./runner.sh".to_string()));
    }

    #[test]
    fn wall_clock_limit_is_time_limit_plus_five() {
        let driver = SandboxDriver::new(base_config());
        let args = driver.build_run_args();
        let w_index = args.iter().position(|a| a == "-w").unwrap();
        assert_eq!(args[w_index + 1], "6.000");
    }
}
