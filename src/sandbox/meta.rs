use std::collections::HashMap;

/// Parses an isolate meta-log (`key:value` lines) into a map. A line with no
/// `:` is malformed and the whole log is rejected — the caller treats that as
/// a judge error rather than guessing at partial data.
pub fn parse_meta_log(content: &str) -> Result<HashMap<String, String>, ()> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((k, v)) => {
                map.insert(k.to_string(), v.to_string());
            }
            None => return Err(()),
        }
    }
    Ok(map)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifiedOutcome {
    JudgeError,
    Ok { time_ms: i64, memory_kb: i64 },
    Tle { time_ms: i64, memory_kb: i64 },
    Mle { time_ms: i64, memory_kb: i64 },
    Re { time_ms: i64, memory_kb: i64 },
}

/// Classifies one run from its meta-log and isolate exit status, per the
/// four-step algorithm: XX first, then required-field extraction, then exit
/// status, then signal/memory/status-based disambiguation of failures.
pub fn classify(
    meta: &HashMap<String, String>,
    exit_success: bool,
    memory_limit_kb: i64,
    has_cgroup: bool,
) -> ClassifiedOutcome {
    if meta.get("status").map(|s| s.as_str()) == Some("XX") {
        return ClassifiedOutcome::JudgeError;
    }

    let mem_key = if has_cgroup { "cg-mem" } else { "max-rss" };
    let memory_kb = match meta.get(mem_key).and_then(|v| v.parse::<i64>().ok()) {
        Some(m) => m,
        None => return ClassifiedOutcome::JudgeError,
    };
    let time_sec = match meta.get("time").and_then(|v| v.parse::<f64>().ok()) {
        Some(t) => t,
        None => return ClassifiedOutcome::JudgeError,
    };
    if !meta.contains_key("time-wall") {
        return ClassifiedOutcome::JudgeError;
    }
    let time_ms = (time_sec * 1000.0).round() as i64;

    if exit_success {
        return ClassifiedOutcome::Ok { time_ms, memory_kb };
    }

    let killed = meta.get("killed").map(|s| s.as_str()) == Some("1");
    if killed && memory_kb > memory_limit_kb {
        return ClassifiedOutcome::Mle { time_ms, memory_kb };
    }

    let status = meta.get("status").map(|s| s.as_str()).unwrap_or("");
    let has_signal = meta.contains_key("exitsig") || status == "SG" || status == "RE";
    if has_signal {
        return ClassifiedOutcome::Re { time_ms, memory_kb };
    }

    if status == "TO" {
        return ClassifiedOutcome::Tle { time_ms, memory_kb };
    }

    ClassifiedOutcome::JudgeError
}
