use std::fs;

use grader::config::{GlobalConfig, TaskManifest};

fn write_global_config(dir: &std::path::Path) {
    let config_dir = dir.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("globalConfig.json"),
        r#"{
            "lang_config": [{"id": "cpp", "extension": "cpp"}],
            "default_messages": {
                "Correct": "Accepted",
                "PartiallyCorrect": "Partially Accepted",
                "Incorrect": "Wrong Answer",
                "JudgeError": "Internal Judge Error"
            },
            "isolate_bin_path": "/usr/bin/isolate",
            "listen_port": 8080,
            "update_port": 8081,
            "box_pool_size": 2,
            "submission_workers": 1,
            "grading_workers": 1
        }"#,
    )
    .unwrap();
}

fn write_task_manifest(dir: &std::path::Path, task_id: &str, body: &str) {
    let task_dir = dir.join("tasks").join(task_id);
    fs::create_dir_all(&task_dir).unwrap();
    fs::write(task_dir.join("manifest.json"), body).unwrap();
}

#[test]
fn global_config_requires_the_four_core_default_messages() {
    let tmp = tempfile::tempdir().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("globalConfig.json"),
        r#"{
            "lang_config": [],
            "default_messages": {"Correct": "Accepted"},
            "isolate_bin_path": "/usr/bin/isolate",
            "listen_port": 8080,
            "update_port": 8081
        }"#,
    )
    .unwrap();

    let err = GlobalConfig::load(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("default message"));
}

#[test]
fn global_config_blanks_optional_messages_when_absent() {
    let tmp = tempfile::tempdir().unwrap();
    write_global_config(tmp.path());

    let config = GlobalConfig::load(tmp.path()).unwrap();
    assert_eq!(
        config.default_message(grader::types::Verdict::TimeLimitExceeded),
        ""
    );
    assert_eq!(
        config.default_message(grader::types::Verdict::Correct),
        "Accepted"
    );
    assert_eq!(config.box_pool_size, 2);
}

#[test]
fn task_manifest_rejects_id_mismatch() {
    let tmp = tempfile::tempdir().unwrap();
    write_task_manifest(
        tmp.path(),
        "task-a",
        r#"{
            "id": "task-b",
            "groups": [],
            "checker": "custom",
            "grouper": "min"
        }"#,
    );

    let err = TaskManifest::load(tmp.path(), "task-a").unwrap_err();
    assert!(err.to_string().contains("does not match"));
}

#[test]
fn task_manifest_loads_groups_with_normalized_ranges() {
    let tmp = tempfile::tempdir().unwrap();
    write_task_manifest(
        tmp.path(),
        "sum",
        r#"{
            "id": "sum",
            "default_limits": {"time_limit_sec": 1.0, "memory_limit_mb": 256},
            "groups": [
                {"full_score": 40.0, "dependencies": [], "test_indices": {"start": 1, "end": 2}},
                {"full_score": 60.0, "dependencies": [1], "test_indices": {"start": 3, "end": 4}}
            ],
            "checker": "custom",
            "grouper": "min"
        }"#,
    );

    let manifest = TaskManifest::load(tmp.path(), "sum").unwrap();
    assert_eq!(manifest.num_tests, 4);
    assert_eq!(manifest.groups[0].test_range, 0..2);
    assert_eq!(manifest.groups[1].test_range, 2..4);
    assert!(manifest.groups[1].dependencies.contains(&0));
}

#[test]
fn task_manifest_rejects_out_of_range_dependency() {
    let tmp = tempfile::tempdir().unwrap();
    write_task_manifest(
        tmp.path(),
        "sum",
        r#"{
            "id": "sum",
            "groups": [
                {"full_score": 100.0, "dependencies": [2], "test_indices": {"start": 1, "end": 2}}
            ],
            "checker": "custom",
            "grouper": "min"
        }"#,
    );

    assert!(TaskManifest::load(tmp.path(), "sum").is_err());
}
