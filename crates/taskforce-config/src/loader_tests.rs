use super::*;
use crate::schema::PromptPattern;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_empty_config() {
    let config = ConfigLoader::load_str("").unwrap();
    assert_eq!(config.scheduler.max_parallel_requests, 4);
    assert!(config.subagents.enabled);
}

#[test]
fn test_load_scheduler_section() {
    let content = r#"
        [scheduler]
        max_parallel_requests = 8
        initial_parallel_requests = 2
        min_interval_between_start_ms = 50
        start_jitter_ms = 0

        [scheduler.keys.claude-opus]
        max_parallel_requests = 2
    "#;
    let config = ConfigLoader::load_str(content).unwrap();
    assert_eq!(config.scheduler.max_parallel_requests, 8);
    assert_eq!(config.scheduler.initial_parallel_requests, Some(2));
    assert_eq!(config.scheduler.min_interval_between_start_ms, 50);

    let opus = config.scheduler.settings_for("claude-opus");
    assert_eq!(opus.max_parallel_requests, 2);
    assert_eq!(opus.initial_parallel_requests, 2);
    assert_eq!(opus.min_interval_between_start_ms, 50);
}

#[test]
fn test_load_subagents_section() {
    let content = r#"
        [subagents]
        max_agents = 6
        max_depth = 2
        model = "small-model"
        prompt_pattern = "orchestrator"
        inherit_filesystem_tool = false
    "#;
    let config = ConfigLoader::load_str(content).unwrap();
    assert_eq!(config.subagents.max_agents, 6);
    assert_eq!(config.subagents.max_depth, 2);
    assert_eq!(config.subagents.model.as_deref(), Some("small-model"));
    assert_eq!(config.subagents.prompt_pattern, PromptPattern::Orchestrator);
    assert!(!config.subagents.inherit_filesystem_tool);
    assert!(config.subagents.inherit_tools);
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[retry]").unwrap();
    writeln!(file, "base_delay_ms = 10").unwrap();

    let config = ConfigLoader::load(file.path()).unwrap();
    assert_eq!(config.retry.base_delay_ms, 10);
}

#[test]
fn test_load_nonexistent_file() {
    let result = ConfigLoader::load(Path::new("/nonexistent/path/taskforce.toml"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_load_or_default_missing_file() {
    let config =
        ConfigLoader::load_or_default(Path::new("/nonexistent/path/taskforce.toml")).unwrap();
    assert_eq!(config.retry.max_delay_ms, 30_000);
}

#[test]
fn test_load_invalid_toml() {
    let result = ConfigLoader::load_str("invalid = [unclosed");
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_expand_env_vars() {
    // SAFETY: test-only variable with a unique name
    unsafe {
        std::env::set_var("TASKFORCE_TEST_MODEL", "env-model");
    }
    let content = "[subagents]\nmodel = \"${TASKFORCE_TEST_MODEL}\"";
    let config = ConfigLoader::load_str(content).unwrap();
    assert_eq!(config.subagents.model.as_deref(), Some("env-model"));
    unsafe {
        std::env::remove_var("TASKFORCE_TEST_MODEL");
    }
}

#[test]
fn test_expand_env_vars_not_set() {
    let content = "value = \"${NONEXISTENT_TASKFORCE_VAR_12345}\"";
    let result = ConfigLoader::expand_env_vars(content);
    assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
}

#[test]
fn test_expand_path_with_tilde() {
    let expanded = ConfigLoader::expand_path("~/logs");
    assert!(!expanded.to_string_lossy().starts_with('~'));
    assert!(expanded.ends_with("logs"));
}
