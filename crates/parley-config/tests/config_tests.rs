#[cfg(test)]
mod tests {
    use parley_config::ConfigLoader;
    use parley_config::loader::apply_env_overrides;
    use parley_config::schema::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_parley_config_defaults() {
        let config = ParleyConfig::default();
        assert_eq!(config.agent.model, "gemini-2.0-flash");
        assert_eq!(config.agent.max_tool_rounds, 5);
        assert_eq!(config.agent.completion_timeout_secs, 60);
        assert_eq!(config.agent.tool_timeout_secs, 30);
        assert!(config.agent.temperature.is_none());
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "127.0.0.1:3000");
        assert!(config.web_ui);
        assert!(config.cors);
        assert_eq!(config.body_limit_mb, 50);
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[agent]
model = "gemini-1.5-pro"
max_tool_rounds = 3

[telegram]
enabled = false
"#;
        let config: ParleyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agent.model, "gemini-1.5-pro");
        assert_eq!(config.agent.max_tool_rounds, 3);
        assert!(!config.telegram.enabled);
        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert_eq!(config.agent.tool_timeout_secs, 30);
    }

    #[test]
    fn test_agent_section_keys() {
        let mut config = ParleyConfig::default();
        config.agent.system_prompt = Some("be brief".into());
        config.agent.temperature = Some(0.5);
        let value = toml::Value::try_from(&config).unwrap();
        let mut keys: Vec<&str> = value["agent"]
            .as_table()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "base_url",
                "completion_timeout_secs",
                "max_tool_rounds",
                "model",
                "system_prompt",
                "temperature",
                "tool_timeout_secs",
            ]
        );
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = ParleyConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: ParleyConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.agent.model, config.agent.model);
        assert_eq!(restored.server.listen, config.server.listen);
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_default_config_is_valid() {
        let warnings = ParleyConfig::default().validate().unwrap();
        assert!(warnings.iter().all(|w| w.severity != WarningSeverity::Error));
        assert!(warnings.iter().any(|w| w.field == "services.gemini_api_key"));
    }

    #[test]
    fn test_zero_rounds_is_error() {
        let mut config = ParleyConfig::default();
        config.agent.max_tool_rounds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("agent.max_tool_rounds"));
    }

    #[test]
    fn test_temperature_out_of_range_is_error() {
        let mut config = ParleyConfig::default();
        config.agent.temperature = Some(3.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_model_is_error() {
        let mut config = ParleyConfig::default();
        config.agent.model = "  ".into();
        assert!(config.validate().unwrap_err().contains("agent.model"));
    }

    #[test]
    fn test_unknown_log_format_is_warning() {
        let mut config = ParleyConfig::default();
        config.logging.format = "xml".into();
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "logging.format"));
    }

    #[test]
    fn test_warning_display_has_hint() {
        let w = ConfigWarning {
            field: "telegram.token".into(),
            message: "missing".into(),
            severity: WarningSeverity::Warning,
            hint: Some("set it".into()),
        };
        let s = w.to_string();
        assert!(s.contains("telegram.token: missing"));
        assert!(s.contains("↳ set it"));
    }

    #[test]
    fn test_telegram_token_respects_enabled() {
        let mut config = ParleyConfig::default();
        config.telegram.token = Some("123:abc".into());
        assert_eq!(config.telegram_token(), Some("123:abc"));
        config.telegram.enabled = false;
        assert_eq!(config.telegram_token(), None);
    }

    // ── Env override tests ─────────────────────────────────────

    #[test]
    fn test_env_fills_missing_keys() {
        let config = apply_env_overrides(
            ParleyConfig::default(),
            env_of(&[
                ("GEMINI_API_KEY", "g-key"),
                ("TELEGRAM_BOT_TOKEN", "t-token"),
                ("GOOGLE_CSE_ID", "cx"),
            ]),
        );
        assert_eq!(config.services.gemini_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.telegram.token.as_deref(), Some("t-token"));
        assert_eq!(config.services.google_cse_id.as_deref(), Some("cx"));
        assert!(config.services.cloudinary_api_key.is_none());
    }

    #[test]
    fn test_file_key_wins_over_env() {
        let mut config = ParleyConfig::default();
        config.services.gemini_api_key = Some("from-file".into());
        let config = apply_env_overrides(config, env_of(&[("GEMINI_API_KEY", "from-env")]));
        assert_eq!(config.services.gemini_api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_port_and_listen_overrides() {
        let config = apply_env_overrides(ParleyConfig::default(), env_of(&[("PORT", "8080")]));
        assert_eq!(config.server.listen, "0.0.0.0:8080");

        let config = apply_env_overrides(
            ParleyConfig::default(),
            env_of(&[("PORT", "8080"), ("PARLEY_SERVER_LISTEN", "127.0.0.1:9000")]),
        );
        assert_eq!(config.server.listen, "127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_numeric_env_is_ignored() {
        let config = apply_env_overrides(
            ParleyConfig::default(),
            env_of(&[("PORT", "not-a-port"), ("PARLEY_MAX_TOOL_ROUNDS", "many")]),
        );
        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert_eq!(config.agent.max_tool_rounds, 5);
    }

    // ── Loader tests ───────────────────────────────────────────

    #[test]
    fn test_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let loader = ConfigLoader::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(loader.get().agent.model, "gemini-2.0-flash");
        assert_eq!(loader.path(), path.as_path());
    }

    #[test]
    fn test_loader_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[agent]\nmax_tool_rounds = 2\n\n[server]\nlisten = \"127.0.0.1:4000\""
        )
        .unwrap();
        let loader = ConfigLoader::load_with_env(Some(file.path()), no_env).unwrap();
        let config = loader.get();
        assert_eq!(config.agent.max_tool_rounds, 2);
        assert_eq!(config.server.listen, "127.0.0.1:4000");
    }

    #[test]
    fn test_loader_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent\nmodel = ").unwrap();
        assert!(ConfigLoader::load_with_env(Some(file.path()), no_env).is_err());
    }

    #[test]
    fn test_loader_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_tool_rounds = 0").unwrap();
        let err = ConfigLoader::load_with_env(Some(file.path()), no_env).err().unwrap();
        assert!(err.to_string().contains("max_tool_rounds"));
    }

    #[test]
    fn test_loader_reads_file_and_keeps_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.toml");
        std::fs::write(&path, "[agent]\nmax_tool_rounds = 2\n").unwrap();
        let loader = ConfigLoader::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(loader.get().agent.max_tool_rounds, 2);
        assert_eq!(loader.path(), path.as_path());
    }
}
