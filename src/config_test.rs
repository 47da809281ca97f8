use super::*;

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__CODESWAMP_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__CODESWAMP_TEST_VALID__", " 99 ") };
    let val: u64 = env_parse("__CODESWAMP_TEST_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__CODESWAMP_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__CODESWAMP_TEST_INVALID__", "lots") };
    let val: u32 = env_parse("__CODESWAMP_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__CODESWAMP_TEST_INVALID__") };
}

#[test]
fn env_string_treats_blank_as_unset() {
    unsafe { std::env::set_var("__CODESWAMP_TEST_BLANK__", "   ") };
    assert_eq!(env_string("__CODESWAMP_TEST_BLANK__"), None);
    unsafe { std::env::remove_var("__CODESWAMP_TEST_BLANK__") };
}

// =============================================================================
// AppConfig
// =============================================================================

/// The only test that touches the real configuration keys.
#[test]
fn from_env_reads_overrides_and_defaults() {
    const KEYS: [&str; 6] = ["PORT", "DATABASE_URL", "TOKEN_TTL_SECS", "LINT_COMMAND", "LINT_LANGUAGES", "LINT_WORKERS"];
    unsafe {
        for key in KEYS {
            std::env::remove_var(key);
        }
        std::env::set_var("PORT", "8080");
        std::env::set_var("TOKEN_TTL_SECS", "60");
        std::env::set_var("LINT_COMMAND", "dupl -t 15 -");
        std::env::set_var("LINT_LANGUAGES", "go, rust");
        std::env::set_var("LINT_WORKERS", "0");
    }

    let cfg = AppConfig::from_env();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.database_url, None);
    assert_eq!(cfg.token_ttl, Duration::from_secs(60));
    assert_eq!(cfg.lint.command.as_deref(), Some("dupl -t 15 -"));
    assert_eq!(cfg.lint.languages, ["go", "rust"]);
    assert_eq!(cfg.lint.workers, 1);

    unsafe {
        std::env::set_var("LINT_COMMAND", "  ");
        std::env::set_var("LINT_LANGUAGES", " ");
    }
    let lint = LintConfig::from_env();
    assert_eq!(lint.command, None);
    assert_eq!(lint.languages, LintConfig::default().languages);

    unsafe {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }
}
