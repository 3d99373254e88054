use super::*;

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__STORYBOARD_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__STORYBOARD_TEST_VALID__", "99") };
    let val: usize = env_parse("__STORYBOARD_TEST_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__STORYBOARD_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__STORYBOARD_TEST_INVALID__", "notanumber") };
    let val: u64 = env_parse("__STORYBOARD_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__STORYBOARD_TEST_INVALID__") };
}

#[test]
fn env_string_treats_blank_as_missing() {
    unsafe { std::env::set_var("__STORYBOARD_TEST_BLANK__", "   ") };
    assert_eq!(env_string("__STORYBOARD_TEST_BLANK__"), None);
    unsafe { std::env::remove_var("__STORYBOARD_TEST_BLANK__") };
}

#[test]
fn session_config_defaults_match_constants() {
    let cfg = SessionConfig::default();
    assert_eq!(cfg.mailbox_capacity, DEFAULT_SESSION_MAILBOX_CAPACITY);
    assert_eq!(cfg.transform_debounce, Duration::from_millis(DEFAULT_TRANSFORM_DEBOUNCE_MS));
    assert_eq!(cfg.playback_max_step, Duration::from_millis(DEFAULT_PLAYBACK_MAX_STEP_MS));
}
