// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

use super::*;

// Env-var substitution mutates process state; serialize these tests.

#[test]
#[serial_test::serial(hook_env)]
fn substitutes_a_single_var() {
    std::env::set_var("HOOK_TEST_TOKEN", "s3cret");
    assert_eq!(
        substitute_env_vars("Bearer ${HOOK_TEST_TOKEN}"),
        "Bearer s3cret"
    );
    std::env::remove_var("HOOK_TEST_TOKEN");
}

#[test]
#[serial_test::serial(hook_env)]
fn substitutes_multiple_vars_per_value() {
    std::env::set_var("HOOK_TEST_A", "one");
    std::env::set_var("HOOK_TEST_B", "two");
    assert_eq!(
        substitute_env_vars("${HOOK_TEST_A}-${HOOK_TEST_B}-${HOOK_TEST_A}"),
        "one-two-one"
    );
    std::env::remove_var("HOOK_TEST_A");
    std::env::remove_var("HOOK_TEST_B");
}

#[test]
#[serial_test::serial(hook_env)]
fn missing_var_becomes_empty_string() {
    std::env::remove_var("HOOK_TEST_MISSING");
    assert_eq!(substitute_env_vars("x${HOOK_TEST_MISSING}y"), "xy");
}

#[test]
fn no_placeholders_passes_through() {
    assert_eq!(substitute_env_vars("plain value"), "plain value");
}

#[test]
fn unterminated_placeholder_is_left_alone() {
    assert_eq!(substitute_env_vars("broken ${OOPS"), "broken ${OOPS");
}

#[test]
fn empty_value() {
    assert_eq!(substitute_env_vars(""), "");
}
