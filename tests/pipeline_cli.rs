use assert_cmd::Command;
use predicates::{
    prelude::PredicateBooleanExt,
    str::{contains, is_match},
};
use std::fs;
use tempfile::tempdir;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/pipewright.rhai");

fn pipewright() -> Command {
    let mut cmd = Command::cargo_bin("pipewright").expect("pipewright binary build failed");
    cmd.env_remove("BROWSER_NAME").env("PIPEWRIGHT_LOG", "off");
    cmd
}

fn pipewright_with_fixture() -> Command {
    let mut cmd = pipewright();
    cmd.args(["--file", FIXTURE]);
    cmd
}

fn running(label: &str, task: &str) -> String {
    format!("Running \"{}\" ({}) task", label, task)
}

fn regex(pattern: &str) -> predicates::str::RegexPredicate {
    is_match(pattern).expect("regex compile")
}

#[test]
fn list_prints_tasks_targets_and_aliases() {
    pipewright_with_fixture()
        .args(["list"])
        .assert()
        .success()
        .stdout(contains("- lint").and(contains("> jsx")))
        .stdout(contains("  - release").and(contains("~ saucelabs")))
        .stdout(regex(r"= build:basic\s+: jsx:release, browserify:basic"));
}

#[test]
fn list_flat_prints_invocable_names() {
    pipewright_with_fixture()
        .args(["list", "--flat"])
        .assert()
        .success()
        .stdout(regex(r"(?m)^jsx:debug\s*$"))
        .stdout(regex(r"webdriver-jasmine:saucelabs\s+saucelabs_\$BROWSER_NAME"))
        .stdout(regex(r"release\s+Lint, build and bump"));
}

#[test]
fn list_single_entry_only() {
    pipewright_with_fixture()
        .args(["list", "browserify"])
        .assert()
        .success()
        .stdout(contains("basic").and(contains("min")))
        .stdout(contains("jsx").not());
}

#[test]
fn list_unknown_name_warns() {
    pipewright_with_fixture()
        .args(["list", "nope"])
        .assert()
        .success()
        .stderr(contains("Task 'nope' does not exist."));
}

#[test]
fn run_alias_expands_steps_in_order() {
    pipewright_with_fixture()
        .args(["run", "build:basic"])
        .assert()
        .success()
        .stdout(regex(&format!(
            r"(?s){}.*\[jsx\] release mode=release.*{}.*\[browserify\] basic -> build/bundle.js.*Done, without errors\.",
            regex_escape(&running("jsx:release", "jsx")),
            regex_escape(&running("browserify:basic", "browserify")),
        )));
}

#[test]
fn nested_alias_runs_every_leaf_step() {
    pipewright_with_fixture()
        .args(["build"])
        .assert()
        .success()
        .stdout(regex(
            r"(?s)browserify\] basic.*jsx\] release mode=release.*browserify\] min",
        ));
}

#[test]
fn bare_multi_task_runs_all_targets_in_declaration_order() {
    pipewright_with_fixture()
        .args(["run", "jsx"])
        .assert()
        .success()
        .stdout(regex(
            r"(?s)\[jsx\] debug mode=debug.*\[jsx\] release mode=release.*\[jsx\] test mode=test",
        ));
}

#[test]
fn several_names_run_in_command_line_order() {
    pipewright_with_fixture()
        .args(["run", "version-check", "lint"])
        .assert()
        .success()
        .stdout(regex(r"(?s)\[version-check\] ok.*\[lint\] sources clean"));
}

#[test]
fn no_arguments_runs_default_task() {
    pipewright_with_fixture()
        .assert()
        .success()
        .stdout(contains(running("browserify:min", "browserify")))
        .stdout(contains("Done, without errors."));
}

#[test]
fn derived_target_reads_env_override() {
    pipewright_with_fixture()
        .args(["-e", "BROWSER_NAME=chrome", "test:saucelabs"])
        .assert()
        .success()
        .stdout(contains("[jsx] test mode=test"))
        .stdout(contains(running(
            "webdriver-jasmine:saucelabs_chrome",
            "webdriver-jasmine",
        )))
        .stdout(contains("browser=chrome"));
}

#[test]
fn derived_target_reads_process_env() {
    pipewright_with_fixture()
        .env("BROWSER_NAME", "chrome")
        .args(["webdriver-jasmine:saucelabs"])
        .assert()
        .success()
        .stdout(contains("[webdriver-jasmine] saucelabs_chrome browser=chrome"));
}

#[test]
fn derived_target_falls_back_when_unset_or_empty() {
    pipewright_with_fixture()
        .args(["webdriver-jasmine:saucelabs"])
        .assert()
        .success()
        .stdout(contains("saucelabs_ie8 browser=internet explorer 8"));

    pipewright_with_fixture()
        .env("BROWSER_NAME", "")
        .args(["webdriver-jasmine:saucelabs"])
        .assert()
        .success()
        .stdout(contains("saucelabs_ie8"));
}

#[test]
fn derived_target_to_undeclared_target_is_rejected() {
    pipewright_with_fixture()
        .args(["-e", "BROWSER_NAME=safari", "test:saucelabs"])
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("saucelabs_safari")))
        .stdout(contains("[jsx]").not());
}

#[test]
fn failing_step_stops_pipeline() {
    pipewright_with_fixture()
        .args(["fails-midway"])
        .assert()
        .failure()
        .stdout(contains("[lint] sources clean").and(contains("[broken] running")))
        .stdout(contains("[version-check]").not())
        .stdout(contains("Done, without errors.").not())
        .stderr(contains("error: step 2 'broken' failed: task body returned false"));
}

#[test]
fn thrown_error_fails_step() {
    pipewright_with_fixture()
        .args(["lint", "explode", "version-check"])
        .assert()
        .failure()
        .stdout(contains("[version-check]").not())
        .stderr(contains("step 2 'explode' failed").and(contains("kaboom")));
}

#[test]
fn unknown_name_is_rejected_before_anything_runs() {
    pipewright_with_fixture()
        .args(["dangling"])
        .assert()
        .failure()
        .stdout(contains("[lint]").not())
        .stderr(contains("error: Task 'nope' does not exist."));
}

#[test]
fn unknown_target_is_rejected() {
    pipewright_with_fixture()
        .args(["jsx:prod"])
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("prod")));
}

#[test]
fn cyclic_alias_is_rejected() {
    pipewright_with_fixture()
        .args(["loop:a"])
        .assert()
        .failure()
        .stderr(contains("Cyclic alias reference: loop:a -> loop:b -> loop:a"));
}

#[test]
fn task_without_actions_is_rejected_at_plan_time() {
    pipewright_with_fixture()
        .args(["lint", "no-actions"])
        .assert()
        .failure()
        .stdout(contains("[lint]").not())
        .stderr(contains("Task 'no-actions' has no actions() registered."));
}

#[test]
fn async_task_waits_for_child_process() {
    pipewright_with_fixture()
        .args(["gem:only", "lint"])
        .assert()
        .success()
        .stdout(regex(r"(?s)\[gem\] built.*\[lint\] sources clean"));
}

#[test]
fn async_task_signaled_inline_succeeds() {
    pipewright_with_fixture()
        .args(["async-ok"])
        .assert()
        .success()
        .stdout(contains("[async-ok] waiting").and(contains("Done, without errors.")));
}

#[test]
fn async_failure_reason_is_reported() {
    pipewright_with_fixture()
        .args(["async-fail", "lint"])
        .assert()
        .failure()
        .stdout(contains("[lint]").not())
        .stderr(contains("step 1 'async-fail' failed: remote build broke"));
}

#[test]
fn async_child_failure_fails_step() {
    pipewright_with_fixture()
        .args(["async-exit", "lint"])
        .assert()
        .failure()
        .stdout(contains("[lint]").not())
        .stderr(contains("step 1 'async-exit' failed"));
}

#[test]
fn async_body_return_value_does_not_decide_outcome() {
    pipewright_with_fixture()
        .args(["async-ends-false", "lint"])
        .assert()
        .success()
        .stdout(contains("[lint] sources clean").and(contains("Done, without errors.")));
}

#[test]
fn dropped_completion_handle_fails_instead_of_hanging() {
    pipewright_with_fixture()
        .args(["async-dropped"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(contains("completion handle was dropped"));
}

#[test]
fn check_reports_broken_definitions() {
    pipewright_with_fixture()
        .args(["check"])
        .assert()
        .failure()
        .stderr(contains("loop:a: Cyclic alias reference"))
        .stderr(contains("dangling: Task 'nope' does not exist."))
        .stderr(contains("build:basic").not());
}

#[test]
fn complete_tasks_filters_by_prefix() {
    pipewright_with_fixture()
        .args(["complete-tasks", "build"])
        .assert()
        .success()
        .stdout(regex(r"(?m)^build$"))
        .stdout(regex(r"(?m)^build:basic$"))
        .stdout(regex(r"(?m)^browserify").not());
}

#[test]
fn completions_bash_includes_dynamic_helper() {
    pipewright()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(contains("__pipewright_dynamic_tasks"));
}

#[test]
fn script_is_found_in_parent_directory() {
    let temp = tempdir().expect("create temp dir");
    let root = temp.path();
    fs::write(
        root.join("pipewright.rhai"),
        r#"task("hello", || { actions(|| { print("[hello] from parent"); }); });"#,
    )
    .expect("write script");
    let nested = root.join("a").join("b");
    fs::create_dir_all(&nested).expect("create nested dir");

    pipewright()
        .current_dir(&nested)
        .args(["hello"])
        .assert()
        .success()
        .stdout(contains("[hello] from parent"));
}

#[test]
fn duplicate_names_warn_and_last_definition_wins() {
    let temp = tempdir().expect("create temp dir");
    let script = temp.path().join("pipewright.rhai");
    fs::write(
        &script,
        r#"
        task("build", || { actions(|| { print("[build] first"); }); });
        alias("build", ["lint"]);
        task("lint", || { actions(|| { print("[lint] second"); }); });
        "#,
    )
    .expect("write script");

    pipewright()
        .current_dir(temp.path())
        .args(["build"])
        .assert()
        .success()
        .stdout(contains("[lint] second"))
        .stdout(contains("[build] first").not());

    pipewright()
        .current_dir(temp.path())
        .args(["list"])
        .assert()
        .success()
        .stderr(contains("'build' was registered more than once"));
}

#[test]
fn strict_mode_rejects_duplicate_names() {
    let temp = tempdir().expect("create temp dir");
    let script = temp.path().join("pipewright.rhai");
    fs::write(
        &script,
        r#"
        task("lint", || { actions(|| { print("[lint] first"); }); });
        task("lint", || { actions(|| { print("[lint] second"); }); });
        "#,
    )
    .expect("write script");

    pipewright()
        .current_dir(temp.path())
        .args(["--strict", "lint"])
        .assert()
        .failure()
        .stderr(contains("'lint' is already defined."));
}

#[test]
fn missing_script_is_reported() {
    let temp = tempdir().expect("create temp dir");
    pipewright()
        .current_dir(temp.path())
        .args(["--file", "absent.rhai", "list"])
        .assert()
        .failure()
        .stderr(contains("Unable to locate script file"));
}

fn regex_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if "\\.+*?()|[]{}^$".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
