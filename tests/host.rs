use std::{fs, rc::Rc};

use jshost::{
    config::MAX_CALL_DEPTH_LIMIT, value::ValueKind, FaultKind, HostConfig, SharedBuffer, State,
    Status,
};
use tempfile::tempdir;

struct Session {
    state: State,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
}

fn session() -> Session {
    session_with(|config| config)
}

fn session_with(configure: impl FnOnce(HostConfig) -> HostConfig) -> Session {
    let stdout = SharedBuffer::new();
    let stderr = SharedBuffer::new();
    let config = configure(HostConfig::captured(stdout.clone(), stderr.clone()));
    Session {
        state: State::with_config(config),
        stdout,
        stderr,
    }
}

fn run_output(source: &str) -> String {
    let mut session = session();
    let status = session.state.run_from_string(source);
    assert_eq!(
        status,
        Status::Success,
        "run failed: {}",
        session.stderr.contents()
    );
    session.stdout.take()
}

#[test]
fn print_joins_arguments_with_spaces() {
    assert_eq!(run_output(r#"print("a", "b")"#), "a b\n");
}

#[test]
fn print_without_arguments_emits_newline() {
    assert_eq!(run_output("print()"), "\n");
}

#[test]
fn print_renders_display_strings() {
    assert_eq!(
        run_output("print(1, 2.5, true, null, undefined, 10 / 0, 0 / 0, {})"),
        "1 2.5 true null undefined Infinity NaN [object Object]\n"
    );
}

#[test]
fn syntax_error_is_reported_with_location() {
    let mut session = session();
    let status = session.state.load_from_string("var x = 1;\nprint(");
    assert_eq!(status, Status::Failure);
    assert!(!session.state.has_loaded_unit());
    let diagnostics = session.stderr.take();
    assert!(
        diagnostics.starts_with("error: (string):2:7: expected expression"),
        "unexpected diagnostic: {diagnostics}"
    );
    assert!(diagnostics.ends_with('\n'));
}

#[test]
fn run_from_string_stops_after_failed_load() {
    let mut session = session();
    assert_eq!(
        session.state.run_from_string(r#"print("never") +"#),
        Status::Failure
    );
    assert_eq!(session.stdout.contents(), "");
}

#[test]
fn missing_file_reports_path() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("absent.js");
    let mut session = session();

    assert_eq!(session.state.load_from_file(&path), Status::Failure);
    assert!(!session.state.has_loaded_unit());
    let diagnostics = session.stderr.take();
    assert!(diagnostics.starts_with("error: cannot open file: '"));
    assert!(diagnostics.contains(&path.display().to_string()));
}

#[test]
fn file_and_string_sources_behave_identically() {
    let source = "var total = 0;\nvar i = 1;\nwhile (i <= 4) { total = total + i; i = i + 1; }\nprint(\"total\", total)\n";
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("sum.js");
    fs::write(&path, source).expect("write script");

    let mut from_file = session();
    assert_eq!(from_file.state.run_from_file(&path), Status::Success);

    assert_eq!(from_file.stdout.take(), run_output(source));
    assert_eq!(from_file.stdout.take(), "");
}

#[test]
fn file_load_uses_path_as_unit_name() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("broken.js");
    fs::write(&path, "print(1)\nvar = 2\n").expect("write script");

    let mut session = session();
    assert_eq!(session.state.load_from_file(&path), Status::Failure);
    let diagnostics = session.stderr.take();
    assert!(
        diagnostics.contains(&format!("{}:2:5:", path.display())),
        "unexpected diagnostic: {diagnostics}"
    );
}

#[test]
fn file_with_invalid_utf8_is_rejected() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("binary.js");
    fs::write(&path, [0x70, 0xff, 0xfe]).expect("write script");

    let mut session = session();
    assert_eq!(session.state.load_from_file(&path), Status::Failure);
    assert!(session.stderr.take().contains("file is not valid UTF-8"));
}

#[test]
fn empty_file_loads_and_runs() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("empty.js");
    fs::write(&path, "").expect("write script");

    let mut session = session();
    assert_eq!(session.state.run_from_file(&path), Status::Success);
    assert_eq!(session.stderr.contents(), "");
}

#[test]
fn fault_during_run_fails_without_killing_state() {
    let mut session = session();
    assert_eq!(
        session.state.run_from_string("undefinedFunction()"),
        Status::Failure
    );
    assert_eq!(
        session.stderr.take(),
        "error: ReferenceError: undefinedFunction is not defined\n"
    );

    assert_eq!(session.state.run_from_string(r#"print("ok")"#), Status::Success);
    assert_eq!(session.stdout.take(), "ok\n");
}

#[test]
fn fault_inside_function_leaves_global_scope_intact() {
    let mut session = session();
    let setup = "var counter = 1;\nfunction boom() { var local = 2; counter = 5; missing(); }";
    assert_eq!(session.state.run_from_string(setup), Status::Success);
    assert_eq!(session.state.run_from_string("boom()"), Status::Failure);

    assert_eq!(
        session.state.run_from_string("print(counter, typeof local, typeof boom)"),
        Status::Success
    );
    assert_eq!(session.stdout.take(), "5 undefined function\n");
}

#[test]
fn calling_a_non_function_is_a_type_error() {
    let mut session = session();
    assert_eq!(session.state.run_from_string("var x = 3; x()"), Status::Failure);
    assert_eq!(session.stderr.take(), "error: TypeError: x is not a function\n");
}

#[test]
fn reading_property_of_undefined_is_a_type_error() {
    let mut session = session();
    assert_eq!(session.state.run_from_string("var u; u.x"), Status::Failure);
    assert!(session
        .stderr
        .take()
        .contains("TypeError: cannot read property `x` of undefined"));
}

#[test]
fn runaway_recursion_hits_call_depth_limit() {
    let mut session = session_with(|config| config.with_max_call_depth(8));
    let status = session
        .state
        .run_from_string("function down(n) { return down(n + 1); } down(0)");
    assert_eq!(status, Status::Failure);
    assert!(session
        .stderr
        .take()
        .contains("RangeError: maximum call stack size exceeded"));

    assert_eq!(session.state.run_from_string("print(typeof down)"), Status::Success);
    assert_eq!(session.stdout.take(), "function\n");
}

#[test]
fn eval_matches_top_level_evaluation() {
    let mut session = session();
    let from_eval = session.state.evaluate(r#"eval("1+1")"#).expect("eval runs");
    let direct = session.state.evaluate("1+1").expect("direct runs");
    assert!(from_eval.strict_equals(&direct));
    assert_eq!(direct.as_number(), Some(2.0));

    assert_eq!(run_output(r#"print(eval("1+1"))"#), "2\n");
}

#[test]
fn eval_returns_non_string_arguments_unchanged() {
    assert_eq!(run_output("print(eval(42), eval())"), "42 undefined\n");
}

#[test]
fn eval_syntax_error_aborts_the_run() {
    let mut session = session();
    let status = session
        .state
        .run_from_string(r#"print("before"); eval("1 +"); print("after")"#);
    assert_eq!(status, Status::Failure);
    assert_eq!(session.stdout.take(), "before\n");
    let diagnostics = session.stderr.take();
    assert!(
        diagnostics.starts_with("error: SyntaxError: (eval):1:4:"),
        "unexpected diagnostic: {diagnostics}"
    );
}

#[test]
fn eval_binds_to_global_environment_not_caller_scope() {
    let output = run_output(
        r#"
        function probe() {
            var hidden = 1;
            return eval("typeof hidden");
        }
        eval("var fromEval = 5");
        print(probe(), fromEval)
        "#,
    );
    assert_eq!(output, "undefined 5\n");
}

#[test]
fn eval_runs_inside_an_armed_run_without_rearming() {
    let output = run_output(r#"print(eval("eval('2 * 3')"))"#);
    assert_eq!(output, "6\n");
}

#[test]
fn load_then_call_runs_pending_unit_once() {
    let mut session = session();
    assert_eq!(session.state.load_from_string(r#"print("loaded")"#), Status::Success);
    assert_eq!(session.state.loaded_unit_name(), Some("(string)"));
    assert_eq!(session.stdout.contents(), "");

    assert_eq!(session.state.call_loaded(), Status::Success);
    assert_eq!(session.stdout.take(), "loaded\n");

    assert_eq!(session.state.call_loaded(), Status::Failure);
    assert_eq!(session.stderr.take(), "error: no compiled unit is loaded\n");
}

#[test]
fn failed_load_keeps_previous_unit() {
    let mut session = session();
    assert_eq!(session.state.load_from_string("print(1)"), Status::Success);
    assert_eq!(session.state.load_from_string("("), Status::Failure);
    assert!(session.state.has_loaded_unit());

    assert_eq!(session.state.call_loaded(), Status::Success);
    assert_eq!(session.stdout.take(), "1\n");
}

#[test]
fn report_writes_prefixed_line_and_fails() {
    let mut session = session();
    assert_eq!(session.state.report(format_args!("custom {}", 3)), Status::Failure);
    assert_eq!(session.stderr.take(), "error: custom 3\n");
}

#[test]
fn string_literals_use_scratch_buffer() {
    let mut session = session();
    assert_eq!(session.state.scratch_capacity(), 0);
    assert_eq!(
        session.state.load_from_string(r#"var s = "scratch";"#),
        Status::Success
    );
    assert!(session.state.scratch_capacity() >= "scratch".len());
    session.state.destroy();
}

#[test]
fn globals_include_builtins_and_script_bindings() {
    let mut session = session();
    assert!(session.state.get_global("print").is_some());
    assert!(session.state.get_global("eval").is_some());

    assert_eq!(session.state.run_from_string("var answer = 6 * 7"), Status::Success);
    let answer = session.state.get_global("answer").expect("answer is bound");
    assert!(matches!(&*answer.0, ValueKind::Number(n) if *n == 42.0));
}

#[test]
fn evaluate_returns_completion_value() {
    let mut session = session();
    let value = session
        .state
        .evaluate("var a = 2; if (a > 1) { a * 21 } else { 0 }")
        .expect("evaluation succeeds");
    assert_eq!(value.as_number(), Some(42.0));
    assert!(session.state.evaluate("missing").is_none());
}

#[test]
fn methods_receive_their_object_as_this() {
    let output = run_output(
        r#"
        var counter = {
            count: 0,
            bump: function () { this.count = this.count + 1; return this; }
        };
        counter.bump().bump();
        var g = "global";
        print(counter.count, this.g)
        "#,
    );
    assert_eq!(output, "2 global\n");
}

#[test]
fn closures_capture_their_defining_scope() {
    let output = run_output(
        r#"
        function makeAdder(step) {
            return function (value) { return value + step; };
        }
        var addTwo = makeAdder(2);
        print(addTwo(40), "x" + 1, 7 % 3, "b" > "a", 1 == "1", 1 === "1")
        "#,
    );
    assert_eq!(output, "42 x1 1 true true false\n");
}

#[test]
fn logical_operators_short_circuit() {
    let output = run_output(
        r#"
        var calls = 0;
        function touch() { calls = calls + 1; return true; }
        var a = false && touch();
        var b = true || touch();
        print(a, b, calls, null || "fallback")
        "#,
    );
    assert_eq!(output, "false true 0 fallback\n");
}

#[test]
fn fault_kinds_have_error_labels() {
    assert_eq!(FaultKind::Syntax.label(), "SyntaxError");
    assert_eq!(FaultKind::Range.label(), "RangeError");
}

fn nested_parens(depth: usize) -> String {
    format!("{}1{}", "(".repeat(depth), ")".repeat(depth))
}

#[test]
fn deeply_nested_source_fails_without_crashing() {
    let mut session = session();
    for source in [
        nested_parens(1_000),
        nested_parens(200_000),
        format!("{}1", "-".repeat(5_000)),
        format!("{}{}", "{".repeat(5_000), "}".repeat(5_000)),
        format!("1{}", " + 1".repeat(5_000)),
        format!("print{}", "()".repeat(5_000)),
    ] {
        assert_eq!(session.state.run_from_string(&source), Status::Failure);
        let diagnostics = session.stderr.take();
        assert!(
            diagnostics.contains("expression nested too deeply"),
            "unexpected diagnostic: {diagnostics}"
        );
    }

    assert_eq!(session.state.run_from_string(&nested_parens(40)), Status::Success);
    assert_eq!(session.state.run_from_string(r#"print("still alive")"#), Status::Success);
    assert_eq!(session.stdout.take(), "still alive\n");
}

#[test]
fn eval_of_deeply_nested_source_is_a_syntax_error() {
    let mut session = session();
    let source = format!(r#"print("before"); eval("{}"); print("after")"#, nested_parens(1_000));
    assert_eq!(session.state.run_from_string(&source), Status::Failure);
    assert_eq!(session.stdout.take(), "before\n");
    let diagnostics = session.stderr.take();
    assert!(diagnostics.starts_with("error: SyntaxError: (eval):1:"));
    assert!(diagnostics.contains("expression nested too deeply"));
}

#[test]
fn max_call_depth_is_clamped_to_supported_limit() {
    let config = HostConfig::default().with_max_call_depth(usize::MAX);
    assert_eq!(config.max_call_depth, MAX_CALL_DEPTH_LIMIT);

    let mut session = session_with(|config| config.with_max_call_depth(usize::MAX));
    let status = session
        .state
        .run_from_string("function down(n) { return down(n + 1); } down(0)");
    assert_eq!(status, Status::Failure);
    assert!(session
        .stderr
        .take()
        .contains("RangeError: maximum call stack size exceeded"));
    assert_eq!(session.state.run_from_string("print(typeof down)"), Status::Success);
}

#[test]
fn return_is_rejected_outside_function_bodies() {
    let mut session = session();
    assert_eq!(session.state.load_from_string("return 5"), Status::Failure);
    assert!(!session.state.has_loaded_unit());
    assert_eq!(
        session.stderr.take(),
        "error: (string):1:1: `return` outside of a function body\n"
    );

    assert_eq!(
        session.state.run_from_string(r#"eval("return 5")"#),
        Status::Failure
    );
    assert!(session
        .stderr
        .take()
        .starts_with("error: SyntaxError: (eval):1:1: `return` outside of a function body"));

    assert_eq!(
        session
            .state
            .run_from_string("function f() { if (true) { return 5; } } print(f())"),
        Status::Success
    );
    assert_eq!(session.stdout.take(), "5\n");
}

#[test]
fn destroy_releases_cycles_created_inside_calls() {
    let mut session = session();
    let setup = r#"
        function makeCycle() {
            var node = {};
            node.self = node;
            node.read = function () { return node; };
            return node;
        }
        var kept = makeCycle();
    "#;
    assert_eq!(session.state.run_from_string(setup), Status::Success);
    let kept = session.state.get_global("kept").expect("kept is bound");
    let object = match &*kept.0 {
        ValueKind::Object(object) => Rc::downgrade(object),
        _ => panic!("kept should be an object"),
    };
    drop(kept);

    session.state.destroy();
    assert!(object.upgrade().is_none(), "cycle survived destroy");
}
