use async_to_promises::{transform, Error, Target, TransformOptions};

fn external() -> TransformOptions {
    TransformOptions {
        external_helpers: true,
        ..TransformOptions::default()
    }
}

fn position(code: &str, needle: &str) -> usize {
    code.find(needle)
        .unwrap_or_else(|| panic!("{:?} not found in:\n{}", needle, code))
}

#[test]
fn test_declaration_keeps_name_and_drops_async() {
    let output = transform("async function load(url) { return await fetch(url); }", &external()).unwrap();
    assert!(!output.code.contains("async function"), "{}", output.code);
    assert!(output.code.contains("function load(url)"), "{}", output.code);
    assert!(output.code.contains("_call("), "{}", output.code);
    assert!(output.code.contains("_await(fetch(url))"), "{}", output.code);
    assert_eq!(output.functions.len(), 1);
    assert_eq!(output.functions[0].name, "load");
    assert!(output.functions[0].always_returns);
}

#[test]
fn test_arguments_around_await_keep_their_order() {
    let source = "async function run() { return f(a(), await x, b()); }";
    let output = transform(source, &external()).unwrap();
    let code = &output.code;
    let first = position(code, "a()");
    let awaited = position(code, "_await(x");
    let last = position(code, "b()");
    assert!(first < awaited && awaited < last, "{}", code);
}

#[test]
fn test_side_effects_before_await_run_once() {
    let source = "async function next(obj, i) { return obj[i++] + await more(); }";
    let output = transform(source, &external()).unwrap();
    assert_eq!(output.code.matches("i++").count(), 1, "{}", output.code);
}

#[test]
fn test_helpers_are_emitted_once_per_file() {
    let source = "async function a() { await x; }\nasync function b() { await y; }\n";
    let output = transform(source, &TransformOptions::default()).unwrap();
    assert_eq!(output.code.matches("function _await(").count(), 1, "{}", output.code);
    assert!(output.helpers.contains(&"_await"));
    assert_eq!(output.functions.len(), 2);
}

#[test]
fn test_external_helpers_are_imported() {
    let output = transform("async function a() { await x; }", &external()).unwrap();
    assert!(
        output
            .code
            .contains("from \"babel-plugin-transform-async-to-promises/helpers\""),
        "{}",
        output.code
    );
    assert!(!output.code.contains("function _await("), "{}", output.code);
}

#[test]
fn test_break_from_suspending_loop_uses_flag() {
    let source = "async function poll() { while (true) { if (await check()) break; } }";
    let output = transform(source, &external()).unwrap();
    assert!(output.code.contains("_for("), "{}", output.code);
    assert!(output.code.contains("_interrupt"), "{}", output.code);
}

#[test]
fn test_method_call_keeps_its_receiver() {
    let source = "async function add(arr, x) { arr.push(await x); }";
    let output = transform(source, &external()).unwrap();
    assert!(output.code.contains("arr.push(_"), "{}", output.code);
    assert!(!output.code.contains("= arr.push"), "{}", output.code);
}

#[test]
fn test_method_call_on_this_keeps_its_receiver() {
    let source = "async function update(x) { this.run(await x); }";
    let output = transform(source, &external()).unwrap();
    assert!(output.code.contains("_this.run(_"), "{}", output.code);
    assert!(!output.code.contains("= _this.run"), "{}", output.code);
}

#[test]
fn test_var_redeclaring_a_parameter_assigns_it() {
    let source = "async function inc(x) { await tick(); var x = x + 1; return x; }";
    let output = transform(source, &external()).unwrap();
    assert!(!output.code.contains("var x"), "{}", output.code);
    assert!(output.code.contains("x = x + 1"), "{}", output.code);
}

#[test]
fn test_loop_closures_see_their_own_iteration() {
    let source = "async function collect(n) {
        const fns = [];
        for (let i = 0; i < n; i++) { await tick(); fns.push(() => i); }
        return fns;
    }";
    let output = transform(source, &external()).unwrap();
    let code = &output.code;
    assert!(code.contains("_for("), "{}", code);
    assert!(code.contains("function(i)") || code.contains("function (i)"), "{}", code);
    assert!(code.contains("}(i)") || code.contains("})(i)"), "{}", code);
}

#[test]
fn test_reassigned_loop_binding_in_closure_is_unsupported() {
    let source = "async function collect(n) {
        const fns = [];
        for (let i = 0; i < n; i++) { await tick(); fns.push(() => i); i += 1; }
        return fns;
    }";
    let error = transform(source, &external()).unwrap_err();
    assert!(matches!(error, Error::Unsupported { .. }), "{:?}", error);
}

#[test]
fn test_indexed_loop_over_module_binding_reassigned_elsewhere() {
    let source = "let items = [];
        function reset() { items = []; }
        async function each() { for (let i = 0; i < items.length; i++) { await items[i]; } }";
    let output = transform(source, &external()).unwrap();
    assert!(output.code.contains("_for("), "{}", output.code);
    assert!(!output.code.contains("_forTo("), "{}", output.code);

    let source = "const items = [];
        async function each() { for (let i = 0; i < items.length; i++) { await items[i]; } }";
    let output = transform(source, &external()).unwrap();
    assert!(output.code.contains("_forTo("), "{}", output.code);
}

#[test]
fn test_falling_finally_rethrows() {
    let source = "async function withResource() { try { await open(); } finally { close(); } }";
    let output = transform(source, &external()).unwrap();
    assert!(output.code.contains("_finallyRethrows("), "{}", output.code);
    assert!(output.code.contains("close()"), "{}", output.code);
}

#[test]
fn test_function_expression_is_wrapped() {
    let source = "const task = async function() { await x; };";
    let output = transform(source, &external()).unwrap();
    assert!(output.code.contains("_async(function"), "{}", output.code);
}

#[test]
fn test_es6_target_uses_arrows() {
    let options = TransformOptions {
        target: Target::Es6,
        ..external()
    };
    let output = transform("const f = async () => { await x; return 1; };", &options).unwrap();
    assert!(output.code.contains("=>"), "{}", output.code);
    assert!(!output.code.contains("async ("), "{}", output.code);
    assert!(!output.code.contains("async()"), "{}", output.code);
}

#[test]
fn test_es5_target_captures_this() {
    let source = "async function f() { await x; return this.y; }";
    let output = transform(source, &external()).unwrap();
    assert!(output.code.contains("_this = this"), "{}", output.code);
    assert!(output.code.contains("_this.y"), "{}", output.code);
}

#[test]
fn test_async_generator_uses_generator_helper() {
    let source = "async function* numbers() { yield 1; await x; yield 2; }";
    let output = transform(source, &external()).unwrap();
    assert!(output.code.contains("new _AsyncGenerator("), "{}", output.code);
    assert!(output.helpers.contains(&"_AsyncGenerator"));
}

#[test]
fn test_eval_is_rejected() {
    let error = transform("async function f() { eval(\"x\"); await y; }", &external()).unwrap_err();
    assert!(matches!(error, Error::EvalInAsync { .. }), "{:?}", error);
    assert!(error.is_user_error());
}

#[test]
fn test_await_in_template_is_unsupported() {
    let error = transform("async function f() { return `${await x}`; }", &external()).unwrap_err();
    assert!(matches!(error, Error::Unsupported { .. }), "{:?}", error);
}

#[test]
fn test_options_from_json() {
    let options = TransformOptions::from_json(r#"{"externalHelpers": true, "target": "es6"}"#).unwrap();
    assert!(options.external_helpers);
    assert_eq!(options.target, Target::Es6);
    assert!(!options.hoist);

    let error = TransformOptions::from_json(r#"{"unknownOption": 1}"#).unwrap_err();
    assert!(matches!(error, Error::Config { .. }));
}
