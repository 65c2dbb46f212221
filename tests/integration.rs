
use std::sync::Arc;

use fixtures::{
    Point, SHAPE, generate_random_whitespace, generate_random_whitespace_at_least_one, get_engine,
    get_engine_with,
};
use scriptlate::{
    Engine, EngineConfig, EngineError, GetResolver, ParseErrorKind, Params, Registration, RuntimeErrorKind,
    ScriptInterface, Value, WriterOut,
};

fn render(source: &str, params: Option<&Params>) -> String {
    let mut engine = get_engine();
    engine.add_template("T", source).unwrap();
    engine.render("T", params).unwrap()
}

fn render_err(source: &str, params: Option<&Params>) -> EngineError {
    let mut engine = get_engine();
    match engine.add_template("T", source) {
        Ok(()) => engine.render("T", params).unwrap_err(),
        Err(error) => error,
    }
}

#[test]
#[ntest::timeout(5000)]
fn test_basic_substitution() {
    let template = format!(
        "Hello, ${{{}name{}}}!",
        generate_random_whitespace(),
        generate_random_whitespace()
    );
    let mut engine = get_engine();
    engine.add_template("Template A", template).unwrap();

    let missing = engine.missing_params("Template A", &Params::new());
    assert_eq!(missing, ["name"], "should have a single parameter");

    let mut params = Params::new();
    params.insert("name", "Jessica");
    assert!(engine.missing_params("Template A", &params).is_empty());

    let rendered = engine.render("Template A", Some(&params)).unwrap();
    assert_eq!(
        rendered, "Hello, Jessica!",
        "Rendered string should match the template."
    );
}

#[test]
#[ntest::timeout(5000)]
fn test_basic_iteration() {
    let template = format!(
        "<%{}for{}({}cat{}:{}cats{}){}{{{}%>Greetings ${{cat}}\n<%{}}}{}%>",
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace_at_least_one(),
        generate_random_whitespace(),
        generate_random_whitespace(),
    );

    let mut engine = get_engine();
    engine.add_template("Template A", template).unwrap();
    assert_eq!(engine.missing_params("Template A", &Params::new()), ["cats"]);

    let mut params = Params::new();
    params.insert(
        "cats",
        Value::list(["Fluffy", "Whiskers", "Mittens"].map(Value::from)),
    );
    let rendered = engine.render("Template A", Some(&params)).unwrap();
    assert_eq!(
        rendered,
        "Greetings Fluffy\nGreetings Whiskers\nGreetings Mittens\n"
    );
}

#[test]
#[ntest::timeout(5000)]
fn test_if_else_chain() {
    let source =
        "<% if (n > 10) { %>big<% } else if (n > 5) { %>medium<% } else { %>small<% } %>";
    let mut engine = get_engine();
    engine.add_template("T", source).unwrap();
    for (n, expected) in [(20, "big"), (7, "medium"), (1, "small")] {
        let mut params = Params::new();
        params.insert("n", n);
        assert_eq!(engine.render("T", Some(&params)).unwrap(), expected, "n = {n}");
    }
}

#[test]
#[ntest::timeout(5000)]
fn test_for_else() {
    let source = "<% for (cat : cats) { %>${cat};<% } else { %>none<% } %>";
    let mut engine = get_engine();
    engine.add_template("T", source).unwrap();

    let mut params = Params::new();
    params.insert("cats", Value::list([Value::from("a"), Value::from("b")]));
    assert_eq!(engine.render("T", Some(&params)).unwrap(), "a;b;");

    params.insert("cats", Value::list([]));
    assert_eq!(engine.render("T", Some(&params)).unwrap(), "none", "empty list");

    assert_eq!(engine.render("T", None).unwrap(), "none", "null collection");
}

#[test]
#[ntest::timeout(5000)]
fn test_loop_status() {
    let source = "<% for (x : 1..3) { %>${for.iter.index}:${x}<% if (for.iter.isLast) { %>.<% } else { %>,<% } } %>";
    assert_eq!(render(source, None), "0:1,1:2,2:3.");

    let source = "<% for (x : 3..1) { if (for.iter.isOdd) { %>${x}<% } } %>";
    assert_eq!(render(source, None), "31", "the first item is odd");
}

#[test]
#[ntest::timeout(5000)]
fn test_where_filter() {
    let source = "<% for (x : 1..6 where function(v) { return v % 2 == 0; }) { %>${for.iter.index}=${x} <% } %>";
    assert_eq!(render(source, None), "0=2 1=4 2=6 ");

    let source = "<% for (x : [1, 2] where function(v) { return false; }) { %>${x}<% } else { %>empty<% } %>";
    assert_eq!(render(source, None), "empty");
}

#[test]
#[ntest::timeout(5000)]
fn test_filter_output_is_discarded() {
    let source = "<% for (x : [1, 2] where function(v) { %>noise<% return true; }) { %>${x}<% } %>";
    assert_eq!(render(source, None), "12");
}

#[test]
#[ntest::timeout(5000)]
fn test_labelled_break_and_continue() {
    let source = "<% outer: for (a : 1..3) { for (b : 1..3) { if (b == 2) { continue outer; } if (a == 3) { break outer; } %>${a}${b} <% } } %>";
    assert_eq!(render(source, None), "11 21 ");

    let source = "<% for (a : 1..2) { for (b : 1..5) { if (b > 2) { break; } %>${a}${b},<% } } %>";
    assert_eq!(render(source, None), "11,12,21,22,");

    let source = "<% for (a : 1..4) { if (a % 2 == 1) { continue; } %>${a}<% } %>";
    assert_eq!(render(source, None), "24");
}

#[test]
#[ntest::timeout(5000)]
fn test_functions() {
    let source = "<% var add = function(a, b) { return a + b; }; %>\n${add(1, 2)} ${add('x', 'y')}";
    assert_eq!(render(source, None), "3 xy");

    let source = "<% var second = function(a, b) { return b; }; %>[${second(1)}][${second(1, 2, 3)}]";
    assert_eq!(render(source, None), "[][2]", "missing arguments are null, extras ignored");

    let source = "<% var twice = function(f, v) { return f(f(v)); }; var inc = function(n) { return n + 1; }; %>${twice(inc, 5)}";
    assert_eq!(render(source, None), "7");
}

#[test]
#[ntest::timeout(5000)]
fn test_native_functions() {
    let mut params = Params::new();
    params.insert(
        "upper",
        Value::native("upper", |args| {
            Ok(args
                .first()
                .and_then(Value::as_str)
                .map(str::to_uppercase)
                .into())
        }),
    );
    params.insert(
        "fail",
        Value::native("fail", |_| {
            Err(RuntimeErrorKind::Native {
                name: "fail".to_owned(),
                message: "always fails".to_owned(),
            })
        }),
    );

    assert_eq!(render("${upper('abc')}", Some(&params)), "ABC");

    let err = render_err("ok\n  ${fail()}", Some(&params));
    match err {
        EngineError::Runtime(err) => {
            assert_eq!((err.line, err.column), (2, 9));
            assert!(matches!(err.kind, RuntimeErrorKind::Native { .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
#[ntest::timeout(5000)]
fn test_host_beans() {
    let mut params = Params::new();
    params.insert("p", Value::host(Point::new(1, 2)));
    assert_eq!(
        render("${p.x},${p.y}<% p.y = 5; %>/${p.y}", Some(&params)),
        "1,2/5"
    );

    match render_err("<% p.x = 3; %>", Some(&params)) {
        EngineError::Runtime(err) => assert!(matches!(
            err.kind,
            RuntimeErrorKind::PropertyNotWritable { .. }
        )),
        other => panic!("unexpected {other:?}"),
    }
    match render_err("${p.z}", Some(&params)) {
        EngineError::Runtime(err) => assert!(matches!(
            err.kind,
            RuntimeErrorKind::NoSuchProperty { ref type_name, ref property }
                if type_name == "Point" && property == "z"
        )),
        other => panic!("unexpected {other:?}"),
    }
}

struct ShapeGetter;

impl GetResolver for ShapeGetter {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        Ok(Value::from(format!("{}.{property}", bean.type_name())))
    }
}

#[test]
#[ntest::timeout(5000)]
fn test_assignable_registration() {
    let mut engine = Engine::builder()
        .register(Registration::assignable(&SHAPE).getter(Arc::new(ShapeGetter)))
        .build();
    engine.add_template("T", "${p.anything}").unwrap();

    let mut params = Params::new();
    params.insert("p", Value::host(Point::new(1, 2)));
    assert_eq!(engine.render("T", Some(&params)).unwrap(), "Point.anything");
}

#[test]
#[ntest::timeout(5000)]
fn test_expressions() {
    assert_eq!(
        render("${1 + 2 * 3} ${'a' + 1} ${7 / 2} ${7.0 / 2} ${-3 % 2} ${(1 + 2) * 3}", None),
        "7 a1 3 3.5 -1 9"
    );
    assert_eq!(
        render("${1 << 4} ${-16 >> 2} ${5 & 3} ${5 | 3} ${5 ^ 3} ${~0}", None),
        "16 -4 1 7 6 -1"
    );
    assert_eq!(
        render("${1 < 2 && 2 < 3} ${!true || false} ${'a' == 'a'} ${1 != 1.0}", None),
        "true false true false"
    );
    assert_eq!(render("${1..3} ${(1..5).size}", None), "1..3 5");
}

#[test]
#[ntest::timeout(5000)]
fn test_lists_and_maps() {
    let source = "<% var l = [1, 2, 3]; l[0] = 10; %>${l[0]} ${l.size} ${l}";
    assert_eq!(render(source, None), "10 3 [10, 2, 3]");

    let mut params = Params::new();
    params.insert(
        "m",
        Value::map([("a", Value::Int(1)), ("b", Value::Int(2))]),
    );
    assert_eq!(
        render("${m.a}[${m.missing}]<% for (k : m) { %> ${k}=${m[k]}<% } %>", Some(&params)),
        "1[] a=1 b=2"
    );
    assert_eq!(
        render("<% m.c = 3; %>${m.c}", Some(&params)),
        "3"
    );
}

#[test]
#[ntest::timeout(5000)]
fn test_self_referential_list() {
    let source = "<% var l = [1]; l[0] = l; var m = [1]; m[0] = m; %>${l} ${l == m} ${'' + l}";
    assert_eq!(render(source, None), "[[...]] true [[...]]");
}

#[test]
#[ntest::timeout(5000)]
fn test_byte_output() {
    let mut engine = get_engine();
    engine.add_template("T", "é=${word}").unwrap();

    let mut params = Params::new();
    params.insert("word", "café");

    let mut out = WriterOut::new(Vec::new(), "ISO-8859-1").unwrap();
    engine.render_to("T", Some(&params), &mut out).unwrap();
    assert_eq!(out.into_inner(), b"\xe9=caf\xe9");

    assert_eq!(
        engine.render_bytes("T", Some(&params)).unwrap(),
        "é=café".as_bytes(),
        "the default encoding is UTF-8"
    );

    params.insert("word", Value::bytes(&b"\x01\x02"[..]));
    let mut out = WriterOut::new(Vec::new(), "US-ASCII").unwrap();
    engine.render_to("T", Some(&params), &mut out).unwrap();
    assert_eq!(out.into_inner(), b"?=\x01\x02", "byte values are written as-is");
}

#[test]
#[ntest::timeout(5000)]
fn test_parse_error_position() {
    match render_err("line one\n  <% var x = ; %>", None) {
        EngineError::Parse(err) => {
            assert_eq!((err.line, err.column), (2, 14));
            assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
    match render_err("<% var s = 'open; %>", None) {
        EngineError::Parse(err) => assert_eq!(err.kind, ParseErrorKind::UnterminatedString),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
#[ntest::timeout(5000)]
fn test_runtime_error_position() {
    let mut params = Params::new();
    params.insert("zero", 0).insert("n", 1).insert("five", 5);

    match render_err("ab\n${1 / zero}", Some(&params)) {
        EngineError::Runtime(err) => {
            assert_eq!((err.line, err.column), (2, 5));
            assert!(matches!(err.kind, RuntimeErrorKind::DivideByZero));
        }
        other => panic!("unexpected {other:?}"),
    }
    match render_err("${n()}", Some(&params)) {
        EngineError::Runtime(err) => {
            assert_eq!((err.line, err.column), (1, 4));
            assert!(matches!(
                err.kind,
                RuntimeErrorKind::NotFunction { ref type_name } if type_name == "int"
            ));
        }
        other => panic!("unexpected {other:?}"),
    }
    match render_err("<% for (x : five) { } %>", Some(&params)) {
        EngineError::Runtime(err) => assert!(matches!(
            err.kind,
            RuntimeErrorKind::NotIterable { ref type_name } if type_name == "int"
        )),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
#[ntest::timeout(5000)]
fn test_filter_errors_keep_their_position() {
    let source = "<% for (x : [1] where function(v) {\n  return v / 0;\n}) { } %>";
    match render_err(source, None) {
        EngineError::Runtime(err) => {
            assert_eq!((err.line, err.column), (2, 12));
            assert!(matches!(err.kind, RuntimeErrorKind::DivideByZero));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
#[ntest::timeout(5000)]
fn test_strict_variables() {
    let mut engine = get_engine_with(EngineConfig::default().with_loose_var(false));
    match engine.add_template("T", "${x}") {
        Err(EngineError::Parse(err)) => assert_eq!(
            err.kind,
            ParseErrorKind::UndeclaredVariable {
                name: "x".to_owned()
            }
        ),
        other => panic!("unexpected {other:?}"),
    }
    engine.add_template("U", "<% var x = 'ok'; %>${x}").unwrap();
    assert_eq!(engine.render("U", None).unwrap(), "ok");
}

#[test]
#[ntest::timeout(5000)]
fn test_blank_line_trimming() {
    let source = "a\n  <% if (true) { %>\nb\n<% } %>\nc";
    assert_eq!(render(source, None), "a\nb\nc");

    let mut engine =
        get_engine_with(EngineConfig::default().with_trim_code_block_blank_line(false));
    engine.add_template("T", source).unwrap();
    assert_eq!(engine.render("T", None).unwrap(), "a\n  \nb\n\nc");
}

#[test]
#[ntest::timeout(5000)]
fn test_escapes_and_comments() {
    assert_eq!(
        render("\\<% not code %> \\${x}", None),
        "<% not code %> ${x}"
    );
    assert_eq!(
        render("<% // line comment\n /* block */ var a = 1; %>${a}", None),
        "1"
    );
    assert_eq!(render("${'tab\\there'}", None), "tab\there");
}

#[test]
#[ntest::timeout(5000)]
fn test_top_level_return() {
    assert_eq!(render("a<% if (stop) { return; } %>b", None), "ab");
    let mut params = Params::new();
    params.insert("stop", true);
    assert_eq!(render("a<% if (stop) { return; } %>b", Some(&params)), "a");
}

#[test]
#[ntest::timeout(5000)]
fn test_duplicate_and_missing_template() {
    let mut engine = get_engine();
    engine.add_template("T", "x").unwrap();
    assert!(matches!(
        engine.add_template("T", "y"),
        Err(EngineError::TemplateExists { .. })
    ));
    assert!(matches!(
        engine.render("U", None),
        Err(EngineError::MissingTemplate { .. })
    ));
    assert!(engine.missing_params("U", &Params::new()).is_empty());
}

#[test]
#[ntest::timeout(10000)]
fn test_concurrent_renders() {
    let mut engine = get_engine();
    engine
        .add_template(
            "T",
            "<% var total = 0; for (i : 1..n) { total = total + i; } %>${total}",
        )
        .unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let engine = &engine;
                scope.spawn(move || {
                    let mut params = Params::new();
                    params.insert("n", n);
                    (n, engine.render("T", Some(&params)).unwrap())
                })
            })
            .collect();
        for handle in handles {
            let (n, rendered) = handle.join().unwrap();
            assert_eq!(rendered, (n * (n + 1) / 2).to_string());
        }
    });
}
