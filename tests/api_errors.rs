use std::thread;

use mathjson_latex::error::{DictionaryError, SerializeError};
use mathjson_latex::{
    Expression, LatexError, LatexSyntax, NotationEntry, ParseOptions, SerializeOptions,
};

#[test]
fn test_parse_depth_exceeded() {
    let syntax = LatexSyntax::new().with_parse_options(ParseOptions {
        max_depth: 32,
        ..ParseOptions::default()
    });
    let source = format!("{}x{}", "(".repeat(100), ")".repeat(100));
    assert_eq!(
        syntax.parse(&source).unwrap_err(),
        LatexError::DepthExceeded { limit: 32 }
    );
}

#[test]
fn test_default_depth_accepts_reasonable_nesting() {
    let source = format!("{}x{}", "{".repeat(50), "}".repeat(50));
    let parsed = LatexSyntax::new().parse(&source).unwrap();
    assert_eq!(parsed.expression, Expression::symbol("x"));
}

/// Runs `f` on a thread with the usual 2 MB stack of spawned threads.
fn on_small_stack<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn test_default_depth_guard_fires_before_the_stack_runs_out() {
    let sources = vec![
        format!("{}x{}", "{".repeat(300), "}".repeat(300)),
        format!("{}x{}", "(".repeat(300), ")".repeat(300)),
        format!("{}x", "\\sqrt".repeat(300)),
        format!("{}x", "-".repeat(300)),
        format!("{}x{}", "x^{".repeat(300), "}".repeat(300)),
        format!("{}x{}", "\\frac{1}{".repeat(300), "}".repeat(300)),
    ];
    for source in sources {
        let result = on_small_stack(move || LatexSyntax::new().parse(&source).map(|_| ()));
        assert_eq!(result, Err(LatexError::DepthExceeded { limit: 64 }));
    }
}

#[test]
fn test_default_serialize_depth_guard_fires_before_the_stack_runs_out() {
    let result = on_small_stack(|| {
        let mut expr = Expression::symbol("x");
        for _ in 0..300 {
            let reciprocal = Expression::function("Power", vec![expr, Expression::from(-2)]);
            expr = Expression::function("Multiply", vec![reciprocal, Expression::symbol("y")]);
        }
        LatexSyntax::new().serialize(&expr).map(|_| ())
    });
    assert_eq!(result, Err(LatexError::DepthExceeded { limit: 64 }));
}

#[test]
fn test_serialize_depth_exceeded() {
    let syntax = LatexSyntax::new().with_serialize_options(SerializeOptions {
        max_depth: 16,
        ..SerializeOptions::default()
    });
    let mut expr = Expression::symbol("x");
    for _ in 0..40 {
        expr = Expression::function("Negate", vec![expr]);
    }
    assert_eq!(
        syntax.serialize(&expr).unwrap_err(),
        LatexError::DepthExceeded { limit: 16 }
    );
}

#[test]
fn test_cyclic_alias_is_fatal() {
    let result = LatexSyntax::new().with_dictionary(vec![
        NotationEntry::alias("A", "B"),
        NotationEntry::alias("B", "A"),
    ]);
    let error = result.unwrap_err();
    assert!(matches!(
        error,
        LatexError::Dictionary(DictionaryError::CyclicAlias { .. })
    ));
    assert!(error.to_string().starts_with("Alias cycle:"));
}

#[test]
fn test_failing_serializer_hook_becomes_a_diagnostic() {
    let syntax = LatexSyntax::new()
        .with_dictionary(vec![NotationEntry::serializer("Broken", |_, _| {
            Err(SerializeError::Custom("no notation for Broken".to_string()))
        })])
        .unwrap();
    let serialized = syntax
        .serialize(&Expression::function(
            "Add",
            vec![Expression::symbol("x"), Expression::function("Broken", vec![])],
        ))
        .unwrap();
    assert_eq!(serialized.latex, "");
    assert_eq!(serialized.diagnostics.len(), 1);
    assert_eq!(serialized.diagnostics[0].code(), "serialization-failed");
    assert!(serialized.diagnostics[0]
        .to_string()
        .contains("no notation for Broken"));
}

#[test]
fn test_diagnostics_carry_source_positions() {
    let source = "x+\n\\foo";
    let parsed = LatexSyntax::new().parse(source).unwrap();
    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(
        parsed.diagnostics[0].describe(source),
        "2:1 unknown-command: Unknown command `\\foo`"
    );
}

#[test]
fn test_render_diagnostics_with_miette() {
    let source = "\\frac{1}{\\foo}";
    let parsed = LatexSyntax::new().parse(source).unwrap();
    assert!(parsed.has_errors());
    let rendered = parsed.render_diagnostics(source, "formula.tex");
    assert!(rendered.contains("unknown-command"));
    assert!(rendered.contains("formula.tex"));
}

#[test]
fn test_clean_parse_renders_nothing() {
    let source = "x+1";
    let parsed = LatexSyntax::new().parse(source).unwrap();
    assert_eq!(parsed.render_diagnostics(source, "clean.tex"), "");
}
