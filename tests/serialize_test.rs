use std::collections::BTreeMap;

use mathjson_latex::number::NumberNotation;
use mathjson_latex::{serialize, Dictionary, Expression, LatexSyntax, SerializeOptions};

fn sym(name: &str) -> Expression {
    Expression::symbol(name)
}

fn num(value: i32) -> Expression {
    Expression::from(value)
}

fn f(head: &str, args: Vec<Expression>) -> Expression {
    Expression::function(head, args)
}

fn latex(expr: &Expression) -> String {
    let serialized = LatexSyntax::new().serialize(expr).unwrap();
    assert!(
        serialized.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        serialized.diagnostics
    );
    serialized.latex
}

#[test]
fn test_numbers() {
    assert_eq!(latex(&Expression::number(-1234567.89)), "-1\\,234\\,567.89");
    assert_eq!(latex(&Expression::number(1e199)), "10^{199}");
    assert_eq!(latex(&Expression::number(-1e-199)), "-10^{-199}");
    assert_eq!(latex(&Expression::decimal("+Infinity").unwrap()), "\\infty");
    assert_eq!(latex(&Expression::decimal("-Infinity").unwrap()), "-\\infty");
    assert_eq!(
        latex(&Expression::decimal("NaN").unwrap()),
        "\\operatorname{NaN}"
    );
    assert_eq!(
        latex(&Expression::decimal("3.123456785678567856785678567856785678").unwrap()),
        "3.123\\,4\\overline{5678}"
    );
    assert_eq!(
        latex(&Expression::decimal("0.1234567872368237462387623876").unwrap()),
        "0.123\\,456\\,787\\,236\\,82\\ldots"
    );
}

#[test]
fn test_number_options() {
    let options = SerializeOptions {
        number: mathjson_latex::number::NumberFormat {
            decimal_marker: "{,}".to_string(),
            group_separator: "".to_string(),
            ..Default::default()
        },
        ..SerializeOptions::default()
    };
    let serialized = serialize(&Expression::number(1234.5), Dictionary::standard(), &options).unwrap();
    assert_eq!(serialized.latex, "1234{,}5");

    let mut options = SerializeOptions::default();
    options.number.notation = NumberNotation::Scientific;
    let serialized = serialize(&Expression::number(12345.0), Dictionary::standard(), &options).unwrap();
    assert_eq!(serialized.latex, "1.234\\,5\\cdot10^{4}");
}

#[test]
fn test_symbols() {
    assert_eq!(latex(&sym("Pi")), "\\pi");
    assert_eq!(latex(&sym("alpha")), "\\alpha");
    assert_eq!(latex(&sym("x")), "x");
    assert_eq!(latex(&sym("speed")), "\\operatorname{speed}");
}

#[test]
fn test_invisible_multiplication() {
    assert_eq!(
        latex(&f(
            "Multiply",
            vec![
                f("Add", vec![sym("x"), num(1)]),
                f("Subtract", vec![sym("x"), num(1)]),
            ]
        )),
        "(x+1)(x-1)"
    );
    assert_eq!(latex(&f("Multiply", vec![num(2), sym("x")])), "2x");
    assert_eq!(latex(&f("Multiply", vec![sym("a"), sym("b")])), "ab");
    assert_eq!(latex(&f("Multiply", vec![sym("Pi"), sym("x")])), "\\pi x");
    assert_eq!(latex(&f("Multiply", vec![num(2), num(2)])), "2\\times2");
}

#[test]
fn test_multiplication_signs() {
    assert_eq!(latex(&f("Multiply", vec![num(-1), sym("x")])), "-x");
    assert_eq!(latex(&f("Multiply", vec![sym("x"), num(-1)])), "-x\\times1");
    assert_eq!(
        latex(&f("Multiply", vec![num(-2), num(-3), sym("x")])),
        "2\\times3x"
    );
}

#[test]
fn test_reciprocal_factors() {
    assert_eq!(
        latex(&f(
            "Multiply",
            vec![sym("x"), f("Power", vec![sym("y"), num(-1)])]
        )),
        "\\frac{x}{y}"
    );
    assert_eq!(
        latex(&f(
            "Multiply",
            vec![num(3), f("Power", vec![sym("y"), num(-2)])]
        )),
        "\\frac{3}{y^{2}}"
    );
}

#[test]
fn test_powers() {
    assert_eq!(
        latex(&f("Power", vec![sym("x"), num(-2)])),
        "\\frac{1}{x^{2}}"
    );
    assert_eq!(latex(&f("Power", vec![sym("x"), num(-1)])), "\\frac{1}{x}");
    assert_eq!(
        latex(&f("Power", vec![sym("x"), f("Divide", vec![num(1), num(2)])])),
        "\\sqrt{x}"
    );
    assert_eq!(
        latex(&f("Power", vec![sym("x"), Expression::number(0.5)])),
        "\\sqrt{x}"
    );
    assert_eq!(
        latex(&f("Power", vec![sym("x"), f("Rational", vec![num(-1), num(2)])])),
        "\\frac{1}{\\sqrt{x}}"
    );
    assert_eq!(
        latex(&f("Power", vec![sym("x"), f("Rational", vec![num(2), num(3)])])),
        "x^{\\frac{2}{3}}"
    );
    assert_eq!(
        latex(&f(
            "Power",
            vec![
                f("Multiply", vec![num(2), sym("x")]),
                f("Subtract", vec![num(1), sym("n")]),
            ]
        )),
        "(2x)^{1-n}"
    );
    assert_eq!(latex(&f("Power", vec![num(-2), num(2)])), "(-2)^{2}");
}

#[test]
fn test_scientific_bases_are_parenthesized() {
    let power = |base: Expression| f("Power", vec![base, num(2)]);
    assert_eq!(
        latex(&power(Expression::decimal("1e5").unwrap())),
        "(10^{5})^{2}"
    );
    assert_eq!(latex(&power(Expression::number(1e30))), "(10^{30})^{2}");
    assert_eq!(
        latex(&power(Expression::decimal("1.5e30").unwrap())),
        "(1.5\\cdot10^{30})^{2}"
    );
    assert_eq!(
        latex(&f("Subscript", vec![Expression::decimal("1e25").unwrap(), sym("n")])),
        "(10^{25})_{n}"
    );
    assert_eq!(latex(&power(Expression::number(1e5))), "100\\,000^{2}");
}

#[test]
fn test_additive_terms() {
    assert_eq!(latex(&f("Add", vec![sym("x"), num(-1)])), "x-1");
    assert_eq!(
        latex(&f("Add", vec![sym("x"), f("Negate", vec![sym("y")])])),
        "x-y"
    );
    assert_eq!(
        latex(&f("Negate", vec![f("Add", vec![sym("x"), num(1)])])),
        "-(x+1)"
    );
    assert_eq!(
        latex(&f(
            "Subtract",
            vec![sym("a"), f("Subtract", vec![sym("b"), sym("c")])]
        )),
        "a-(b-c)"
    );
    assert_eq!(latex(&f("Add", vec![])), "0");
    assert_eq!(
        latex(&f(
            "Add",
            vec![
                f("Multiply", vec![sym("x"), num(-1)]),
                f("Multiply", vec![sym("x"), num(2)]),
            ]
        )),
        "-x\\times1+x\\times2"
    );
    assert_eq!(
        latex(&f("Subtract", vec![f("Negate", vec![sym("x")]), num(-1)])),
        "-x--1"
    );
    assert_eq!(
        latex(&f(
            "Equal",
            vec![f("Multiply", vec![num(2), num(2)]), Expression::Missing]
        )),
        "2\\times2=\\placeholder"
    );
}

#[test]
fn test_generic_notations() {
    assert_eq!(latex(&f("Divide", vec![sym("n"), num(4)])), "\\frac{n}{4}");
    assert_eq!(latex(&f("Factorial", vec![sym("n")])), "n!");
    assert_eq!(latex(&f("Abs", vec![sym("x")])), "|x|");
    assert_eq!(latex(&f("List", vec![num(1), num(2), num(3)])), "[1, 2, 3]");
    assert_eq!(latex(&f("Equal", vec![sym("x"), num(1)])), "x=1");
    assert_eq!(latex(&f("Sin", vec![sym("x")])), "\\sin(x)");
    assert_eq!(latex(&f("Root", vec![sym("x"), num(3)])), "\\sqrt[3]{x}");
    assert_eq!(latex(&f("Sqrt", vec![sym("x")])), "\\sqrt{x}");
    assert_eq!(latex(&f("Subscript", vec![sym("x"), num(1)])), "x_{1}");
    assert_eq!(latex(&f("Sequence", vec![sym("a"), sym("b")])), "a, b");
    assert_eq!(latex(&f("Not", vec![sym("p")])), "\\lnot p");
}

#[test]
fn test_arity_mismatch_falls_back_to_application() {
    assert_eq!(
        latex(&f("Divide", vec![num(1), num(2), num(3)])),
        "\\operatorname{Divide}(1, 2, 3)"
    );
}

#[test]
fn test_applications() {
    assert_eq!(latex(&f("f", vec![sym("x")])), "f(x)");
    assert_eq!(latex(&f("f", vec![sym("x"), num(1), num(0)])), "f(x, 1, 0)");
    assert_eq!(
        latex(&f("\\foo", vec![sym("x"), num(1), num(0)])),
        "\\foo{x}{1}{0}"
    );
    assert_eq!(latex(&f("Foo", vec![sym("x"), num(1)])), "\\operatorname{Foo}(x, 1)");
    assert_eq!(latex(&f("\\foo", vec![sym("a"), sym("b")])), "\\foo{a}{b}");
    assert_eq!(
        latex(&Expression::apply(
            f("g", vec![sym("f")]),
            vec![sym("x"), num(1), num(0)]
        )),
        "g(f)(x, 1, 0)"
    );
}

#[test]
fn test_placeholders_and_strings() {
    assert_eq!(latex(&Expression::Missing), "\\placeholder");
    assert_eq!(
        latex(&f("Add", vec![sym("x"), Expression::Missing])),
        "x+\\placeholder"
    );
    assert_eq!(latex(&Expression::string("a{b}")), "\\text{a\\{b\\}}");
}

#[test]
fn test_latex_literals() {
    assert_eq!(
        latex(&Expression::error("unknown-command", "\\foo[0]{1}")),
        "\\foo[0]{1}"
    );
    assert_eq!(
        latex(&f("LatexString", vec![Expression::string("\\alpha")])),
        "\\alpha"
    );
    assert_eq!(
        latex(&f(
            "LatexTokens",
            vec![
                Expression::string("\\frac"),
                Expression::string("<{>"),
                Expression::string("1"),
                Expression::string("<}>"),
                Expression::string("<{>"),
                sym("x"),
                Expression::string("<}>"),
            ]
        )),
        "\\frac{1}{x}"
    );
}

#[test]
fn test_dictionaries_are_not_serializable() {
    let mut entries = BTreeMap::new();
    entries.insert("a".to_string(), num(1));
    let serialized = LatexSyntax::new()
        .serialize(&Expression::Dictionary(entries))
        .unwrap();
    assert_eq!(serialized.latex, "");
    assert_eq!(serialized.diagnostics.len(), 1);
    assert_eq!(serialized.diagnostics[0].code(), "not-serializable");
}
