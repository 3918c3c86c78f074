use std::io::Write;

use mathjson_latex::error::ConfigError;
use mathjson_latex::number::NumberNotation;
use mathjson_latex::{Expression, LatexOptions, LatexSyntax, TokenDisposition, UnknownTokenPolicy};

#[test]
fn test_options_from_json() {
    let options = LatexOptions::from_json_str(
        r#"{
            "parse": { "parseUnknownToken": "error", "maxDepth": 64 },
            "serialize": { "multiply": "\\cdot", "precision": 6, "notation": "scientific" }
        }"#,
    )
    .unwrap();
    assert!(matches!(
        options.parse.parse_unknown_token,
        UnknownTokenPolicy::Always(TokenDisposition::Error)
    ));
    assert_eq!(options.parse.max_depth, 64);
    assert!(options.parse.parse_arguments_of_unknown_latex_commands);
    assert_eq!(options.serialize.multiply, "\\cdot");
    assert_eq!(options.serialize.number.precision, 6);
    assert_eq!(options.serialize.number.notation, NumberNotation::Scientific);
    assert_eq!(options.serialize.number.decimal_marker, ".");
}

#[test]
fn test_options_from_yaml_with_dictionary() {
    let options = LatexOptions::from_yaml_str(
        r#"
serialize:
  groupSeparator: ""
dictionary:
  - name: Union
    trigger: "\\cup"
    kind: infix
    precedence: 350
    variadic: true
  - name: Tau
    trigger: "\\tau"
    latex: "\\tau"
"#,
    )
    .unwrap();
    assert_eq!(options.dictionary.len(), 2);

    let syntax = LatexSyntax::with_options(options).unwrap();
    let parsed = syntax.parse("A\\cup B\\cup C").unwrap();
    assert_eq!(
        parsed.expression,
        Expression::function(
            "Union",
            vec![
                Expression::symbol("A"),
                Expression::symbol("B"),
                Expression::symbol("C")
            ]
        )
    );
    assert_eq!(syntax.serialize(&parsed.expression).unwrap().latex, "A\\cup B\\cup C");
    assert_eq!(
        syntax.serialize(&Expression::number(1234567.0)).unwrap().latex,
        "1234567"
    );
}

#[test]
fn test_options_from_files() {
    let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(json, r#"{{"parse": {{"parseArgumentsOfUnknownLatexCommands": false}}}}"#).unwrap();
    let options = LatexOptions::from_path(json.path()).unwrap();
    assert!(!options.parse.parse_arguments_of_unknown_latex_commands);

    let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(yaml, "serialize:\n  invisibleMultiply: \"\\\\,\"").unwrap();
    let options = LatexOptions::from_path(yaml.path()).unwrap();
    assert_eq!(options.serialize.invisible_multiply, "\\,");
}

#[test]
fn test_invalid_options() {
    assert!(matches!(
        LatexOptions::from_json_str(r#"{"parse": {"parseUnknownToken": "sometimes"}}"#),
        Err(ConfigError::Json(_))
    ));
    assert!(matches!(
        LatexOptions::from_yaml_str("parse: [unclosed"),
        Err(ConfigError::Yaml(_))
    ));
    assert!(matches!(
        LatexOptions::from_path("/nonexistent/options.json"),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn test_invalid_dictionary_in_options() {
    let options = LatexOptions::from_json_str(
        r#"{"dictionary": [{"name": "Loop", "aliasOf": "Loop"}]}"#,
    )
    .unwrap();
    assert!(LatexSyntax::with_options(options).is_err());
}
