use dailyphrase::phrase::{Phrase, REQUIRED_FIELDS};
use dailyphrase::utils::parser::{parse, parse_as, parse_bytes};
use dailyphrase::PhraseError;
use serde_json::json;

#[test]
fn test_empty_input_mentions_emptiness() {
    for input in ["", "   ", "\n\t"] {
        let err = parse(input, None).unwrap_err();
        assert!(matches!(err, PhraseError::EmptyInput));
        assert!(err.to_string().to_lowercase().contains("empty"));
    }
}

#[test]
fn test_malformed_input_mentions_syntax() {
    let err = parse("{bad", None).unwrap_err();
    assert!(matches!(err, PhraseError::MalformedPayload { .. }));
    assert!(err.to_string().contains("Invalid JSON"));
    assert!(err.to_string().contains("{bad"));
}

#[test]
fn test_long_payload_preview_is_truncated() {
    let input = format!("{{{}", "x".repeat(500));
    match parse(&input, None).unwrap_err() {
        PhraseError::MalformedPayload { preview, .. } => {
            assert!(preview.ends_with("..."));
            assert_eq!(preview.chars().count(), 103);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_fields_are_named_exactly() {
    let err = parse(r#"{"a":1}"#, Some(&["a", "b"])).unwrap_err();
    match &err {
        PhraseError::MissingFields { missing, present } => {
            assert_eq!(missing, &vec!["b".to_string()]);
            assert_eq!(present, &vec!["a".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        "Missing required fields: b. Got keys: a"
    );
}

#[test]
fn test_whitespace_is_trimmed() {
    let value = parse(r#"  {"x":"y"}  "#, None).unwrap();
    assert_eq!(value, json!({"x": "y"}));
}

#[test]
fn test_binary_input_is_invalid() {
    let err = parse_bytes(&[0xff, 0xfe, 0x00], None).unwrap_err();
    assert!(matches!(err, PhraseError::InvalidInput(_)));
}

#[test]
fn test_parse_as_phrase() {
    let phrase: Phrase = parse_as(
        r#"{"category": "Gratitude", "message": "Thank the morning"}"#,
        REQUIRED_FIELDS,
    )
    .unwrap();
    assert_eq!(phrase, Phrase::new("Thank the morning", "Gratitude"));
    assert!(phrase.is_known_category());
}
