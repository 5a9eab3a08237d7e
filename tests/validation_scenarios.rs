mod common;

use common::fixtures::*;
use common::{document, validator, validator_with_policy};

use xsd_check::{
    Document, InMemoryResources, Mode, SchemaValidator, UnresolvedPolicy, ValidationError,
    ValidationOutcome, ValidatorSettings, ViolationKind,
};

fn note_project() -> InMemoryResources {
    InMemoryResources::new().with_file("src/main/resources/note.xsd", NOTE_XSD)
}

fn beans_project() -> InMemoryResources {
    InMemoryResources::new()
        .with_file("src/main/resources/beans.xsd", BEANS_XSD)
        .with_file("src/main/resources/util.xsd", UTIL_XSD)
}

#[tokio::test]
async fn test_no_schema_passes_in_lenient_mode() {
    let validator = validator(InMemoryResources::new(), Mode::Lenient);
    let outcome = validator
        .validate(&document("pom.xml", NO_SCHEMA))
        .await
        .unwrap();

    assert_eq!(outcome, ValidationOutcome::Pass);
}

#[tokio::test]
async fn test_no_schema_fails_in_strict_mode() {
    let validator = validator(InMemoryResources::new(), Mode::Strict);
    let outcome = validator
        .validate(&document("pom.xml", NO_SCHEMA))
        .await
        .unwrap();

    let violations = outcome.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::MissingSchema);
    assert_eq!(violations[0].line, 2);
    assert_eq!(violations[0].to_string(), "line 2: no schema declared");
}

#[tokio::test]
async fn test_single_schema_valid_document_passes() {
    let validator = validator(note_project(), Mode::Strict);
    let outcome = validator
        .validate(&document("note.xml", NOTE_VALID))
        .await
        .unwrap();

    assert_eq!(outcome, ValidationOutcome::Pass);
}

#[tokio::test]
async fn test_single_schema_missing_child_fails_with_line() {
    let validator = validator(note_project(), Mode::Lenient);
    let source = NOTE_MISSING_CHILD;
    let outcome = validator
        .validate(&document("note.xml", source))
        .await
        .unwrap();

    let violations = outcome.violations();
    assert!(!violations.is_empty());
    assert!(violations.iter().all(|v| v.kind == ViolationKind::Content));
    assert!(
        violations
            .iter()
            .all(|v| v.line >= 1 && v.line <= source.lines().count())
    );
    assert_eq!(violations[0].line, 5);
    assert!(violations[0].message.contains("body"));
}

#[tokio::test]
async fn test_two_namespaces_valid_under_union_grammar() {
    let validator = validator(beans_project(), Mode::Lenient);
    let outcome = validator
        .validate(&document("context.xml", BEANS_VALID))
        .await
        .unwrap();

    assert_eq!(outcome, ValidationOutcome::Pass);
}

#[tokio::test]
async fn test_two_namespaces_report_every_violation() {
    let validator = validator(beans_project(), Mode::Lenient);
    let outcome = validator
        .validate(&document("context.xml", BEANS_TWO_VIOLATIONS))
        .await
        .unwrap();

    let violations = outcome.violations();
    assert_eq!(violations.len(), 2, "violations: {:?}", violations);

    assert_eq!(violations[0].line, 5);
    assert!(violations[0].message.contains("noSuchAttribute"));

    assert_eq!(violations[1].line, 7);
    assert!(violations[1].message.contains("item"));
}

#[tokio::test]
async fn test_unreachable_schema_passes_in_both_modes() {
    for mode in [Mode::Lenient, Mode::Strict] {
        let validator = validator(InMemoryResources::new(), mode);
        let outcome = validator
            .validate(&document("context.xml", UNREACHABLE_SCHEMA))
            .await
            .unwrap();

        assert_eq!(outcome, ValidationOutcome::Pass, "mode {:?}", mode);
    }
}

#[tokio::test]
async fn test_unreachable_schema_fails_when_policy_requires_resolution() {
    let validator =
        validator_with_policy(InMemoryResources::new(), Mode::Lenient, UnresolvedPolicy::Fail);
    let outcome = validator
        .validate(&document("context.xml", UNREACHABLE_SCHEMA))
        .await
        .unwrap();

    let violations = outcome.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::UnresolvedSchema);
    assert!(violations[0].message.contains("http://www.google.com"));
}

#[tokio::test]
async fn test_unreachable_url_falls_back_to_local_copy() {
    let resources = InMemoryResources::new().with_file("src/main/resources/test.xsd", NOTE_XSD);
    let validator = validator(resources, Mode::Lenient);
    let content = NOTE_VALID.replace("note.xsd", "http://simple.com/test.xsd");

    let outcome = validator
        .validate(&document("note.xml", &content))
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Pass);

    let invalid = NOTE_MISSING_CHILD.replace("note.xsd", "http://simple.com/test.xsd");
    let outcome = validator
        .validate(&document("note.xml", &invalid))
        .await
        .unwrap();
    assert!(!outcome.is_pass());
}

#[tokio::test]
async fn test_remote_schema_is_used() {
    let resources = InMemoryResources::new().with_remote("http://example.com/note.xsd", NOTE_XSD);
    let validator = validator(resources, Mode::Lenient);
    let invalid = NOTE_MISSING_CHILD.replace("note.xsd", "http://example.com/note.xsd");

    let outcome = validator
        .validate(&document("note.xml", &invalid))
        .await
        .unwrap();
    assert_eq!(outcome.violations()[0].kind, ViolationKind::Content);
}

#[tokio::test]
async fn test_schema_found_under_resource_root() {
    let resources = InMemoryResources::new().with_file("schemas/note.xsd", NOTE_XSD);
    let mut settings = xsd_check::ValidatorSettings::default();
    settings.resolver.resource_roots.push("schemas".into());
    let validator = xsd_check::SchemaValidator::new(std::sync::Arc::new(resources), settings);

    let outcome = validator
        .validate(&document("note.xml", NOTE_MISSING_CHILD))
        .await
        .unwrap();
    assert!(!outcome.is_pass());
}

#[tokio::test]
async fn test_validation_is_idempotent() {
    let validator = validator(beans_project(), Mode::Lenient);
    let doc = document("context.xml", BEANS_TWO_VIOLATIONS);

    let first = validator.validate(&doc).await.unwrap();
    let second = validator.validate(&doc).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_odd_schema_location_pairs_are_reported() {
    let validator = validator(beans_project(), Mode::Lenient);
    let content = BEANS_VALID.replace(
        "ns:beans beans.xsd ns:util util.xsd",
        "ns:beans beans.xsd ns:util",
    );
    let outcome = validator
        .validate(&document("context.xml", &content))
        .await
        .unwrap();

    let violations = outcome.violations();
    assert!(
        violations
            .iter()
            .any(|v| v.kind == ViolationKind::ReferenceSyntax && v.line == 2)
    );
}

#[tokio::test]
async fn test_conflicting_bindings_are_fatal() {
    let resources = beans_project().with_file("src/main/resources/other-beans.xsd", UTIL_XSD);
    let validator = validator(resources, Mode::Lenient);
    let content = BEANS_VALID.replace(
        "ns:beans beans.xsd ns:util util.xsd",
        "ns:beans beans.xsd ns:beans other-beans.xsd",
    );

    let result = validator
        .validate(&document("context.xml", &content))
        .await;
    match result {
        Err(ValidationError::CompositionConflict { namespace, .. }) => {
            assert_eq!(namespace, "ns:beans")
        }
        other => panic!("Expected CompositionConflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_same_schema_bound_twice_is_not_a_conflict() {
    let validator = validator(beans_project(), Mode::Lenient);
    let content = BEANS_VALID.replace(
        "ns:beans beans.xsd ns:util util.xsd",
        "ns:beans beans.xsd ns:util util.xsd ns:beans ./beans.xsd",
    );

    let outcome = validator
        .validate(&document("context.xml", &content))
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Pass);
}

#[tokio::test]
async fn test_target_namespace_mismatch_is_reported() {
    let validator = validator(beans_project(), Mode::Lenient);
    let content = BEANS_VALID.replace(
        "ns:beans beans.xsd ns:util util.xsd",
        "ns:beans beans.xsd ns:util beans.xsd",
    );

    let outcome = validator
        .validate(&document("context.xml", &content))
        .await
        .unwrap();
    let violations = outcome.violations();
    assert!(
        violations
            .iter()
            .any(|v| v.kind == ViolationKind::SchemaMismatch)
    );
}

#[tokio::test]
async fn test_malformed_document_is_a_parse_error() {
    let validator = validator(note_project(), Mode::Lenient);
    let malformed = "<?xml version=\"1.0\"?>\n<note>\n  <to>Tove</from>\n</note>\n";

    match validator.validate(&document("note.xml", malformed)).await {
        Err(ValidationError::Parse { line, .. }) => assert_eq!(line, 3),
        other => panic!("Expected Parse error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_namespace_binding_to_namespaced_schema_fails() {
    let resources = note_project().with_file("src/main/resources/beans.xsd", BEANS_XSD);
    let validator = validator(resources, Mode::Lenient);
    let content = NOTE_VALID.replace("note.xsd", "beans.xsd");

    let outcome = validator
        .validate(&document("note.xml", &content))
        .await
        .unwrap();
    let violations = outcome.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::SchemaMismatch);
    assert!(violations[0].message.contains("ns:beans"));
}

fn split_note_project() -> InMemoryResources {
    InMemoryResources::new()
        .with_file("src/main/resources/note.xsd", NOTE_WITH_INCLUDE_XSD)
        .with_file("src/main/resources/types.xsd", NOTE_TYPES_XSD)
}

#[tokio::test]
async fn test_schema_including_a_sibling_file() {
    let validator = validator(split_note_project(), Mode::Strict);

    let outcome = validator
        .validate(&document("note.xml", NOTE_VALID))
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Pass);

    let outcome = validator
        .validate(&document("note.xml", NOTE_MISSING_CHILD))
        .await
        .unwrap();
    let violations = outcome.violations();
    assert_eq!(violations[0].kind, ViolationKind::Content);
    assert_eq!(violations[0].line, 5);
}

#[tokio::test]
async fn test_remote_schema_including_a_relative_location() {
    let resources = InMemoryResources::new()
        .with_remote("http://example.com/xsd/note.xsd", NOTE_WITH_INCLUDE_XSD)
        .with_remote("http://example.com/xsd/types.xsd", NOTE_TYPES_XSD);
    let validator = validator(resources, Mode::Lenient);

    let valid = NOTE_VALID.replace("note.xsd", "http://example.com/xsd/note.xsd");
    let outcome = validator
        .validate(&document("note.xml", &valid))
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Pass);

    let invalid = NOTE_MISSING_CHILD.replace("note.xsd", "http://example.com/xsd/note.xsd");
    let outcome = validator
        .validate(&document("note.xml", &invalid))
        .await
        .unwrap();
    assert_eq!(outcome.violations()[0].kind, ViolationKind::Content);
}

#[tokio::test]
async fn test_uncompilable_local_copy_counts_as_unresolved() {
    let resources =
        InMemoryResources::new().with_file("src/main/resources/test.xsd", PROJECT_BROKEN_XSD);

    let outcome = validator(resources.clone(), Mode::Lenient)
        .validate(&document("valid4.xml", PROJECT_NO_NAMESPACE))
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Pass);

    let outcome = validator_with_policy(resources, Mode::Lenient, UnresolvedPolicy::Fail)
        .validate(&document("valid4.xml", PROJECT_NO_NAMESPACE))
        .await
        .unwrap();
    let violations = outcome.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::UnresolvedSchema);
    assert!(violations[0].message.contains("http://simple.com/test.xsd"));
}

#[tokio::test]
async fn test_uncompilable_schema_found_directly_is_still_fatal() {
    let resources =
        InMemoryResources::new().with_file("src/main/resources/test.xsd", PROJECT_BROKEN_XSD);
    let content = PROJECT_NO_NAMESPACE.replace("http://simple.com/test.xsd", "test.xsd");

    let result = validator(resources, Mode::Lenient)
        .validate(&document("valid4.xml", &content))
        .await;
    assert!(matches!(
        result,
        Err(ValidationError::SchemaCompilation { .. })
    ));
}

#[tokio::test]
async fn test_latin1_document_against_utf8_schema() {
    let validator = validator(
        InMemoryResources::new().with_file("src/main/resources/word.xsd", WORD_XSD),
        Mode::Strict,
    );
    let latin1 = |word: &[u8]| {
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<w xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:noNamespaceSchemaLocation=\"word.xsd\">".to_vec();
        bytes.extend_from_slice(word);
        bytes.extend_from_slice(b"</w>\n");
        Document::from_bytes("src/main/resources/word.xml", bytes)
    };

    let outcome = validator.validate(&latin1(b"caf\xe9")).await.unwrap();
    assert_eq!(outcome, ValidationOutcome::Pass);

    let outcome = validator.validate(&latin1(b"cafe")).await.unwrap();
    assert_eq!(outcome.violations()[0].kind, ViolationKind::Content);
    assert_eq!(outcome.violations()[0].line, 2);
}

fn formatting_validator() -> SchemaValidator {
    let settings = ValidatorSettings {
        check_formatting: true,
        ..ValidatorSettings::default()
    };
    SchemaValidator::new(std::sync::Arc::new(InMemoryResources::new()), settings)
}

#[tokio::test]
async fn test_single_line_document_fails_formatting_check() {
    let outcome = formatting_validator()
        .validate(&document("almost-valid.xml", CHANGES_ONE_LINE))
        .await
        .unwrap();

    let violations = outcome.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::Formatting);
    assert_eq!(violations[0].line, 1);
}

#[tokio::test]
async fn test_indented_document_passes_formatting_check() {
    let outcome = formatting_validator()
        .validate(&document("valid.xml", CHANGES_INDENTED))
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Pass);
}

#[tokio::test]
async fn test_formatting_is_not_checked_by_default() {
    let outcome = validator(InMemoryResources::new(), Mode::Lenient)
        .validate(&document("almost-valid.xml", CHANGES_ONE_LINE))
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Pass);
}
