use jbmon::domain::{ConfigError, FunctionName};
use jbmon::engine::{ObservationPolicy, PolicyTable};
use std::io::Write;

#[test]
fn test_policy_file_overlays_builtin_table() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "default": "work-only",
            "functions": {{
                "av_packet_ref": "signed-return",
                "demux": {{ "counts_work": true, "outcome": "signed-return" }}
            }}
        }}"#
    )
    .unwrap();

    let table = PolicyTable::load(file.path()).unwrap();
    assert_eq!(table.default_policy(), ObservationPolicy::WORK_ONLY);
    assert_eq!(table.lookup(&FunctionName::new("av_packet_ref")), ObservationPolicy::SIGNED_RETURN);
    assert_eq!(table.lookup(&FunctionName::new("demux")), ObservationPolicy::SIGNED_RETURN);
    // Untouched built-in entries survive
    assert_eq!(
        table.lookup(&FunctionName::new("jitterbuffer_put")),
        ObservationPolicy::WORK_ONLY
    );
    assert_eq!(table.lookup(&FunctionName::new("unlisted")), ObservationPolicy::WORK_ONLY);
}

#[test]
fn test_invalid_policy_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "functions": {{ "decode": "sometimes" }} }}"#).unwrap();

    let err = PolicyTable::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::PolicyFileInvalid { .. }));
}

#[test]
fn test_missing_policy_file() {
    let err = PolicyTable::load(std::path::Path::new("/nonexistent/policies.json")).unwrap_err();
    assert!(matches!(err, ConfigError::PolicyFileUnreadable { .. }));
}
