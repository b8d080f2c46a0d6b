use parcelscan_cli::commands::classify;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_collect_codes_from_args_and_file() {
    let td = tempdir().unwrap();
    let input_path = td.path().join("codes.txt");
    fs::write(&input_path, "TBA123456789012\n\n   \n 123456789012 \n").unwrap();

    let codes = classify::collect_codes(
        &["1Z999AA10123456784".to_string(), "  ".to_string()],
        Some(input_path.to_str().unwrap()),
    )
    .unwrap();

    assert_eq!(
        codes,
        vec!["1Z999AA10123456784", "TBA123456789012", "123456789012"]
    );
}

#[test]
fn test_classify_all_resolves_carriers() {
    let codes = vec![
        "1z999aa10123456784".to_string(),
        "9400111899223344556677".to_string(),
        "hello".to_string(),
    ];
    let matches = classify::classify_all(&codes);

    let carriers: Vec<_> = matches.iter().map(|m| m.carrier.code).collect();
    assert_eq!(carriers, vec!["ups", "usps", "unknown"]);
    assert_eq!(matches[0].tracking_code, "1Z999AA10123456784");
    assert!(matches[2].track_url.is_none());
}

#[test]
fn test_execute_text_and_json() {
    let codes = vec!["123456789012".to_string()];
    assert!(classify::execute(&codes, None, false).is_ok());
    assert!(classify::execute(&codes, None, true).is_ok());
}

#[test]
fn test_execute_without_codes_fails() {
    assert!(classify::execute(&[], None, false).is_err());
}

#[test]
fn test_missing_input_file_fails() {
    let td = tempdir().unwrap();
    let missing = td.path().join("missing.txt");
    let result = classify::collect_codes(&[], Some(missing.to_str().unwrap()));
    assert!(result.is_err());
}
