//! Binary-level smoke tests: argument handling, formats, exit codes.

use std::process::Command;
use tempfile::TempDir;

const MENU: &str = r#"<breakfast_menu>
 <food><name>Belgian Waffles</name><price>5.95</price><calories>650</calories></food>
 <food><name>French Toast</name><price>4.50</price><calories>600</calories></food>
</breakfast_menu>"#;

fn arx_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_arx"))
}

fn write_menu(dir: &TempDir) -> String {
    let path = dir.path().join("menu.xml");
    std::fs::write(&path, MENU).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_query_text_output() {
    let dir = TempDir::new().unwrap();
    let path = write_menu(&dir);

    let output = arx_bin()
        .args([
            "query",
            &format!("SELECT breakfast_menu/food/name FROM \"{path}\""),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("breakfast_menu/food/name"));
    assert!(stdout.contains("Belgian Waffles"));
    assert!(stdout.trim_end().ends_with("2 row(s) returned."));
}

#[test]
fn test_query_csv_to_file() {
    let dir = TempDir::new().unwrap();
    let path = write_menu(&dir);
    let out = dir.path().join("result.csv");

    let output = arx_bin()
        .args([
            "query",
            &format!(
                "SELECT f/name AS name, f/price AS price FROM \"{path}\" FOR f IN breakfast_menu/food"
            ),
            "-f",
            "csv",
            "-o",
            out.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let csv = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "name,price");
    assert_eq!(lines[1], "Belgian Waffles,5.95");
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_query_requires_query_or_interactive() {
    let output = arx_bin().args(["query"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Query is required"));
}

#[test]
fn test_invalid_format_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_menu(&dir);

    let output = arx_bin()
        .args([
            "query",
            &format!("SELECT x FROM \"{path}\""),
            "-f",
            "yaml",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown format"));
}

#[test]
fn test_parse_error_carries_code_and_location() {
    let output = arx_bin()
        .args(["query", "SELECT FROM 'x.xml'"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ARX-01001"), "stderr: {stderr}");
}

#[test]
fn test_analyze_text_output() {
    let dir = TempDir::new().unwrap();
    let path = write_menu(&dir);

    let output = arx_bin().args(["analyze", &path]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("root <breakfast_menu>"));
    assert!(stdout.contains("1 file(s) analyzed."));
}

#[test]
fn test_describe_via_binary() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("s_P26.xsd"),
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="S21_G00_30">
    <xs:complexType><xs:sequence>
      <xs:element name="S21_G00_30_001" type="NIR">
        <xs:annotation><xs:documentation>Numero d'inscription</xs:documentation></xs:annotation>
      </xs:element>
    </xs:sequence></xs:complexType>
  </xs:element>
</xs:schema>"#,
    )
    .unwrap();

    let output = arx_bin()
        .args(["describe", "30.001", "--xsd", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("S21_G00_30_001"));
    assert!(stdout.contains("Numero d'inscription"));

    let output = arx_bin()
        .args(["describe", "99.999", "--xsd", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ARX-22002"));
}

#[test]
fn test_check_via_binary_exit_codes() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("s_P26.xsd"),
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="S21_G00_30">
    <xs:complexType><xs:sequence>
      <xs:element name="S21_G00_30_002" type="xs:string" minOccurs="1"/>
    </xs:sequence></xs:complexType>
  </xs:element>
</xs:schema>"#,
    )
    .unwrap();

    let good = dir.path().join("good.xml");
    std::fs::write(
        &good,
        "<DSN><S21_G00_30><S21_G00_30_002>Durand</S21_G00_30_002></S21_G00_30></DSN>",
    )
    .unwrap();
    let bad = dir.path().join("bad_doc.xml");
    std::fs::write(&bad, "<DSN><S21_G00_30></S21_G00_30></DSN>").unwrap();

    let xsd = dir.path().to_str().unwrap().to_string();
    let output = arx_bin()
        .args(["check", good.to_str().unwrap(), "--xsd", &xsd])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output = arx_bin()
        .args(["check", bad.to_str().unwrap(), "--xsd", &xsd])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ARX-06004"));
}

#[test]
fn test_completions_generate() {
    let output = arx_bin().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("arx"));
}

#[test]
fn test_schema_list_and_unknown() {
    let output = arx_bin().args(["schema"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json.get("query").is_some());

    let output = arx_bin().args(["schema", "bogus"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}
