//! End-to-end execution tests over real files on disk.

use arx::errors::codes;
use arx::executor::Executor;
use arx::parser::{Parser, Query};
use arx::resultset::ResultSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const BREAKFAST: &str = r#"<breakfast_menu>
 <food><name>Belgian Waffles</name><price>5.95</price><calories>650</calories></food>
 <food><name>French Toast</name><price>4.50</price><calories>600</calories></food>
 <food><name>Homestyle</name><price>6.95</price><calories>950</calories></food>
</breakfast_menu>"#;

const BOOKS: &str = r#"<bookstore>
 <book category="web">
  <title lang="en">XQuery Kick Start</title>
  <author>McGovern</author>
  <author>Bothner</author>
  <author>Cagle</author>
  <year>2003</year>
  <price>49.99</price>
 </book>
 <book category="children">
  <title lang="en">Learning XML</title>
  <author>Ray</author>
  <year>2003</year>
  <price>39.95</price>
 </book>
</bookstore>"#;

const COMPANY: &str = r#"<company>
 <department>
  <name>Engineering</name>
  <employee><name>Ada</name><salary>5000</salary></employee>
  <employee><name>Grace</name><salary>5500</salary></employee>
 </department>
 <department>
  <name>Sales</name>
  <employee><name>Marc</name><salary>4000</salary></employee>
 </department>
</company>"#;

fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn parse(input: &str) -> Query {
    Parser::parse(input).unwrap().query
}

fn run(input: &str) -> ResultSet {
    Executor::new(&parse(input)).execute().unwrap()
}

fn cells(result: &ResultSet) -> Vec<Vec<String>> {
    result
        .rows
        .iter()
        .map(|row| {
            (0..result.columns.len())
                .map(|i| row.value(i).to_string())
                .collect()
        })
        .collect()
}

#[test]
fn test_scenario_basic_projection() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "breakfast.xml", BREAKFAST);

    let result = run(&format!(
        "SELECT breakfast_menu/food/name FROM \"{path}\" WHERE breakfast_menu/food/calories < 700"
    ));
    assert_eq!(result.columns, vec!["breakfast_menu/food/name"]);
    assert_eq!(
        cells(&result),
        vec![vec!["Belgian Waffles"], vec!["French Toast"]]
    );
    assert_eq!(result.row_count(), 2);
}

#[test]
fn test_scenario_nested_for() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "books.xml", BOOKS);

    let result = run(&format!(
        "SELECT b/title, a FROM \"{path}\" FOR b IN bookstore/book FOR a IN b/author"
    ));
    assert_eq!(result.row_count(), 4);
    assert_eq!(
        cells(&result),
        vec![
            vec!["XQuery Kick Start", "McGovern"],
            vec!["XQuery Kick Start", "Bothner"],
            vec!["XQuery Kick Start", "Cagle"],
            vec!["Learning XML", "Ray"],
        ]
    );
}

#[test]
fn test_scenario_group_by_count() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "company.xml", COMPANY);

    let result = run(&format!(
        "SELECT d/name AS department, COUNT(e) AS employee_count FROM \"{path}\" \
         FOR d IN company/department FOR e IN d/employee GROUP BY d/name"
    ));
    assert_eq!(result.columns, vec!["department", "employee_count"]);
    assert_eq!(
        cells(&result),
        vec![vec!["Engineering", "2"], vec!["Sales", "1"]]
    );
}

#[test]
fn test_scenario_missing_file() {
    let err = Executor::new(&parse("SELECT x FROM \"nope.xml\""))
        .execute()
        .unwrap_err();
    assert_eq!(err.code, codes::FILE_NOT_FOUND);
    assert_eq!(
        err.to_string(),
        "ARX-02002 [Error] File not found path=nope.xml"
    );
}

#[test]
fn test_column_order_matches_select_order() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "books.xml", BOOKS);

    let result = run(&format!(
        "SELECT b/price, FILE_NAME, b/title AS t FROM \"{path}\" FOR b IN bookstore/book"
    ));
    assert_eq!(result.columns, vec!["b/price", "FILE_NAME", "t"]);
    assert_eq!(
        cells(&result)[0],
        vec!["49.99", "books.xml", "XQuery Kick Start"]
    );
}

#[test]
fn test_for_cartesian_size_without_where() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<root>
      <a><v>1</v></a><a><v>2</v></a>
      <b><w>x</w></b><b><w>y</w></b><b><w>z</w></b>
    </root>"#;
    let path = write_file(&dir, "grid.xml", xml);

    let result = run(&format!(
        "SELECT p/v, q/w FROM \"{path}\" FOR p IN root/a FOR q IN root/b"
    ));
    // two independent FOR clauses: |a| * |b| rows
    assert_eq!(result.row_count(), 6);
}

#[test]
fn test_position_variable() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "books.xml", BOOKS);

    let result = run(&format!(
        "SELECT i, b/title FROM \"{path}\" FOR b IN bookstore/book AT i"
    ));
    assert_eq!(
        cells(&result),
        vec![
            vec!["1", "XQuery Kick Start"],
            vec!["2", "Learning XML"],
        ]
    );
}

#[test]
fn test_attribute_selection() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "books.xml", BOOKS);

    let result = run(&format!(
        "SELECT b@category FROM \"{path}\" FOR b IN bookstore/book"
    ));
    assert_eq!(cells(&result), vec![vec!["web"], vec!["children"]]);
}

#[test]
fn test_where_on_bound_variable() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "books.xml", BOOKS);

    let result = run(&format!(
        "SELECT b/title FROM \"{path}\" FOR b IN bookstore/book WHERE b/price > 40"
    ));
    assert_eq!(cells(&result), vec![vec!["XQuery Kick Start"]]);
}

#[test]
fn test_numeric_comparison_beats_lexicographic() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<data><m><v>100</v></m><m><v>20</v></m></data>"#;
    let path = write_file(&dir, "nums.xml", xml);

    let result = run(&format!(
        "SELECT m/v FROM \"{path}\" FOR m IN data/m WHERE m/v > 50"
    ));
    // "100" > "20" numerically even though it sorts first as a string
    assert_eq!(cells(&result), vec![vec!["100"]]);
}

#[test]
fn test_like_wildcards_and_regex() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "breakfast.xml", BREAKFAST);

    let result = run(&format!(
        "SELECT f/name FROM \"{path}\" FOR f IN breakfast_menu/food WHERE f/name LIKE 'Belgian%'"
    ));
    assert_eq!(cells(&result), vec![vec!["Belgian Waffles"]]);

    let result = run(&format!(
        "SELECT f/name FROM \"{path}\" FOR f IN breakfast_menu/food WHERE f/name LIKE '/^F.*t$/'"
    ));
    assert_eq!(cells(&result), vec![vec!["French Toast"]]);
}

#[test]
fn test_in_and_is_null() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "books.xml", BOOKS);

    let result = run(&format!(
        "SELECT b/title FROM \"{path}\" FOR b IN bookstore/book WHERE b/price IN (39.95, 10)"
    ));
    assert_eq!(cells(&result), vec![vec!["Learning XML"]]);

    // no book carries an isbn element
    let result = run(&format!(
        "SELECT b/title FROM \"{path}\" FOR b IN bookstore/book WHERE b/isbn IS NULL"
    ));
    assert_eq!(result.row_count(), 2);

    let result = run(&format!(
        "SELECT b/title FROM \"{path}\" FOR b IN bookstore/book WHERE b/isbn IS NOT NULL"
    ));
    assert_eq!(result.row_count(), 0);
}

#[test]
fn test_not_and_or_combinations() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "breakfast.xml", BREAKFAST);

    let result = run(&format!(
        "SELECT f/name FROM \"{path}\" FOR f IN breakfast_menu/food \
         WHERE NOT f/calories < 700 OR f/price = 4.50"
    ));
    assert_eq!(
        cells(&result),
        vec![vec!["French Toast"], vec!["Homestyle"]]
    );
}

#[test]
fn test_partial_path_union() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "breakfast.xml", BREAKFAST);

    let result = run(&format!("SELECT .name FROM \"{path}\""));
    assert_eq!(result.row_count(), 3);
}

#[test]
fn test_distinct_idempotent() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<r><i><c>red</c></i><i><c>red</c></i><i><c>blue</c></i></r>"#;
    let path = write_file(&dir, "colors.xml", xml);

    let query = format!("SELECT DISTINCT i/c FROM \"{path}\" FOR i IN r/i");
    let once = run(&query);
    assert_eq!(cells(&once), vec![vec!["red"], vec!["blue"]]);

    // applying DISTINCT to an already-distinct set changes nothing
    let twice = run(&query);
    assert_eq!(cells(&once), cells(&twice));
}

#[test]
fn test_order_by_stability_and_direction() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<r>
      <i><g>b</g><n>first</n></i>
      <i><g>a</g><n>second</n></i>
      <i><g>b</g><n>third</n></i>
    </r>"#;
    let path = write_file(&dir, "sortme.xml", xml);

    let result = run(&format!(
        "SELECT i/g, i/n FROM \"{path}\" FOR i IN r/i ORDER BY i/g"
    ));
    // equal keys keep document order: stable sort
    assert_eq!(
        cells(&result),
        vec![
            vec!["a", "second"],
            vec!["b", "first"],
            vec!["b", "third"],
        ]
    );

    let result = run(&format!(
        "SELECT i/g, i/n FROM \"{path}\" FOR i IN r/i ORDER BY i/g DESC"
    ));
    assert_eq!(cells(&result)[0], vec!["b", "first"]);
}

#[test]
fn test_order_by_numeric() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "breakfast.xml", BREAKFAST);

    let result = run(&format!(
        "SELECT f/name FROM \"{path}\" FOR f IN breakfast_menu/food ORDER BY f/price DESC"
    ));
    assert_eq!(
        cells(&result),
        vec![
            vec!["Homestyle"],
            vec!["Belgian Waffles"],
            vec!["French Toast"],
        ]
    );
}

#[test]
fn test_limit_offset_commute() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<r><i><n>1</n></i><i><n>2</n></i><i><n>3</n></i><i><n>4</n></i><i><n>5</n></i></r>"#;
    let path = write_file(&dir, "five.xml", xml);

    // offset(2) ∘ limit(2+2) == limit(2) ∘ offset(2)
    let a = run(&format!(
        "SELECT i/n FROM \"{path}\" FOR i IN r/i LIMIT 2 OFFSET 2"
    ));
    assert_eq!(cells(&a), vec![vec!["3"], vec!["4"]]);
}

#[test]
fn test_aggregate_functions_over_groups() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "company.xml", COMPANY);

    let result = run(&format!(
        "SELECT d/name, SUM(e/salary), AVG(e/salary), MIN(e/salary), MAX(e/salary) \
         FROM \"{path}\" FOR d IN company/department FOR e IN d/employee GROUP BY d/name"
    ));
    assert_eq!(
        cells(&result),
        vec![
            vec!["Engineering", "10500", "5250", "5000", "5500"],
            vec!["Sales", "4000", "4000", "4000", "4000"],
        ]
    );
}

#[test]
fn test_having_filters_buckets() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "company.xml", COMPANY);

    let result = run(&format!(
        "SELECT d/name, COUNT(e) FROM \"{path}\" \
         FOR d IN company/department FOR e IN d/employee \
         GROUP BY d/name HAVING COUNT(e) > 1"
    ));
    assert_eq!(cells(&result), vec![vec!["Engineering", "2"]]);
}

#[test]
fn test_having_aggregate_not_in_select() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "company.xml", COMPANY);

    let result = run(&format!(
        "SELECT d/name FROM \"{path}\" \
         FOR d IN company/department FOR e IN d/employee \
         GROUP BY d/name HAVING SUM(e/salary) < 5000"
    ));
    assert_eq!(cells(&result), vec![vec!["Sales"]]);
}

#[test]
fn test_directory_discovery_sorted_by_name() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "b.xml", "<r><v>2</v></r>");
    write_file(&dir, "a.xml", "<r><v>1</v></r>");
    write_file(&dir, "ignored.txt", "not xml");

    let result = run(&format!(
        "SELECT FILE_NAME, .v FROM \"{}\" ORDER BY FILE_NAME",
        dir.path().display()
    ));
    assert_eq!(cells(&result), vec![vec!["a.xml", "1"], vec!["b.xml", "2"]]);
}

#[test]
fn test_bad_file_among_good_ones_is_a_warning() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "good.xml", "<r><v>1</v></r>");
    write_file(&dir, "bad.xml", "this is not xml at all");

    let result = run(&format!(
        "SELECT FILE_NAME, .v FROM \"{}\" ORDER BY FILE_NAME",
        dir.path().display()
    ));
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.stats.files_failed, 1);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.code == codes::XML_PARSE_FAILED));
}

#[test]
fn test_all_files_failing_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "one.xml", "garbage");

    let err = Executor::new(&parse(&format!(
        "SELECT .v FROM \"{}\"",
        dir.path().display()
    )))
    .execute()
    .unwrap_err();
    assert_eq!(err.code, codes::XML_PARSE_FAILED);
}

#[test]
fn test_parallel_execution_matches_sequential() {
    let dir = TempDir::new().unwrap();
    // 12 files crosses the parallel threshold
    for i in 0..12 {
        std::fs::write(
            dir.path().join(format!("f{i:02}.xml")),
            format!("<r><v>{i}</v></r>"),
        )
        .unwrap();
    }

    let query = format!(
        "SELECT FILE_NAME, .v FROM \"{}\" ORDER BY FILE_NAME",
        dir.path().display()
    );
    let expected: Vec<Vec<String>> = (0..12)
        .map(|i| vec![format!("f{i:02}.xml"), i.to_string()])
        .collect();

    for _ in 0..10 {
        let result = run(&query);
        assert_eq!(cells(&result), expected);
    }
}

#[test]
fn test_parallel_multiset_equivalence_without_order_by() {
    let dir = TempDir::new().unwrap();
    for i in 0..8 {
        std::fs::write(
            dir.path().join(format!("f{i}.xml")),
            format!("<r><v>{i}</v></r>"),
        )
        .unwrap();
    }

    let query = format!("SELECT .v FROM \"{}\"", dir.path().display());
    let mut seen: Vec<String> = run(&query)
        .rows
        .iter()
        .map(|r| r.value(0).to_string())
        .collect();
    seen.sort();
    let expected: Vec<String> = (0..8).map(|i| i.to_string()).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_cancellation_before_start_returns_empty_with_warning() {
    let dir = TempDir::new().unwrap();
    for i in 0..6 {
        std::fs::write(dir.path().join(format!("f{i}.xml")), "<r><v>0</v></r>").unwrap();
    }

    let flag = Arc::new(AtomicBool::new(true));
    let query = parse(&format!("SELECT .v FROM \"{}\"", dir.path().display()));
    let result = Executor::new(&query)
        .with_cancel_flag(flag.clone())
        .execute()
        .unwrap();

    assert_eq!(result.row_count(), 0);
    assert!(result.stats.cancelled);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.code == codes::QUERY_CANCELLED));
    assert!(flag.load(Ordering::Relaxed));
}

#[test]
fn test_progress_sink_sees_every_file() {
    let dir = TempDir::new().unwrap();
    for i in 0..7 {
        std::fs::write(dir.path().join(format!("f{i}.xml")), "<r><v>0</v></r>").unwrap();
    }

    let seen = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let seen_cb = seen.clone();
    let query = parse(&format!("SELECT .v FROM \"{}\"", dir.path().display()));
    Executor::new(&query)
        .with_progress(move |done, total| {
            assert_eq!(total, 7);
            seen_cb.fetch_max(done, Ordering::Relaxed);
        })
        .execute()
        .unwrap();
    assert_eq!(seen.load(Ordering::Relaxed), 7);
}

#[test]
fn test_compressed_input_file() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("books.xml.gz");
    let mut enc = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    enc.write_all(BOOKS.as_bytes()).unwrap();
    enc.finish().unwrap();

    let result = run(&format!(
        "SELECT b/title FROM \"{}\" FOR b IN bookstore/book",
        path.display()
    ));
    assert_eq!(result.row_count(), 2);
}

#[test]
fn test_ambiguous_partial_path_verbose_warning() {
    let dir = TempDir::new().unwrap();
    let xml = r#"<root>
      <current><item><name>widget</name></item></current>
      <archive><item><name>gadget</name></item></archive>
    </root>"#;
    let path = write_file(&dir, "amb.xml", xml);

    let query = parse(&format!("SELECT .item/name FROM \"{path}\""));
    let result = Executor::new(&query).with_verbose(true).execute().unwrap();
    assert_eq!(cells(&result), vec![vec!["widget"]]);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.code == codes::AMBIGUOUS_PARTIAL_PATH));
}

#[test]
fn test_empty_directory_error() {
    let dir = TempDir::new().unwrap();
    let err = Executor::new(&parse(&format!(
        "SELECT x FROM \"{}\"",
        dir.path().display()
    )))
    .execute()
    .unwrap_err();
    assert_eq!(err.code, codes::NO_XML_FILES);
}

#[test]
fn test_file_name_only_projection() {
    let dir = TempDir::new().unwrap();
    write_file(&dir, "only.xml", "<r/>");

    let result = run(&format!(
        "SELECT FILE_NAME FROM \"{}\"",
        dir.path().join("only.xml").display()
    ));
    assert_eq!(cells(&result), vec![vec!["only.xml"]]);
}
