mod test_support;

use serde_json::json;
use test_support::{open_workspace, request_ok, submit, temp_dir};

#[test]
fn repeated_reads_hit_the_cache_until_a_write() {
    let workspace = temp_dir("gradesheet-analytics-cache");
    let mut sc = open_workspace(&workspace);
    let _ = submit(&mut sc, "1", "Ардабек Ерлан", "Физика", 90.0);
    let _ = submit(&mut sc, "2", "Ардабек Ерлан", "Химия", 70.0);

    let first = request_ok(&mut sc, "3", "analytics.summary", json!({}));
    assert_eq!(first["cached"], json!(false));
    let second = request_ok(&mut sc, "4", "analytics.summary", json!({}));
    assert_eq!(second["cached"], json!(true));
    assert_eq!(first["summary"], second["summary"]);
    assert_eq!(first["summary"]["totalEntries"], json!(2));

    let student = &first["summary"]["students"][0];
    assert_eq!(student["student"], json!("Ардабек Ерлан"));
    assert_eq!(student["average"], json!(80.0));

    // A write through this process is visible on the next read.
    let _ = submit(&mut sc, "5", "Алпысбаев Саят", "Физика", 60.0);
    let third = request_ok(&mut sc, "6", "analytics.summary", json!({}));
    assert_eq!(third["cached"], json!(false));
    assert_eq!(third["summary"]["totalEntries"], json!(3));
    assert_eq!(third["summary"]["recent"].as_array().map(|a| a.len()), Some(3));
}

#[test]
fn explicit_invalidation_forces_a_fetch() {
    let workspace = temp_dir("gradesheet-cache-invalidate");
    let mut sc = open_workspace(&workspace);
    let _ = request_ok(&mut sc, "1", "sheet.read", json!({}));
    let cached = request_ok(&mut sc, "2", "sheet.read", json!({}));
    assert_eq!(cached["cached"], json!(true));

    let inv = request_ok(&mut sc, "3", "cache.invalidate", json!({}));
    assert_eq!(inv["invalidated"], json!(true));
    let fresh = request_ok(&mut sc, "4", "sheet.read", json!({}));
    assert_eq!(fresh["cached"], json!(false));
}

#[test]
fn writes_from_another_process_are_hidden_until_the_ttl_or_invalidation() {
    let workspace = temp_dir("gradesheet-cache-staleness");
    let mut reader = open_workspace(&workspace);
    let mut writer = open_workspace(&workspace);

    let before = request_ok(&mut reader, "1", "analytics.summary", json!({}));
    assert_eq!(before["summary"]["totalEntries"], json!(0));

    let _ = submit(&mut writer, "w1", "Ардабек Ерлан", "Физика", 90.0);

    let stale = request_ok(&mut reader, "2", "analytics.summary", json!({}));
    assert_eq!(stale["cached"], json!(true));
    assert_eq!(stale["summary"]["totalEntries"], json!(0));

    let _ = request_ok(&mut reader, "3", "cache.invalidate", json!({}));
    let fresh = request_ok(&mut reader, "4", "analytics.summary", json!({}));
    assert_eq!(fresh["summary"]["totalEntries"], json!(1));
}
