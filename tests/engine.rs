use dnsview::engine::RefreshOutcome;
use dnsview::{Config, DashboardEngine, RecordDTO};
use serde_json::{json, Value};

fn record(domain: &str, ip: &str, time: &str, length: Value) -> RecordDTO {
    RecordDTO {
        domain: Some(domain.to_string()),
        ip: Some(ip.to_string()),
        time: Some(time.to_string()),
        protocol: Some("UDP".to_string()),
        length: Some(length),
    }
}

fn at(second: usize) -> String {
    format!("2024-03-01 10:{:02}:{:02}", second / 60, second % 60)
}

#[test]
fn two_records_for_one_domain_aggregate() {
    let mut engine = DashboardEngine::default();
    let report = engine.replace_all(vec![
        record("a.com", "1.1.1.1", "2024-03-01 10:00:00", json!("100")),
        record("a.com", "1.1.1.1", "2024-03-01 10:00:05", json!("50")),
    ]);
    assert_eq!(report.accepted, 2);

    let view = engine.view();
    let stat = view.stats.domain("a.com").expect("a.com aggregated");
    assert_eq!(stat.request_count, 2);
    assert_eq!(stat.data_transferred, 150);
    assert_eq!(stat.first_seen.as_str(), "2024-03-01 10:00:00");
    assert_eq!(stat.last_seen.as_str(), "2024-03-01 10:00:05");
    assert_eq!(view.stats.unique_devices(), 1);
}

#[test]
fn selected_domains_are_hidden_after_save() {
    let mut engine = DashboardEngine::default();
    engine.replace_all(vec![
        record("a", "10.0.0.1", &at(0), json!(10)),
        record("b", "10.0.0.1", &at(1), json!(10)),
        record("a", "10.0.0.2", &at(2), json!(10)),
        record("b", "10.0.0.2", &at(3), json!(10)),
    ]);

    engine.set_domain("a", true);
    // working edits do not filter until saved
    assert_eq!(engine.view().subset_len, 4);

    engine.save_selection();
    let view = engine.view();
    assert_eq!(view.subset_len, 2);
    assert!(view.page.rows.iter().all(|r| r.domain == "b"));
    assert!(view.stats.domain("a").is_none());

    engine.set_domain("a", false);
    engine.save_selection();
    assert_eq!(engine.view().subset_len, 4);
}

#[test]
fn forty_five_rows_make_three_pages() {
    let mut engine = DashboardEngine::default();
    let batch = (0..45)
        .map(|i| record(&format!("d{}.com", i % 4), "10.0.0.1", &at(i), json!(1)))
        .collect();
    engine.replace_all(batch);

    assert_eq!(engine.view().page.total_pages, 3);
    assert_eq!(engine.go_to_page(4), 3);
    let page = &engine.view().page;
    assert_eq!(page.number, 3);
    assert_eq!(page.rows.len(), 5);
    // newest first
    assert_eq!(page.rows[0].time.as_str(), at(4));
}

#[test]
fn device_color_is_stable() {
    let engine = DashboardEngine::default();
    let first = engine.color_for("10.0.0.5").to_string();
    for _ in 0..10 {
        assert_eq!(engine.color_for("10.0.0.5"), first);
    }
}

#[test]
fn top_two_by_request_count() {
    let config = Config {
        top_n: 2,
        ..Config::default()
    };
    let mut engine = DashboardEngine::new(&config).expect("valid config");

    let mut batch = Vec::new();
    let mut second = 0;
    for (domain, count) in [("x", 5), ("y", 10), ("z", 3)] {
        for _ in 0..count {
            batch.push(record(domain, "10.0.0.1", &at(second), json!(1)));
            second += 1;
        }
    }
    engine.replace_all(batch);

    let top = &engine.view().top;
    let names: Vec<&str> = top.domains().collect();
    assert_eq!(names, ["y", "x"]);
    assert_eq!(top.entries[0].share, 67);
    assert_eq!(top.entries[1].share, 33);
}

#[test]
fn appends_never_exceed_capacity() {
    let config = Config {
        capacity: 10,
        near_capacity: 8,
        ..Config::default()
    };
    let mut engine = DashboardEngine::new(&config).expect("valid config");
    for i in 0..25 {
        engine.append(record("a.com", "10.0.0.1", &at(i), json!(1))).expect("valid record");
        assert!(engine.buffer().len() <= 10);
    }

    let times: Vec<&str> = engine.buffer().iter().map(|r| r.time.as_str()).collect();
    assert_eq!(times.len(), 10);
    assert_eq!(times[0], at(24));
    assert_eq!(times[9], at(15));
    assert!(engine.usage().near_capacity);
}

#[test]
fn repeated_snapshot_gives_identical_view() {
    let batch: Vec<RecordDTO> = (0..30)
        .map(|i| record(&format!("d{}.com", i % 5), &format!("10.0.0.{}", i % 3), &at(i), json!(i)))
        .collect();

    let mut engine = DashboardEngine::default();
    engine.replace_all(batch.clone());
    let first = engine.view().clone();
    engine.replace_all(batch);
    assert_eq!(engine.view(), &first);
}

#[test]
fn aggregation_ignores_arrival_order() {
    let batch: Vec<RecordDTO> = (0..20)
        .map(|i| record(&format!("d{}.com", i % 3), "10.0.0.1", &at(i), json!(i * 3)))
        .collect();
    let mut reversed = batch.clone();
    reversed.reverse();

    let mut forward = DashboardEngine::default();
    forward.replace_all(batch);
    let mut backward = DashboardEngine::default();
    backward.replace_all(reversed);

    for domain in ["d0.com", "d1.com", "d2.com"] {
        let a = forward.view().stats.domain(domain).cloned().expect("present");
        let b = backward.view().stats.domain(domain).cloned().expect("present");
        assert_eq!(a.request_count, b.request_count);
        assert_eq!(a.data_transferred, b.data_transferred);
    }
}

#[test]
fn failed_record_keeps_last_good_state() {
    let mut engine = DashboardEngine::default();
    let ticket = engine.begin_refresh();
    let outcome = engine.complete_refresh(
        ticket,
        vec![
            record("a.com", "10.0.0.1", &at(0), json!(1)),
            record("a.com", "10.0.0.1", "yesterday-ish", json!(1)),
        ],
    );
    assert!(matches!(outcome, RefreshOutcome::Applied(report) if report.rejected == 1));

    assert!(engine.append(RecordDTO::default()).is_err());
    assert_eq!(engine.buffer().len(), 1);
    assert!(!engine.view().is_empty());
}

#[test]
fn filters_to_nothing_render_empty_view() {
    let mut engine = DashboardEngine::default();
    engine.replace_all(vec![record("a.com", "10.0.0.1", &at(0), json!(1))]);
    engine.drill_down(Some("10.9.9.9".to_string()));

    let view = engine.view();
    assert!(view.is_empty());
    assert_eq!(view.page.total_pages, 1);
    assert!(view.top.entries.is_empty());
}

#[test]
fn exported_page_matches_visible_rows() {
    let mut engine = DashboardEngine::default();
    engine.replace_all(vec![
        record("a.com", "10.0.0.1", &at(0), json!(100)),
        record("a.com", "10.0.0.1", &at(1), json!(50)),
        record("b.com", "10.0.0.2", &at(2), json!(8)),
    ]);

    let rows = engine.export_page();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].domain, "b.com");
    let a = rows.iter().find(|r| r.domain == "a.com").expect("a.com row");
    assert_eq!(a.request_count, 2);

    let json = serde_json::to_value(&rows).expect("serializes");
    assert!(json[0].get("requestCount").is_some());
}

#[test]
fn oversized_length_does_not_break_the_view() {
    let mut engine = DashboardEngine::default();
    engine
        .append(record("a.com", "10.0.0.1", &at(0), json!("99999999999999999999")))
        .expect("valid record");
    engine
        .append(record("b.com", "10.0.0.1", &at(1), json!("1")))
        .expect("valid record");

    let view = engine.view();
    assert_eq!(view.stats.total_requests, 2);
    assert_eq!(view.stats.total_bytes, u64::MAX);
    assert_eq!(view.top.total_bytes, u64::MAX);
    assert_eq!(view.stats.domain("b.com").map(|d| d.data_transferred), Some(1));
}
