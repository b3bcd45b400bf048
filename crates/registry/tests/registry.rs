//! Rendering behaviour of the result registry.

use std::thread;
use std::time::Duration;

use barrage_registry::{Registry, RegistryConfig, REQUESTS_TOTAL, REQUEST_DURATION_SECONDS};
use barrage_types::{AttackResult, Conventions, LabelKind, LabelSet};

fn result(target: &str, endpoint: &str, code: u16, latency_ms: u64) -> AttackResult {
    AttackResult {
        target: target.to_string(),
        endpoint: endpoint.to_string(),
        test_name: "checkout".to_string(),
        status_code: code,
        latency: Duration::from_millis(latency_ms),
    }
}

/// Value of the first sample line of `metric` carrying all of `labels`.
fn sample(text: &str, metric: &str, labels: &[(&str, &str)]) -> Option<f64> {
    text.lines()
        .filter(|line| line.starts_with(&format!("{metric}{{")))
        .find(|line| {
            labels
                .iter()
                .all(|(key, value)| line.contains(&format!("{key}=\"{value}\"")))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

fn registry(conventions: &Conventions) -> Registry {
    Registry::new("checkout", conventions, &RegistryConfig::default()).unwrap()
}

#[test]
fn counts_each_label_tuple_independently() {
    let mut registry = registry(&Conventions::default());
    let a = "http://10.0.0.1:8080/";
    let b = "http://10.0.0.2:8080/";

    // Interleave three tuples so ordering cannot matter.
    for i in 0..30 {
        match i % 3 {
            0 => registry.observe(&result("api", a, 200, 5)),
            1 => registry.observe(&result("api", b, 200, 7)),
            _ => registry.observe(&result("api", a, 503, 9)),
        }
    }

    let text = registry.reader().render();
    let count = |endpoint: &str, code: &str| {
        sample(
            &text,
            REQUESTS_TOTAL,
            &[("target", "api"), ("endpoint", endpoint), ("code", code)],
        )
    };
    assert_eq!(count(a, "200"), Some(10.0));
    assert_eq!(count(b, "200"), Some(10.0));
    assert_eq!(count(a, "503"), Some(10.0));
    assert_eq!(count(b, "503"), None);
}

#[test]
fn every_series_carries_the_test_label() {
    let mut registry = registry(&Conventions::default());
    registry.observe(&result("api", "http://localhost:9999/", 200, 3));

    let text = registry.reader().render();
    let series: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .collect();
    assert!(!series.is_empty());
    assert!(series.iter().all(|line| line.contains("test=\"checkout\"")));
}

#[test]
fn transport_errors_use_code_zero() {
    let mut registry = registry(&Conventions::default());
    registry.observe(&result("api", "http://localhost:1/", 0, 1));

    let text = registry.reader().render();
    assert_eq!(
        sample(&text, REQUESTS_TOTAL, &[("target", "api"), ("code", "0")]),
        Some(1.0)
    );
}

#[test]
fn latency_summary_exposes_count_and_quantiles() {
    let mut registry = registry(&Conventions::default());
    for ms in 1..=20 {
        registry.observe(&result("api", "http://localhost:9999/", 200, ms));
    }

    let text = registry.reader().render();
    let count_metric = format!("{REQUEST_DURATION_SECONDS}_count");
    assert_eq!(sample(&text, &count_metric, &[("target", "api")]), Some(20.0));

    let median = sample(
        &text,
        REQUEST_DURATION_SECONDS,
        &[("target", "api"), ("quantile", "0.5")],
    )
    .expect("median present");
    assert!(median > 0.0 && median < 0.021);
    assert!(text.contains(&format!("# TYPE {REQUEST_DURATION_SECONDS} summary")));
}

#[test]
fn label_subset_collapses_endpoints() {
    let conventions = Conventions::with_labels(LabelSet::new([LabelKind::Target, LabelKind::Code]));
    let mut registry = registry(&conventions);
    registry.observe(&result("api", "http://10.0.0.1/", 200, 2));
    registry.observe(&result("api", "http://10.0.0.2/", 200, 2));

    let text = registry.reader().render();
    assert!(!text.contains("endpoint="));
    assert_eq!(
        sample(&text, REQUESTS_TOTAL, &[("target", "api"), ("code", "200")]),
        Some(2.0)
    );
}

#[test]
fn readers_render_while_the_writer_observes() {
    let mut registry = registry(&Conventions::default());
    let reader = registry.reader();

    let scraper = thread::spawn(move || {
        for _ in 0..50 {
            let _ = reader.render();
        }
        reader
    });
    for _ in 0..500 {
        registry.observe(&result("api", "http://localhost:9999/", 200, 1));
    }
    let reader = scraper.join().unwrap();

    assert_eq!(
        sample(&reader.render(), REQUESTS_TOTAL, &[("target", "api")]),
        Some(500.0)
    );
}

#[test]
fn registries_do_not_share_series() {
    let mut first = registry(&Conventions::default());
    let second = Registry::new("other", &Conventions::default(), &RegistryConfig::default()).unwrap();
    first.observe(&result("api", "http://localhost:9999/", 200, 1));

    assert!(!second
        .reader()
        .render()
        .contains(&format!("{REQUESTS_TOTAL}{{")));
}
