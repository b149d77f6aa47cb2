// tests/review_workflow_test.rs

use label_review::config::ReviewConfig;
use label_review::geometry::IMAGE_SCALE;
use label_review::store::local::{CONFIGURATION_FILE, MASTER_GRID_FILE, QAQC_FILE, USER_MAPS_FILE};
use label_review::{
    record_review, Assignment, Error, LabelRequest, LabelReview, LocalStore, ReviewLog,
    SiteSelector,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

const SITES: [(&str, &str, f64, f64); 4] = [
    ("GH0001", "101", -1.50, 6.25),
    ("GH0002", "102", -1.60, 6.30),
    ("GH0003", "103", -1.70, 6.35),
    ("GH0004", "104", -1.80, 6.40),
];

fn square(x: f64, y: f64) -> String {
    let d = 0.001;
    format!(
        r#"{{"type":"Polygon","coordinates":[[[{x},{y}],[{},{y}],[{},{}],[{x},{}],[{x},{y}]]]}}"#,
        x + d,
        x + d,
        y + d,
        y + d
    )
}

fn write_store(dir: &Path) {
    fs::write(
        dir.join(CONFIGURATION_FILE),
        "key,value\ninstance_id_Q,qa-instance\ninstance_id_F,field-instance\n",
    )
    .unwrap();

    let mut grid = String::from("name,x,y,date\n");
    let mut user = Vec::new();
    let mut qaqc = Vec::new();
    for (name, id, x, y) in SITES {
        grid.push_str(&format!("{name},{x},{y},2018-01-15\n"));
        user.push(format!(
            r#"{{"type":"Feature","properties":{{"name":"{name}","assignment_id":"{id}"}},"geometry":{}}}"#,
            square(x, y)
        ));
        qaqc.push(format!(
            r#"{{"type":"Feature","properties":{{"name":"{name}"}},"geometry":{}}}"#,
            square(x + 0.0005, y)
        ));
    }
    fs::write(dir.join(MASTER_GRID_FILE), grid).unwrap();
    fs::write(
        dir.join(USER_MAPS_FILE),
        format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, user.join(",")),
    )
    .unwrap();
    fs::write(
        dir.join(QAQC_FILE),
        format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, qaqc.join(",")),
    )
    .unwrap();
}

fn assignments() -> Vec<Assignment> {
    let row = |worker: &str, name: &str, id: &str, kind: &str| Assignment {
        worker_id: worker.to_string(),
        name: name.to_string(),
        assignment_id: id.to_string(),
        kml_type: kind.to_string(),
    };
    vec![
        row("worker7", "GH0001", "101", "Q"),
        row("worker7", "GH0002", "102", "Q"),
        row("worker7", "GH0003", "103", "Q"),
        row("worker7", "GH0004", "104", "F"),
        row("worker8", "GH0004", "104", "Q"),
    ]
}

async fn review_session(dir: &Path) -> LabelReview<LocalStore> {
    write_store(dir);
    let store = LocalStore::open(dir).unwrap();
    LabelReview::new(store, ReviewConfig::default()).await.unwrap()
}

#[tokio::test]
async fn test_random_qa_site_without_review_history() {
    let dir = TempDir::new().unwrap();
    let review = review_session(dir.path()).await;
    let log = ReviewLog::new(dir.path().join("reviews.csv"));
    let rows = assignments();
    let mut rng = StdRng::seed_from_u64(11);

    let expected: HashSet<&str> = ["GH0001", "GH0002", "GH0003"].into_iter().collect();
    let labels = review
        .get_labels(&rows, &LabelRequest::new("worker7"), &log, &mut rng)
        .await
        .unwrap();

    assert!(expected.contains(labels.name()));
    assert_eq!(labels.kind, "Q");
    assert_eq!(labels.rater, "worker7");
    assert!(labels.user.is_some());
    assert!(labels.expert.is_some());
    assert_eq!(
        labels.image_grid.half_width,
        labels.grid.half_width * IMAGE_SCALE
    );

    let url = review.wms_url(&labels).unwrap();
    assert_eq!(url, "https://services.sentinel-hub.com/ogc/wms/qa-instance");
}

#[tokio::test]
async fn test_reviewed_sites_are_not_sampled_again() {
    let dir = TempDir::new().unwrap();
    let review = review_session(dir.path()).await;
    let log = ReviewLog::new(dir.path().join("reviews.csv"));
    let rows = assignments();
    let mut rng = StdRng::seed_from_u64(3);
    let mut seen = HashSet::new();

    for _ in 0..3 {
        let labels = review
            .get_labels(&rows, &LabelRequest::new("worker7"), &log, &mut rng)
            .await
            .unwrap();
        assert!(seen.insert(labels.name().to_string()), "{} sampled twice", labels.name());

        let mut input = Cursor::new("good\nexcellent\n");
        record_review(&log, &labels, true, &mut input, &mut Vec::new()).unwrap();
    }

    let err = review
        .get_labels(&rows, &LabelRequest::new("worker7"), &log, &mut rng)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoSiteAvailable { .. }));

    // One header plus two rows per review.
    let text = fs::read_to_string(log.path()).unwrap();
    assert_eq!(text.lines().count(), 1 + 3 * 2);

    // Another rater's history is separate.
    let labels = review
        .get_labels(&rows, &LabelRequest::new("worker8"), &log, &mut rng)
        .await
        .unwrap();
    assert_eq!(labels.name(), "GH0004");
}

#[tokio::test]
async fn test_named_field_site_has_no_expert_labels() {
    let dir = TempDir::new().unwrap();
    let review = review_session(dir.path()).await;
    let log = ReviewLog::new(dir.path().join("reviews.csv"));
    let rows = assignments();
    let mut rng = StdRng::seed_from_u64(5);

    let request = LabelRequest::new("worker7")
        .kind("F")
        .site(SiteSelector::Named("GH0004".to_string()));
    let labels = review.get_labels(&rows, &request, &log, &mut rng).await.unwrap();

    assert_eq!(labels.assignment_id, "104");
    assert!(labels.user.is_some());
    assert!(labels.expert.is_none());

    let map = review.plot_labels(&labels).unwrap();
    let html = map.to_html().unwrap();
    assert!(html.contains("field-instance"));
    assert!(html.contains("User labels"));
    assert!(!html.contains("Expert labels"));
}

#[tokio::test]
async fn test_site_missing_from_master_grid() {
    let dir = TempDir::new().unwrap();
    let review = review_session(dir.path()).await;
    let log = ReviewLog::new(dir.path().join("reviews.csv"));
    let mut rows = assignments();
    rows.push(Assignment {
        worker_id: "worker9".to_string(),
        name: "GH9999".to_string(),
        assignment_id: "999".to_string(),
        kml_type: "Q".to_string(),
    });
    let mut rng = StdRng::seed_from_u64(5);

    let err = review
        .get_labels(&rows, &LabelRequest::new("worker9"), &log, &mut rng)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SiteNotFound(_)));
}
