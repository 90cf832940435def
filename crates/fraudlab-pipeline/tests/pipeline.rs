use fraudlab_data::ClassCounts;
use fraudlab_datasets::{make_transactions, toy_transactions, with_duplicates};
use fraudlab_io::write_csv;
use fraudlab_pipeline::{
    run, run_on, DataConfig, KnnParams, ModelSpec, NaiveBayesParams, OutputConfig, PipelineConfig, PipelineError,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn config_for(path: &Path) -> PipelineConfig {
    PipelineConfig {
        data: DataConfig {
            path: path.to_path_buf(),
        },
        ..PipelineConfig::default()
    }
}

#[test]
fn test_full_run_from_csv() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("creditcard.csv");
    write_csv(&csv, &make_transactions(120, 12, 11).unwrap()).unwrap();

    let mut config = config_for(&csv);
    config.output = OutputConfig {
        report: Some(dir.path().join("report.json")),
    };
    let report = run(&config).unwrap();

    assert_eq!(report.loaded.rows, 132);
    assert_eq!(report.dedupe.unwrap().removed(), 0);
    assert_eq!(report.balanced, ClassCounts { legit: 120, fraud: 120 });
    assert_eq!(report.train_rows, 168);
    assert_eq!(report.test_rows, 72);

    let ids: Vec<&str> = report.holdout.rows.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(
        ids,
        vec!["naive_bayes", "decision_tree", "random_forest", "logistic_regression", "knn", "gradient_boosting"]
    );
    for row in &report.holdout.rows {
        for v in [row.accuracy, row.f1_weighted, row.precision, row.recall] {
            assert!((0.0..=1.0).contains(&v), "{}: {}", row.model, v);
        }
    }
    assert_eq!(report.cv.rows.len(), 6);
    assert!(report.cv.rows.iter().all(|r| r.fold_accuracies.len() == 5));

    let json = fs::read_to_string(dir.path().join("report.json")).unwrap();
    assert!(json.contains("\"holdout\""));
    assert!(json.contains("gradient_boosting"));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir.path().join("absent.csv"));
    assert!(matches!(run(&config), Err(PipelineError::Io { .. })));
}

#[test]
fn test_bad_header_is_format_error() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("bad.csv");
    fs::write(&csv, "Time,Amount,Class\n0,1.5,0\n").unwrap();
    assert!(matches!(run(&config_for(&csv)), Err(PipelineError::Format(_))));
}

#[test]
fn test_too_few_fraud_rows() {
    let data = make_transactions(50, 3, 2).unwrap();
    assert!(matches!(
        run_on(data, &PipelineConfig::default()),
        Err(PipelineError::InsufficientData(_))
    ));
}

#[test]
fn test_ten_legit_two_fraud_scenario() {
    let mut config = PipelineConfig::default();
    config.balance.k_neighbors = 1;
    config.models.roster = vec![
        ModelSpec::NaiveBayes(NaiveBayesParams::default()),
        ModelSpec::Knn(KnnParams { k: 3, ..KnnParams::default() }),
    ];

    let report = run_on(toy_transactions(10, 2).unwrap(), &config).unwrap();
    assert_eq!(report.balanced, ClassCounts { legit: 10, fraud: 10 });
    assert_eq!(report.train_rows, 14);
    assert_eq!(report.test_rows, 6);
    assert_eq!(report.holdout.rows.len(), 2);
}

#[test]
fn test_duplicates_removed_before_balancing() {
    let data = with_duplicates(&make_transactions(60, 8, 4).unwrap(), &[0, 1, 60]).unwrap();
    let mut config = PipelineConfig::default();
    config.models.roster = vec![ModelSpec::NaiveBayes(NaiveBayesParams::default())];

    let report = run_on(data.clone(), &config).unwrap();
    let dedupe = report.dedupe.unwrap();
    assert_eq!(dedupe.removed(), 3);
    assert_eq!(report.balanced, ClassCounts { legit: 60, fraud: 60 });

    config.cleaning.enabled = false;
    let report = run_on(data, &config).unwrap();
    assert!(report.dedupe.is_none());
    assert_eq!(report.balanced, ClassCounts { legit: 62, fraud: 62 });
}

#[test]
fn test_run_is_deterministic() {
    let data = make_transactions(80, 10, 5).unwrap();
    let mut config = PipelineConfig::default();
    config.evaluation.rebalance_per_fold = true;
    config.evaluation.cv_folds = 3;

    let first = run_on(data.clone(), &config).unwrap();
    let second = run_on(data, &config).unwrap();
    assert!(first.cv.rebalanced_per_fold);
    assert_eq!(first, second);
}
