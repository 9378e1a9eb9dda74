//! End-to-end pipeline runs.

use crate::error::PipelineError;
use crate::io::{source_for_path, MemorySource, RecordSource};
use crate::pipeline::{Pipeline, QueueCapacities};
use crate::transform::{DegeneratePolicy, Forecaster, Formatter, Grouping, Model};
use crate::types::{Ltv, Record};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

fn record(campaign: &str, country: &str, ltv: Ltv) -> Record {
    Record::new(campaign, country, ltv).unwrap()
}

fn fixture_dir() -> PathBuf {
    let dir = PathBuf::from("target/test-ltv-pipeline");
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn pipeline(source: impl RecordSource, grouping: Grouping, forecaster: Forecaster) -> Pipeline {
    Pipeline::builder()
        .source(Box::new(source))
        .grouping(grouping)
        .forecaster(forecaster)
        .build()
        .unwrap()
}

async fn run(pipeline: Pipeline) -> Result<Vec<String>, PipelineError> {
    let mut lines = Vec::new();
    tokio::time::timeout(RUN_TIMEOUT, pipeline.run(|line| lines.push(line)))
        .await
        .expect("pipeline did not finish")?;
    Ok(lines)
}

fn linear_records() -> Vec<Record> {
    vec![
        record("c1", "JP", [2.0, 4.0, 6.0, 8.0, 10.0, 0.0, 0.0]),
        record("c2", "US", [3.0, 6.0, 9.0, 0.0, 0.0, 0.0, 0.0]),
        record("c3", "DE", [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]),
    ]
}

#[tokio::test]
async fn test_country_lines_sorted_descending() {
    let p = pipeline(
        MemorySource::new(linear_records()),
        Grouping::Country,
        Forecaster::new(Model::Linear),
    );
    let lines = run(p).await.unwrap();
    assert_eq!(lines, vec!["US: 180.00", "JP: 120.00", "DE: 60.00"]);
}

#[tokio::test]
async fn test_campaign_lines_are_bracketed() {
    let p = pipeline(
        MemorySource::new(linear_records()),
        Grouping::Campaign,
        Forecaster::new(Model::Linear),
    );
    let lines = run(p).await.unwrap();
    assert_eq!(lines, vec!["<c2>: 180.00", "<c1>: 120.00", "<c3>: 60.00"]);
}

#[tokio::test]
async fn test_formatter_override() {
    let p = Pipeline::builder()
        .source(Box::new(MemorySource::new(linear_records())))
        .grouping(Grouping::Country)
        .forecaster(Forecaster::new(Model::Linear))
        .formatter(Formatter::Bracketed)
        .build()
        .unwrap();
    let lines = run(p).await.unwrap();
    assert_eq!(lines[0], "<US>: 180.00");
}

#[tokio::test]
async fn test_average_model_across_records() {
    let records = vec![
        record("c1", "US", [7.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        record("c2", "US", [1.0, 8.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        record("c3", "US", [1.0, 4.0, 9.0, 12.0, 15.0, 0.0, 0.0]),
    ];
    let p = pipeline(MemorySource::new(records), Grouping::Country, Forecaster::new(Model::Average));
    let lines = run(p).await.unwrap();
    assert_eq!(lines, vec!["US: 149.40"]);
}

#[tokio::test]
async fn test_stats_count_every_stage() {
    let p = pipeline(
        MemorySource::new(linear_records()),
        Grouping::Country,
        Forecaster::new(Model::Linear),
    );
    let (lines, stats) = tokio::time::timeout(RUN_TIMEOUT, p.collect())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(stats.records_read, 3);
    assert_eq!(stats.items_aggregated, 3);
    assert_eq!(stats.keys_predicted, 3);
    assert_eq!(stats.lines_emitted, 3);
}

#[tokio::test]
async fn test_empty_input_yields_no_lines() {
    let p = pipeline(MemorySource::default(), Grouping::Country, Forecaster::new(Model::Linear));
    let lines = run(p).await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_decode_error_mid_stream_yields_no_lines() {
    let mut rows: Vec<Result<Record, PipelineError>> =
        linear_records().into_iter().map(Ok).collect();
    rows.insert(2, Err(PipelineError::decode("memory line 3", "bad ltv")));
    rows.push(Ok(record("c4", "FR", [1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0])));

    let p = pipeline(
        MemorySource::from_results(rows),
        Grouping::Country,
        Forecaster::new(Model::Linear),
    );
    let mut lines = Vec::new();
    let result = tokio::time::timeout(RUN_TIMEOUT, p.run(|line| lines.push(line)))
        .await
        .expect("pipeline did not finish");

    assert!(matches!(result, Err(PipelineError::Decode { .. })));
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_cancellation_with_many_keys_and_small_queues() {
    let mut rows: Vec<Result<Record, PipelineError>> = (0..500)
        .map(|i| {
            Ok(record(
                &format!("c{}", i),
                &format!("K{:03}", i % 97),
                [1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0],
            ))
        })
        .collect();
    rows.push(Err(PipelineError::decode("memory line 501", "truncated")));

    let caps = QueueCapacities {
        records: 1,
        aggregated: 1,
        predictions: 1,
        lines: 1,
        ..QueueCapacities::default()
    };
    let p = Pipeline::builder()
        .source(Box::new(MemorySource::from_results(rows)))
        .grouping(Grouping::Country)
        .forecaster(Forecaster::new(Model::Linear))
        .capacities(caps)
        .build()
        .unwrap();

    let result = run(p).await;
    assert!(matches!(result, Err(PipelineError::Decode { .. })));
}

#[tokio::test]
async fn test_output_keys_match_input_keys() {
    let records: Vec<Record> = (0..200)
        .map(|i| {
            let day1 = (i % 13 + 1) as f64;
            record(
                &format!("camp-{}", i % 17),
                &format!("C{:02}", i % 23),
                [day1, day1 * 2.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            )
        })
        .collect();
    let expected: HashSet<String> = records.iter().map(|r| r.country().to_string()).collect();

    let p = pipeline(MemorySource::new(records), Grouping::Country, Forecaster::new(Model::Linear));
    let lines = run(p).await.unwrap();

    let got: HashSet<String> = lines
        .iter()
        .map(|line| line.split(':').next().unwrap().to_string())
        .collect();
    assert_eq!(lines.len(), expected.len());
    assert_eq!(got, expected);
}

#[tokio::test]
async fn test_degenerate_key_fails_by_default() {
    let records = vec![
        record("c1", "JP", [2.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        record("c2", "US", [3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ];
    let p = pipeline(MemorySource::new(records), Grouping::Country, Forecaster::new(Model::Linear));
    match run(p).await {
        Err(PipelineError::Forecast { key, .. }) => assert_eq!(key, "US"),
        other => panic!("expected forecast error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_degenerate_key_held_flat() {
    let records = vec![
        record("c1", "JP", [2.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        record("c2", "US", [3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
    ];
    let forecaster = Forecaster::new(Model::Linear).with_degenerate(DegeneratePolicy::Hold);
    let p = pipeline(MemorySource::new(records), Grouping::Country, forecaster);
    let lines = run(p).await.unwrap();
    assert_eq!(lines, vec!["JP: 120.00", "US: 3.00"]);
}

#[tokio::test]
async fn test_target_day_override() {
    let records = vec![record("c1", "JP", [2.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0])];
    let forecaster = Forecaster::new(Model::Linear).with_target_day(30.0);
    let p = pipeline(MemorySource::new(records), Grouping::Country, forecaster);
    let lines = run(p).await.unwrap();
    assert_eq!(lines, vec!["JP: 60.00"]);
}

#[tokio::test]
async fn test_csv_file_end_to_end() {
    let path = fixture_dir().join("cohorts.csv");
    std::fs::write(
        &path,
        "userId,campaignId,country,ltv1,ltv2,ltv3,ltv4,ltv5,ltv6,ltv7\n\
         u1,c1,JP,2,4,6,8,10,0,0\n\
         u2,c2,US,3,6,9,0,0,0,0\n\
         u3,c3,DE,1,2,3,4,5,6,7\n",
    )
    .unwrap();

    let p = Pipeline::builder()
        .source(source_for_path(&path).unwrap())
        .grouping(Grouping::Country)
        .forecaster(Forecaster::new(Model::Linear))
        .build()
        .unwrap();
    let lines = run(p).await.unwrap();
    assert_eq!(lines, vec!["US: 180.00", "JP: 120.00", "DE: 60.00"]);
}

#[tokio::test]
async fn test_csv_file_with_bad_row_fails() {
    let path = fixture_dir().join("broken.csv");
    std::fs::write(
        &path,
        "userId,campaignId,country,ltv1,ltv2,ltv3,ltv4,ltv5,ltv6,ltv7\n\
         u1,c1,JP,2,4,6,8,10,0,0\n\
         u2,c2,US,3,six,9,0,0,0,0\n",
    )
    .unwrap();

    let p = Pipeline::builder()
        .source(source_for_path(&path).unwrap())
        .grouping(Grouping::Country)
        .forecaster(Forecaster::new(Model::Linear))
        .build()
        .unwrap();
    match run(p).await {
        Err(PipelineError::Decode { origin, .. }) => assert!(origin.contains("line 3")),
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_json_file_end_to_end() {
    let path = fixture_dir().join("cohorts.json");
    std::fs::write(
        &path,
        r#"[
            {"CampaignId": "c1", "Country": "JP", "Ltv1": 4, "Ltv2": 8, "Ltv3": 0, "Ltv4": 0, "Ltv5": 0, "Ltv6": 0, "Ltv7": 0, "Users": 2},
            {"CampaignId": "c2", "Country": "US", "Ltv1": 3, "Ltv2": 6, "Ltv3": 9, "Ltv4": 0, "Ltv5": 0, "Ltv6": 0, "Ltv7": 0, "Users": 1}
        ]"#,
    )
    .unwrap();

    let p = Pipeline::builder()
        .source(source_for_path(&path).unwrap())
        .grouping(Grouping::Campaign)
        .forecaster(Forecaster::new(Model::Linear))
        .build()
        .unwrap();
    let lines = run(p).await.unwrap();
    assert_eq!(lines, vec!["<c2>: 180.00", "<c1>: 120.00"]);
}
