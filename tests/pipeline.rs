use anyhow::Result;
use enrolstats::{
    aggregate::{AggregationResult, Hierarchy},
    config::Config,
    view,
};
use std::fs;
use tempfile::tempdir;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,enrolstats=debug"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

const STUDY_LEVELS: &str = "\
study level,Province/Territory,Sex,2015,2016,2017
College,Ontario,Male,100,120,130
College,Quebec,Female,40,N/A,60
University,Ontario,Female,300,310,
University,British Columbia,Male,200,210,220
University,Province/territory not stated Total,Male,5,5,5
";

const VIEWS: &str = r#"
dataset:
  path: study_levels.csv
views:
  - name: donut
    kind: field_totals
    category_field: Province/Territory
    selection:
      exclude: ["Province/territory not stated Total"]
  - name: bar
    kind: by_category
    category_field: Province/Territory
    selection:
      year: "2016"
      exclude: ["Province/territory not stated Total"]
  - name: treemap
    kind: hierarchy
    category_field: Province/Territory
    root: International Students Study level
    selection:
      yearKeys: ["2015", "2017"]
      groupField: study level
      exclude: ["Province/territory not stated Total"]
  - name: bubble
    kind: records
    category_field: Province/Territory
    subcategory_field: Sex
    selection:
      year: all
      allow:
        - field: Sex
          values: [Male, Female]
      filterField: Sex
      filterValue: male
  - name: legend
    kind: buckets
    category_field: Province/Territory
    thresholds: [0, 100, 1000]
"#;

fn write_fixture(dir: &std::path::Path) -> Result<Config> {
    fs::write(dir.join("study_levels.csv"), STUDY_LEVELS)?;
    let cfg = dir.join("views.yaml");
    fs::write(&cfg, VIEWS)?;
    Config::from_path(&cfg)
}

#[test]
fn test_config_to_results() -> Result<()> {
    init_test_logging();
    let dir = tempdir()?;
    let config = write_fixture(dir.path())?;
    let dataset = config.dataset.load()?;
    assert_eq!(dataset.len(), 5);

    let run = |name: &str| view::run(&dataset, config.view(name).unwrap());

    match run("donut")? {
        AggregationResult::Totals(t) => {
            let got: Vec<_> = t.iter().collect();
            assert_eq!(got, vec![("2015", 640.0), ("2016", 640.0), ("2017", 410.0)]);
        }
        other => panic!("unexpected {:?}", other),
    }

    match run("bar")? {
        AggregationResult::Totals(t) => {
            assert_eq!(t.get("Ontario"), Some(430.0));
            assert_eq!(t.get("Quebec"), Some(0.0));
            assert_eq!(t.get("Province/territory not stated Total"), None);
            assert_eq!(t.total(), 640.0);
        }
        other => panic!("unexpected {:?}", other),
    }

    match run("treemap")? {
        AggregationResult::Hierarchy(root) => {
            let sum_children = |h: &Hierarchy| h.children.iter().map(|c| c.value).sum::<f64>();
            assert_eq!(root.value, sum_children(&root));
            assert_eq!(root.children[0].name, "University");
            assert_eq!(root.children[0].value, 720.0);
            assert_eq!(root.children[1].value, 330.0);
            for group in &root.children {
                assert_eq!(group.value, sum_children(group));
            }
        }
        other => panic!("unexpected {:?}", other),
    }

    match run("bubble")? {
        AggregationResult::Entries(entries) => {
            let got: Vec<_> = entries
                .iter()
                .map(|e| (e.category.as_str(), e.value))
                .collect();
            assert_eq!(
                got,
                vec![
                    ("British Columbia", 630.0),
                    ("Ontario", 350.0),
                    ("Province/territory not stated Total", 15.0)
                ]
            );
        }
        other => panic!("unexpected {:?}", other),
    }

    match run("legend")? {
        AggregationResult::Buckets(b) => {
            assert_eq!(b.len(), 4);
            assert_eq!(b.bucket_of("Quebec"), Some(2));
            assert_eq!(b.bucket_of("Ontario"), Some(2));
            assert_eq!(b.bucket_of("Province/territory not stated Total"), Some(1));
            assert!(b.get(0).unwrap().is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
    Ok(())
}

#[test]
fn test_missing_column_surfaces_error() -> Result<()> {
    let dir = tempdir()?;
    let config = write_fixture(dir.path())?;
    let dataset = config.dataset.load()?;
    let yaml = "kind: by_category\ncategory_field: Year\n";
    let view: enrolstats::View = serde_yaml::from_str(yaml)?;
    let err = view::run(&dataset, &view).unwrap_err();
    assert_eq!(
        err,
        enrolstats::AggregateError::InvalidColumn {
            column: "Year".into()
        }
    );
    Ok(())
}

#[test]
fn test_series_json_drilldown() -> Result<()> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("international-student.json"),
        r#"[
  {"country": "India", "total": 30,
   "values": [{"year": 2015, "count": 10}, {"year": 2016, "count": 20}]},
  {"country": "Chile", "total": 0,
   "values": [{"year": 2015, "count": 0}, {"year": 2016, "count": 0}]}
]"#,
    )?;
    let cfg = dir.path().join("map.yaml");
    fs::write(
        &cfg,
        r#"
dataset:
  path: international-student.json
  layout:
    series: { field: values, key: year, value: count }
views:
  - name: drilldown
    kind: series
    category_field: country
"#,
    )?;
    let config = Config::from_path(&cfg)?;
    let dataset = config.dataset.load()?;
    match view::run(&dataset, config.view("drilldown").unwrap())? {
        AggregationResult::Series(series) => {
            assert_eq!(series.len(), 2);
            let india = series.iter().find(|s| s.category == "India").unwrap();
            assert_eq!(india.total, 30.0);
            let keys: Vec<_> = india.points.iter().map(|p| p.key.as_str()).collect();
            assert_eq!(keys, vec!["2015", "2016"]);
            let chile = series.iter().find(|s| s.category == "Chile").unwrap();
            assert!(!chile.has_data());
        }
        other => panic!("unexpected {:?}", other),
    }
    Ok(())
}
