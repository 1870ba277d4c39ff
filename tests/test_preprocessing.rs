//! Integration test: preprocessing core properties

use immopredict::preprocessing::outlier::{detect_outliers_iqr, detect_outliers_zscore};
use immopredict::preprocessing::{
    classify, convert_boolean, impute_numeric, normalize_text, partition_columns, EncoderConfig, FeatureEncoder,
    FeatureGroups, ImputeStrategy, SemanticType,
};
use immopredict::target::TargetTransform;
use polars::prelude::*;
use rand::prelude::*;
use std::collections::BTreeSet;

fn listings() -> DataFrame {
    df!(
        "sq_mt_built" => &[Some(64.0), Some(70.0), None, Some(120.0), Some(95.0), Some(48.0)],
        "n_rooms" => &[2i64, 3, 2, 4, 3, 1],
        "neighborhood" => &["55", "12", "55", "7", "12", "55"],
        "district" => &["Centro", "Chamartín", "Centro", "Retiro", "Chamartín", "Centro"],
        "has_lift" => &[Some("True"), Some("False"), None, Some("true"), Some("FALSE"), Some("True")],
        "has_pool" => &[0.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        "is_floor_under" => &[Some(false), Some(false), Some(true), None, Some(false), Some(false)]
    )
    .unwrap()
}

#[test]
fn test_boolean_like_columns_classified_boolean() {
    let cases: Vec<Series> = vec![
        Series::new("a".into(), &["0", "1", "1"]),
        Series::new("b".into(), &["True", "FALSE", "true"]),
        Series::new("c".into(), &[Some("1.0"), None, Some("0.0")]),
        Series::new("d".into(), &[1.0, 0.0, 1.0]),
        Series::new("e".into(), &[1i64, 0, 0]),
        Series::new("f".into(), &[true, false, true]),
    ];
    for s in &cases {
        assert_eq!(classify(s), SemanticType::Boolean, "column {}", s.name());
    }

    assert_eq!(classify(&Series::new("x".into(), &[1.0, 2.0, 0.0])), SemanticType::Numeric);
    assert_eq!(classify(&Series::new("y".into(), &["yes", "no"])), SemanticType::Categorical);
}

#[test]
fn test_partition_is_exact_cover() {
    let df = listings();
    let partition = partition_columns(&df);

    let mut seen = BTreeSet::new();
    for name in partition
        .boolean
        .iter()
        .chain(&partition.numeric)
        .chain(&partition.categorical)
    {
        assert!(seen.insert(name.clone()), "{} appears twice", name);
    }
    let all: BTreeSet<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
    assert_eq!(seen, all);

    assert_eq!(partition.boolean, vec!["has_lift", "has_pool", "is_floor_under"]);
    assert_eq!(partition.numeric, vec!["sq_mt_built", "n_rooms"]);
    assert_eq!(partition.categorical, vec!["neighborhood", "district"]);
}

#[test]
fn test_boolean_conversion_idempotent() {
    let df = listings();
    for name in ["has_lift", "has_pool", "is_floor_under"] {
        let once = convert_boolean(df.column(name).unwrap().as_materialized_series()).unwrap();
        let twice = convert_boolean(&once).unwrap();
        assert!(once.equals_missing(&twice), "{} changed on second conversion", name);
    }

    let lift = convert_boolean(df.column("has_lift").unwrap().as_materialized_series()).unwrap();
    let values: Vec<Option<u8>> = lift.u8().unwrap().into_iter().collect();
    assert_eq!(values, vec![Some(1), Some(0), None, Some(1), Some(0), Some(1)]);
}

#[test]
fn test_imputation_noop_without_missing() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let values: Vec<f64> = (0..15).map(|_| rng.gen_range(20.0..400.0)).collect();
        let df = df!("sq_mt_built" => &values).unwrap();
        for strategy in [ImputeStrategy::Mean, ImputeStrategy::Median, ImputeStrategy::MostFrequent] {
            let out = impute_numeric(&df, None, strategy).unwrap();
            assert!(out.equals_missing(&df));
        }
    }
}

#[test]
fn test_outlier_masks_match_length() {
    let values = Series::new("price".into(), &[100.0, 110.0, 105.0, 98.0, 5000.0, 102.0]);
    let iqr = detect_outliers_iqr(&values, 1.5).unwrap();
    let z = detect_outliers_zscore(&values, 2.0).unwrap();
    assert_eq!(iqr.len(), values.len());
    assert_eq!(z.len(), values.len());
    assert!(iqr[4]);

    let constant = Series::new("c".into(), &[3.0; 12]);
    assert!(detect_outliers_iqr(&constant, 1.5).unwrap().iter().all(|f| !f));
    assert!(detect_outliers_zscore(&constant, 3.0).unwrap().iter().all(|f| !f));
}

#[test]
fn test_text_normalization() {
    assert_eq!(normalize_text("Ú"), "u");
    assert_eq!(normalize_text("Chamartín"), "chamartin");
    for token in ["True", "FALSE", "true", "fAlSe"] {
        assert_eq!(normalize_text(token), token);
    }
    for s in ["Salamanca", "Señorío de Illescas", "ÁLAMOS", "Barrio 55"] {
        let once = normalize_text(s);
        assert_eq!(normalize_text(&once), once);
    }
}

#[test]
fn test_target_round_trip() {
    let mut rng = StdRng::seed_from_u64(42);
    for transform in [TargetTransform::Log1p, TargetTransform::Log, TargetTransform::Identity] {
        for _ in 0..200 {
            let price: f64 = rng.gen_range(1.0..5_000_000.0);
            let back = transform.inverse(transform.forward(price).unwrap());
            assert!((back - price).abs() <= price * 1e-9, "{} {}", transform, price);
        }
    }
}

#[test]
fn test_encoder_width_stable_for_unseen_levels() {
    let df = listings();
    let groups = FeatureGroups::new(["sq_mt_built", "n_rooms"], ["neighborhood", "district"], ["has_pool"]);
    let encoder = FeatureEncoder::new(EncoderConfig::default()).fit(&df, &groups).unwrap();

    let a = df!(
        "sq_mt_built" => &[80.0],
        "n_rooms" => &[3i64],
        "neighborhood" => &["55"],
        "district" => &["Centro"],
        "has_pool" => &[0.0]
    )
    .unwrap();
    let b = df!(
        "has_pool" => &[1.0, 0.0],
        "district" => &["Vallecas", "Moratalaz"],
        "neighborhood" => &["9999", "-1"],
        "n_rooms" => &[1i64, 8],
        "sq_mt_built" => &[30.0, 300.0]
    )
    .unwrap();

    let xa = encoder.transform(&a).unwrap();
    let xb = encoder.transform(&b).unwrap();
    assert_eq!(xa.ncols(), xb.ncols());
    assert_eq!(xa.ncols(), encoder.output_width());
    assert_eq!(encoder.feature_names()[0], "sq_mt_built");
    assert_eq!(encoder.feature_names()[1], "n_rooms");

    // unseen levels encode to all-zero blocks
    let categorical: usize = ["neighborhood", "district"]
        .iter()
        .map(|c| encoder.levels(c).unwrap().len())
        .sum();
    let block = xb.slice(ndarray::s![.., 2..2 + categorical]);
    assert!(block.iter().all(|v| *v == 0.0));
}
