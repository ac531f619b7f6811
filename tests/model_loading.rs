//! Integration tests for loading, validating and saving models.

mod common;

use common::*;
use flate2::write::GzEncoder;
use lightgbm_predict::*;
use std::io::{Cursor, Write};
use tempfile::tempdir;

fn parse(text: &str) -> std::result::Result<Ensemble, ParseError> {
    text.parse::<Ensemble>()
}

#[test]
fn test_header_attributes() {
    let ensemble = load(BINARY_MODEL);
    assert_eq!(ensemble.version(), "v4");
    assert_eq!(ensemble.num_class(), 1);
    assert_eq!(ensemble.num_iterations(), 2);
    assert_eq!(ensemble.num_features(), 3);
    assert_eq!(ensemble.feature_names(), &["a", "b", "c"]);
    assert_eq!(ensemble.feature_infos()[1], "1:2:3");
    assert_eq!(*ensemble.objective(), Objective::Binary { sigmoid: 1.0 });
    assert!(!ensemble.average_output());

    let multiclass = load(&multiclass_model_text());
    assert_eq!(multiclass.num_class(), 3);
    assert_eq!(multiclass.num_iterations(), NUM_MULTICLASS_ITERATIONS);
    assert_eq!(multiclass.trees().len(), 9);
    assert_eq!(*multiclass.objective(), Objective::Multiclass { num_class: 3 });
}

#[test]
fn test_tree_structure() {
    let ensemble = load(BINARY_MODEL);
    let numeric = &ensemble.trees()[0];
    assert_eq!(numeric.num_leaves(), 3);
    assert_eq!(numeric.num_internal(), 2);
    assert_eq!(numeric.max_depth(), 2);

    let categorical = &ensemble.trees()[1];
    assert_eq!(categorical.num_categorical(), 1);
    match &categorical.nodes()[0] {
        Node::Categorical(split) => {
            assert!(split.contains(1));
            assert!(split.contains(2));
            assert!(!split.contains(0));
            assert!(!split.contains(3));
            assert_eq!(split.missing_type, MissingType::NaN);
            assert!(!split.default_left);
        }
        other => panic!("expected a categorical root, found {:?}", other),
    }
}

#[test]
fn test_feature_importance() {
    let ensemble = load(BINARY_MODEL);
    assert_eq!(ensemble.feature_importance(ImportanceType::Split), vec![1.0, 1.0, 1.0]);
    assert_eq!(ensemble.feature_importance(ImportanceType::Gain), vec![12.5, 9.0, 3.25]);
}

#[test]
fn test_text_round_trip() {
    for text in [SINGLE_SPLIT_MODEL.to_string(), BINARY_MODEL.to_string(), multiclass_model_text()] {
        let ensemble = parse(&text).unwrap();
        let written = ensemble.to_model_string();
        let reparsed = parse(&written).unwrap();
        assert_eq!(reparsed, ensemble);
        // Writing is deterministic
        assert_eq!(reparsed.to_model_string(), written);
    }
}

#[test]
fn test_text_round_trip_of_interleaved_arena() {
    // Leaves mixed in between the splits
    let tree = Tree::from_nodes(
        vec![
            Node::Numeric(NumericSplit::new(0, 0.0, 1, 2)),
            Node::leaf(10.0),
            Node::Numeric(NumericSplit::new(0, 1.0, 3, 4).with_missing(MissingType::NaN, true)),
            Node::leaf(20.0),
            Node::leaf(30.0),
        ],
        0.1,
    )
    .unwrap();
    let ensemble = Ensemble::builder(1, Objective::Binary { sigmoid: 1.0 })
        .tree(tree)
        .build()
        .unwrap();

    let reparsed = parse(&ensemble.to_model_string()).unwrap();
    assert_eq!(reparsed, ensemble);
    for row in [[-1.0], [0.5], [2.0], [f64::NAN]] {
        assert_eq!(
            reparsed.trees()[0].leaf_node(&row).unwrap(),
            ensemble.trees()[0].leaf_node(&row).unwrap()
        );
    }
}

#[test]
fn test_file_round_trip_in_every_encoding() {
    let ensemble = load(BINARY_MODEL);
    let dir = tempdir().unwrap();
    for name in [
        "model.txt",
        "model.txt.gz",
        "model.txt.zst",
        "model.txt.lz4",
        "model.bin",
        "model.bin.gz",
        "model.snapshot.zst",
    ] {
        let path = dir.path().join(name);
        ensemble.save_model(&path).unwrap();
        let loaded = Ensemble::from_file(&path).unwrap();
        assert_eq!(loaded, *ensemble, "round trip through {}", name);
    }
}

#[test]
fn test_gzip_source_from_another_writer() {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(SINGLE_SPLIT_MODEL.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let from_bytes = Ensemble::from_bytes(&compressed).unwrap();
    let from_reader = Ensemble::from_reader(Cursor::new(compressed)).unwrap();
    assert_eq!(from_bytes, *load(SINGLE_SPLIT_MODEL));
    assert_eq!(from_reader, from_bytes);
}

#[test]
fn test_missing_file_is_source_unavailable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.txt");
    let err = Ensemble::from_file(&path).unwrap_err();
    match err {
        ParseError::SourceUnavailable { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected SourceUnavailable, got {}", other),
    }
}

#[test]
fn test_header_errors_name_the_field() {
    let err = parse(&SINGLE_SPLIT_MODEL.replace("num_class=1\n", "")).unwrap_err();
    assert!(matches!(
        err,
        ParseError::MissingField { location: Location::Header, field: "num_class" }
    ));
    assert!(err.to_string().contains("num_class"));

    let err = parse(&SINGLE_SPLIT_MODEL.replace("max_feature_idx=0", "max_feature_idx=zero"))
        .unwrap_err();
    assert!(matches!(err, ParseError::InvalidValue { location: Location::Header, .. }));
    assert!(err.to_string().contains("max_feature_idx"));

    let err = parse(&SINGLE_SPLIT_MODEL.replace("version=v3", "version=v9")).unwrap_err();
    assert!(matches!(err, ParseError::UnsupportedVersion { ref version } if version == "v9"));

    let err = parse(&SINGLE_SPLIT_MODEL.replacen("tree\n", "booster\n", 1)).unwrap_err();
    assert!(matches!(err, ParseError::MalformedHeader { .. }));

    let err = parse("").unwrap_err();
    assert!(matches!(err, ParseError::MalformedHeader { .. }));
}

#[test]
fn test_tree_field_errors_name_tree_and_field() {
    let err = parse(&SINGLE_SPLIT_MODEL.replace("leaf_value=-1 2", "leaf_value=-1 2 3")).unwrap_err();
    match err {
        ParseError::CountMismatch { location, field, expected, actual } => {
            assert_eq!(location, Location::Tree(0));
            assert_eq!(field, "leaf_value");
            assert_eq!((expected, actual), (2, 3));
        }
        other => panic!("expected CountMismatch, got {}", other),
    }

    let err = parse(&BINARY_MODEL.replace("cat_threshold=6\n", "")).unwrap_err();
    assert!(matches!(
        err,
        ParseError::MissingField { location: Location::Tree(1), field: "cat_threshold" }
    ));
    assert!(err.to_string().contains("tree 1"));

    let err = parse(&BINARY_MODEL.replace("threshold=1.5 0", "threshold=1.5 low")).unwrap_err();
    assert!(matches!(err, ParseError::InvalidValue { location: Location::Tree(0), .. }));
}

#[test]
fn test_rejects_dangling_child() {
    let err = parse(&BINARY_MODEL.replace("right_child=-1 -3", "right_child=-1 -4")).unwrap_err();
    assert!(matches!(err, ParseError::InvalidTree { tree: 0, node: 1, .. }));

    let err = parse(&BINARY_MODEL.replace("left_child=1 -2", "left_child=2 -2")).unwrap_err();
    assert!(matches!(err, ParseError::InvalidTree { tree: 0, node: 0, .. }));
}

#[test]
fn test_rejects_cycles_and_self_references() {
    // Node 1 points back at the root
    let err = parse(&BINARY_MODEL.replace("left_child=1 -2", "left_child=1 0")).unwrap_err();
    assert!(matches!(err, ParseError::InvalidTree { tree: 0, node: 1, .. }));

    let err = parse(&BINARY_MODEL.replace("left_child=1 -2", "left_child=0 -2")).unwrap_err();
    assert!(matches!(err, ParseError::InvalidTree { tree: 0, node: 0, .. }));
}

#[test]
fn test_rejects_shared_leaf() {
    let err = parse(&BINARY_MODEL.replace("right_child=-1 -3", "right_child=-1 -2")).unwrap_err();
    assert!(matches!(err, ParseError::InvalidTree { tree: 0, .. }));
}

#[test]
fn test_rejects_feature_beyond_max_feature_idx() {
    let err = parse(&SINGLE_SPLIT_MODEL.replace("split_feature=0", "split_feature=3")).unwrap_err();
    assert!(matches!(err, ParseError::InvalidTree { tree: 0, node: 0, .. }));
}

#[test]
fn test_rejects_inconsistent_counts() {
    let err = parse(&BINARY_MODEL.replace("tree_sizes=420 380", "tree_sizes=420")).unwrap_err();
    assert!(matches!(err, ParseError::CountMismatch { location: Location::Header, .. }));

    let text = multiclass_model_text().replace("num_tree_per_iteration=3", "num_tree_per_iteration=2");
    let err = parse(&text).unwrap_err();
    assert!(matches!(
        err,
        ParseError::CountMismatch { ref field, .. } if field == "num_tree_per_iteration"
    ));

    let err = parse(&BINARY_MODEL.replace("num_cat=1", "num_cat=2")).unwrap_err();
    assert!(matches!(
        err,
        ParseError::CountMismatch { location: Location::Tree(1), ref field, .. } if field == "cat_boundaries"
    ));
}

#[test]
fn test_rejects_out_of_order_blocks() {
    let err = parse(&BINARY_MODEL.replace("Tree=1", "Tree=2")).unwrap_err();
    assert!(matches!(
        err,
        ParseError::InvalidValue { location: Location::Tree(1), ref field, .. } if field == "Tree"
    ));
}

#[test]
fn test_rejects_linear_trees() {
    let text = SINGLE_SPLIT_MODEL.replace("is_linear=0", "is_linear=1");
    let err = parse(&text).unwrap_err();
    assert!(matches!(err, ParseError::Unsupported { location: Location::Tree(0), .. }));
}

#[test]
fn test_trailer_is_ignored() {
    let text = format!("{}\nthis trailer is not a model section=1\n", SINGLE_SPLIT_MODEL);
    assert_eq!(parse(&text).unwrap(), *load(SINGLE_SPLIT_MODEL));
}

#[test]
fn test_parse_error_converts_to_crate_error() {
    fn load_model(text: &str) -> Result<Ensemble> {
        Ok(text.parse::<Ensemble>()?)
    }
    let err = load_model("tree\n").unwrap_err();
    assert_eq!(err.category(), "parse");
    assert!(!err.is_recoverable());
}
