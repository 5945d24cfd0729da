#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use tally_core::ReservoirKind;
use tally_registry::config::{self, ReservoirChoice};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
histograms:
  reservoir: uniform
  sise: 128 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.histograms.reservoir, ReservoirChoice::ExponentiallyDecaying);
    assert_eq!(cfg.histograms.size, 1028);
    assert_eq!(cfg.histograms.reservoir_kind(), ReservoirKind::default());
}

#[test]
fn full_config_round_trips_into_reservoir_kind() {
    let ok = r#"
version: 1
histograms:
  reservoir: exponentially_decaying
  size: 512
  alpha: 0.01
  rescale_threshold_secs: 1800
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(
        cfg.histograms.reservoir_kind(),
        ReservoirKind::ExponentiallyDecaying {
            size: 512,
            alpha: 0.01,
            rescale_threshold_secs: 1800,
        }
    );
}

#[test]
fn rejects_out_of_range_values() {
    let cases = [
        "version: 2\n",
        "version: 1\nhistograms:\n  size: 0\n",
        "version: 1\nhistograms:\n  alpha: 0.0\n",
        "version: 1\nhistograms:\n  alpha: 1.5\n",
        "version: 1\nhistograms:\n  rescale_threshold_secs: 10\n",
        "version: 1\nhistograms:\n  alpha: 0.5\n  rescale_threshold_secs: 3600\n",
        "version: 1\nhistograms:\n  reservoir: hdr\n",
    ];
    for case in cases {
        let err = config::load_from_str(case).expect_err(case);
        assert_eq!(err.code().as_str(), "INVALID_CONFIG", "case={case}");
    }
}

#[test]
fn missing_file_is_a_config_error() {
    let err = config::load_from_file("/nonexistent/tally.yaml").expect_err("must fail");
    assert!(err.to_string().contains("read config failed"));
}
