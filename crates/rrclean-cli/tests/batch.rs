use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

#[test]
fn batch_cleans_cohort_and_reports_failures() -> Result<(), Box<dyn Error>> {
    let root = workspace_root();
    let out_dir = tempfile::tempdir()?;
    let mut cmd = cargo_bin_cmd!("rrclean");
    cmd.arg("batch")
        .arg("--registry")
        .arg(root.join("config/cohort.toml"))
        .arg("--input-dir")
        .arg(root.join("test_data/raw"))
        .arg("--output-dir")
        .arg(out_dir.path())
        .arg("--raw");
    let out = cmd.assert().success().get_output().stdout.clone();
    let summary: Value = serde_json::from_slice(&out)?;
    assert_eq!(summary["succeeded"], 4);
    assert_eq!(summary["failed"], 1);

    let failed: Vec<&Value> = summary["files"]
        .as_array()
        .expect("files")
        .iter()
        .filter(|f| f["status"] == "failed")
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0]["file"]
        .as_str()
        .unwrap_or_default()
        .ends_with("Eros_int_1.txt"));

    let dir = out_dir.path();
    for name in [
        "batch_summary.json",
        "steinosk_activity_intensity_1_cleaned_lsdlpr25.csv",
        "steinosk_activity_intensity_2_cleaned_lsdlpr25.csv",
        "linamic_activity_intensity_3_cleaned_lsdlpr25.csv",
        "halero01_activity_intensity_2_cleaned_lsdlpr25.csv",
        "steinosk_activity_intensity_1_lsdlpr25.csv",
        "steinosk_activity_lsdlpr25.csv",
        "linamic_activity_lsdlpr25.csv",
        "halero01_activity_lsdlpr25.csv",
    ] {
        assert!(dir.join(name).exists(), "missing {name}");
    }

    let mut reader = csv::Reader::from_path(dir.join("steinosk_activity_lsdlpr25.csv"))?;
    let headers = reader.headers()?.clone();
    assert_eq!(headers.get(0), Some("time"));
    assert_eq!(headers.get(1), Some("person_id"));
    assert_eq!(headers.get(headers.len() - 2), Some("intensity"));
    assert_eq!(headers.get(headers.len() - 1), Some("bpm"));
    let intensities: Vec<String> = reader
        .records()
        .map(|r| r.map(|r| r[headers.len() - 2].to_string()))
        .collect::<Result<_, _>>()?;
    assert_eq!(intensities.len(), 35);
    assert_eq!(intensities.first().map(String::as_str), Some("0"));
    assert_eq!(intensities.last().map(String::as_str), Some("1"));
    Ok(())
}

#[test]
fn batch_fails_on_missing_input_dir() -> Result<(), Box<dyn Error>> {
    let root = workspace_root();
    let out_dir = tempfile::tempdir()?;
    let mut cmd = cargo_bin_cmd!("rrclean");
    cmd.arg("batch")
        .arg("--registry")
        .arg(root.join("config/cohort.toml"))
        .arg("--input-dir")
        .arg(root.join("test_data/does_not_exist"))
        .arg("--output-dir")
        .arg(out_dir.path());
    cmd.assert().failure();
    Ok(())
}
