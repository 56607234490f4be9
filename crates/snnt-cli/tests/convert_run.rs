use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::error::Error;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn snnt() -> Result<Command, Box<dyn Error>> {
    Ok(Command::cargo_bin("snnt")?)
}

/// Two inputs, two outputs, each input drives one output
fn write_fixtures(dir: &Path) -> Result<(PathBuf, PathBuf, PathBuf), Box<dyn Error>> {
    let config = dir.join("config.toml");
    std::fs::write(&config, "[simulation]\nduration = 100.0\npoisson_input = true\n")?;

    let model = dir.join("model.json");
    let model_json = json!({
        "input_shape": [2],
        "layers": [{
            "class_name": "Dense",
            "name": "dense_1",
            "output_shape": [2],
            "activation": "softmax",
            "weights": {"shape": [2, 2], "data": [2.0, -0.5, -0.5, 2.0]},
            "biases": [0.0, 0.0]
        }]
    });
    std::fs::write(&model, serde_json::to_string(&model_json)?)?;

    let dataset = dir.join("data.json");
    let data_json = json!({
        "samples": [[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]],
        "labels": [0, 1, 0]
    });
    std::fs::write(&dataset, serde_json::to_string(&data_json)?)?;

    Ok((config, model, dataset))
}

fn setup() -> Result<(TempDir, PathBuf, PathBuf, PathBuf), Box<dyn Error>> {
    let tmp = tempdir()?;
    let (config, model, dataset) = write_fixtures(tmp.path())?;
    Ok((tmp, config, model, dataset))
}

#[test]
fn convert_writes_assembly_and_connections() -> Result<(), Box<dyn Error>> {
    let (tmp, config, model, _) = setup()?;
    let out = tmp.path().join("snn");

    snnt()?
        .arg("--config").arg(&config)
        .arg("convert")
        .arg("--model").arg(&model)
        .arg("--out").arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Converted 2 populations, 2 projections"));

    assert!(out.join("assembly.bin").is_file());
    let connections = std::fs::read_to_string(out.join("dense_1"))?;
    assert!(connections.starts_with("# columns = [\"i\", \"j\", \"weight\", \"delay\"]"));
    assert_eq!(connections.lines().count(), 5);

    snnt()?
        .arg("inspect")
        .arg("--assembly").arg(out.join("assembly.bin"))
        .arg("--connections")
        .assert()
        .success()
        .stdout(predicate::str::contains("InputLayer"))
        .stdout(predicate::str::contains("IF_cond_exp"))
        .stdout(predicate::str::contains("4 connections (2 excitatory, 2 inhibitory)"));

    Ok(())
}

#[test]
fn run_reports_accuracy() -> Result<(), Box<dyn Error>> {
    let (tmp, config, model, dataset) = setup()?;
    let results = tmp.path().join("results.json");

    snnt()?
        .arg("--config").arg(&config)
        .arg("run")
        .arg("--model").arg(&model)
        .arg("--dataset").arg(&dataset)
        .arg("--output").arg(&results)
        .assert()
        .success()
        .stdout(predicate::str::contains("Accuracy: 100.00% (3/3)"));

    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&results)?)?;
    assert_eq!(report["samples"], 3);
    assert_eq!(report["results"][1]["guess"], 1);
    Ok(())
}

#[test]
fn run_from_saved_assembly() -> Result<(), Box<dyn Error>> {
    let (tmp, config, model, dataset) = setup()?;
    let out = tmp.path().join("snn");

    snnt()?
        .arg("--config").arg(&config)
        .args(["convert", "--name", "net.bin", "--model"]).arg(&model)
        .arg("--out").arg(&out)
        .assert()
        .success();

    snnt()?
        .arg("--config").arg(&config)
        .arg("run")
        .arg("--assembly").arg(&out)
        .args(["--name", "net.bin"])
        .arg("--dataset").arg(&dataset)
        .assert()
        .success()
        .stdout(predicate::str::contains("Accuracy: 100.00%"));

    std::fs::remove_file(out.join("dense_1"))?;
    snnt()?
        .arg("--config").arg(&config)
        .arg("run")
        .arg("--assembly").arg(&out)
        .args(["--name", "net.bin"])
        .arg("--dataset").arg(&dataset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Connections were not found"));
    Ok(())
}

#[test]
fn constant_current_input_is_not_implemented() -> Result<(), Box<dyn Error>> {
    let (tmp, _, model, dataset) = setup()?;
    let config = tmp.path().join("currents.toml");
    std::fs::write(&config, "[simulation]\nduration = 10.0\n")?;

    snnt()?
        .arg("--config").arg(&config)
        .arg("run")
        .arg("--model").arg(&model)
        .arg("--dataset").arg(&dataset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not implemented: constant input currents"));
    Ok(())
}

#[test]
fn unsupported_layer_is_rejected() -> Result<(), Box<dyn Error>> {
    let (tmp, config, _, _) = setup()?;
    let model = tmp.path().join("bad.json");
    let model_json = json!({
        "input_shape": [2],
        "layers": [{"class_name": "LSTM", "name": "lstm_1", "output_shape": [2]}]
    });
    std::fs::write(&model, serde_json::to_string(&model_json)?)?;

    snnt()?
        .arg("--config").arg(&config)
        .arg("convert")
        .arg("--model").arg(&model)
        .arg("--out").arg(tmp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported layer 'lstm_1'"));
    Ok(())
}

#[test]
fn config_init_and_show() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let path = tmp.path().join("snnt").join("config.toml");

    snnt()?
        .arg("--config").arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(path.is_file());

    snnt()?
        .arg("--config").arg(&path)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    snnt()?
        .arg("--config").arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("duration = 200.0"))
        .stdout(predicate::str::contains("keras_backend = \"tensorflow\""));
    Ok(())
}
