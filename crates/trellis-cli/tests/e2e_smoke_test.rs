use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::tempdir;

use trellis_cli::{Args, CliError};

fn demos_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

/// Collects all .json files from a directory
fn collect_json_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(&dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
            })
            .collect()
    } else {
        Vec::new()
    };

    // Sort for consistent test output
    files.sort();
    files
}

fn args_for(input: &Path, output: &Path) -> Args {
    Args {
        input: input.to_string_lossy().to_string(),
        output: output.to_string_lossy().to_string(),
        config: None,
        layout: None,
        log_level: "off".to_string(),
    }
}

#[test]
fn e2e_smoke_test_valid_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");

    let demos = collect_json_files(demos_dir());
    assert!(!demos.is_empty(), "No demos found in demos/");

    let mut failed = Vec::new();
    for demo in &demos {
        let output_path = temp_dir.path().join(format!(
            "{}.svg",
            demo.file_stem().unwrap().to_string_lossy()
        ));

        match trellis_cli::run(&args_for(demo, &output_path)) {
            Ok(()) => {
                let svg = fs::read_to_string(&output_path).expect("Output should exist");
                assert!(svg.contains("<svg"), "{} produced no SVG", demo.display());
                assert!(svg.contains("</svg>"), "{} produced a truncated SVG", demo.display());
            }
            Err(err) => failed.push((demo.clone(), err)),
        }
    }

    if !failed.is_empty() {
        eprintln!("\nDemos that failed:");
        for (path, err) in &failed {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} demo(s) failed unexpectedly", failed.len());
    }
}

#[test]
fn e2e_smoke_test_error_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");

    let demos = collect_json_files(demos_dir().join("errors"));
    assert!(!demos.is_empty(), "No error demos found in demos/errors/");

    for demo in &demos {
        let output_path = temp_dir.path().join("error.svg");
        let result = trellis_cli::run(&args_for(demo, &output_path));

        assert!(result.is_err(), "{} should fail", demo.display());
        assert!(
            !output_path.exists(),
            "{} should not produce output",
            demo.display()
        );
    }
}

#[test]
fn e2e_layout_override() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let output_path = temp_dir.path().join("grid.svg");

    let mut args = args_for(&demos_dir().join("topology.json"), &output_path);
    args.layout = Some("grid".to_string());
    trellis_cli::run(&args).expect("Override with a built-in layout should succeed");
    assert!(output_path.exists());

    args.layout = Some("spiral".to_string());
    let err = trellis_cli::run(&args).unwrap_err();
    assert!(matches!(err, CliError::Trellis(trellis::Error::Configuration(_))));
}

#[test]
fn e2e_replay_removes_absent_nodes() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let output_path = temp_dir.path().join("replay.svg");

    trellis_cli::run(&args_for(&demos_dir().join("replay.json"), &output_path))
        .expect("Replay should succeed");

    let svg = fs::read_to_string(&output_path).unwrap();
    assert!(svg.contains("data-id=\"d\""));
    assert!(!svg.contains("data-id=\"b\""));
    // The orphaned child of the removed node is still drawn.
    assert!(svg.contains("data-id=\"c\""));
}

#[test]
fn e2e_missing_input() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let result = trellis_cli::run(&args_for(
        &temp_dir.path().join("missing.json"),
        &temp_dir.path().join("out.svg"),
    ));

    assert!(matches!(result, Err(CliError::Read { .. })));
}
