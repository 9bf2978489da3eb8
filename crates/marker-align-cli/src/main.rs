use std::{fs, path::Path};

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use marker_align_pipeline::{AlignConfig, AlignStep, FitterContext, InMemoryFitter, Pt3};
use serde::Serialize;
use serde_json::Value;

/// Align a model point cloud to data markers and print the transformed model.
#[derive(Debug, Parser)]
#[command(author, version, about = "Marker based model alignment step")]
struct Args {
    /// Path to JSON scene: model coordinates, model markers and data markers.
    #[arg(long)]
    input: String,

    /// Optional path to a JSON align step settings record.
    #[arg(long)]
    settings: Option<String>,

    /// Optional path to JSON AlignConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<String>,

    /// Fit the transform to markers, overriding the settings record.
    #[arg(long)]
    align_markers: bool,

    /// Increase diagnostic output (-v match messages, -vv solver report).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
struct AlignReport {
    settings: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    rms_error: Option<f64>,
    coordinates: Vec<Pt3>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(value)
}

fn run_align_from_files(
    input_path: &str,
    settings_path: Option<&str>,
    config_path: Option<&str>,
    align_markers: bool,
    verbose: u8,
) -> Result<String> {
    let mut fitter: InMemoryFitter = load_json_file(Path::new(input_path))?;

    let mut config = match config_path {
        Some(path) => load_json_file::<AlignConfig>(Path::new(path))?,
        None => AlignConfig::default(),
    };
    config.diagnostic_level = config.diagnostic_level.max(u32::from(verbose));

    let mut step = AlignStep::with_config(config);
    if let Some(path) = settings_path {
        let record: Value = load_json_file(Path::new(path))?;
        step.decode_settings(&record)
            .with_context(|| format!("invalid settings record {path}"))?;
    }
    if align_markers {
        step.set_align_markers(true);
    }

    step.run(&mut fitter)?;

    let rms_error = step.last_marker_fit().map(|fit| fit.rms_error);
    let report = AlignReport {
        settings: step.encode_settings(),
        rms_error,
        coordinates: fitter.model_coordinates().unwrap_or_default().to_vec(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 | 2 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let json = run_align_from_files(
        &args.input,
        args.settings.as_deref(),
        args.config.as_deref(),
        args.align_markers,
        args.verbose,
    )?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_align_pipeline::{AlignSettings, MarkerNode, NamedPoint, TransformParams};
    use std::path::Path;
    use tempfile::NamedTempFile;

    fn write_json<T: serde::Serialize>(value: &T, path: &Path) {
        serde_json::to_writer_pretty(fs::File::create(path).unwrap(), value).unwrap();
    }

    fn synthetic_scene() -> (InMemoryFitter, TransformParams) {
        let gt = TransformParams {
            rotation: [0.2, -0.1, 0.3],
            scale: 1.5,
            translation: [10.0, -5.0, 2.0],
        };
        let nodes = vec![
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(2.0, 0.0, 0.0),
            Pt3::new(0.0, 2.0, 0.0),
            Pt3::new(0.0, 0.0, 2.0),
        ];
        let names = ["nose", "left ear", "right ear", "chin"];
        let markers = names
            .iter()
            .enumerate()
            .map(|(node, name)| MarkerNode {
                name: name.to_string(),
                node,
            })
            .collect();
        let data = names
            .iter()
            .zip(nodes.iter())
            .map(|(name, p)| NamedPoint::new(name.to_uppercase(), gt.transform_point(p, 1.0)))
            .collect();
        let fitter = InMemoryFitter::new(nodes)
            .with_model_markers(markers)
            .with_data_markers(data);
        (fitter, gt)
    }

    #[test]
    fn helper_aligns_scene_from_files() {
        let (scene, gt) = synthetic_scene();
        let input_file = NamedTempFile::new().unwrap();
        write_json(&scene, input_file.path());

        let json = run_align_from_files(input_file.path().to_str().unwrap(), None, None, true, 0)
            .expect("cli helper should succeed");

        let report: Value = serde_json::from_str(&json).unwrap();
        let settings = AlignSettings::from_record(&report["settings"]).unwrap();
        assert!(settings.align_markers);
        assert!((settings.params.scale - gt.scale).abs() < 1e-6);
        assert!(report["rms_error"].as_f64().unwrap() < 1e-6);
        assert_eq!(report["coordinates"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn helper_applies_stored_settings() {
        let (scene, _) = synthetic_scene();
        let input_file = NamedTempFile::new().unwrap();
        let settings_file = NamedTempFile::new().unwrap();
        write_json(&scene, input_file.path());
        let settings = AlignSettings {
            align_markers: false,
            params: TransformParams {
                scale: 3.0,
                ..TransformParams::identity()
            },
        };
        write_json(&settings.to_record(), settings_file.path());

        let json = run_align_from_files(
            input_file.path().to_str().unwrap(),
            Some(settings_file.path().to_str().unwrap()),
            None,
            false,
            0,
        )
        .unwrap();

        let report: Value = serde_json::from_str(&json).unwrap();
        assert!(report.get("rms_error").is_none());
        let coords: Vec<Pt3> = serde_json::from_value(report["coordinates"].clone()).unwrap();
        assert_eq!(coords[1], Pt3::new(6.0, 0.0, 0.0));
    }
}
