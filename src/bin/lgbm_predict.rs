//! Score a CSV file with a LightGBM model.
//!
//! ```text
//! lgbm_predict <model> <data.csv> [--config FILE] [--predict-type KIND]
//!              [--num-iteration N] [--start-iteration N] [--threads N]
//!              [--no-header] [--delimiter C]
//! ```
//!
//! Settings are layered: defaults, then `--config` (or `lightgbm.toml` in
//! the working directory when present), then `LIGHTGBM_*`
//! environment variables, then command line flags. Predictions are written
//! to stdout as CSV, one line per input row.

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use lightgbm_predict::config::DEFAULT_CONFIG_FILE;
use lightgbm_predict::{Ensemble, PredictType, PredictionConfig, Predictor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
struct Args {
    model: PathBuf,
    data: PathBuf,
    config: Option<PathBuf>,
    predict_type: Option<PredictType>,
    num_iteration: Option<i32>,
    start_iteration: Option<i32>,
    threads: Option<usize>,
    has_header: bool,
    delimiter: u8,
}

const USAGE: &str = "usage: lgbm_predict <model> <data.csv> [--config FILE] \
[--predict-type normal|raw_score|leaf_index|contrib] [--num-iteration N] \
[--start-iteration N] [--threads N] [--no-header] [--delimiter C]";

impl Args {
    fn parse<I: Iterator<Item = String>>(mut argv: I) -> Result<Self> {
        let mut positional = Vec::new();
        let mut args = Args {
            model: PathBuf::new(),
            data: PathBuf::new(),
            config: None,
            predict_type: None,
            num_iteration: None,
            start_iteration: None,
            threads: None,
            has_header: true,
            delimiter: b',',
        };

        while let Some(arg) = argv.next() {
            let mut value = |flag: &str| {
                argv.next()
                    .with_context(|| format!("{} needs a value\n{}", flag, USAGE))
            };
            match arg.as_str() {
                "--config" => args.config = Some(PathBuf::from(value("--config")?)),
                "--predict-type" => {
                    let kind = value("--predict-type")?;
                    args.predict_type = Some(
                        kind.parse()
                            .map_err(|e: String| anyhow::anyhow!(e))
                            .context("invalid --predict-type")?,
                    );
                }
                "--num-iteration" => {
                    args.num_iteration = Some(value("--num-iteration")?.parse()?);
                }
                "--start-iteration" => {
                    args.start_iteration = Some(value("--start-iteration")?.parse()?);
                }
                "--threads" => args.threads = Some(value("--threads")?.parse()?),
                "--no-header" => args.has_header = false,
                "--delimiter" => {
                    let delimiter = value("--delimiter")?;
                    match delimiter.as_bytes() {
                        [byte] => args.delimiter = *byte,
                        _ => bail!("--delimiter takes a single character"),
                    }
                }
                "-h" | "--help" => {
                    println!("{}", USAGE);
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => bail!("unknown flag {}\n{}", flag, USAGE),
                _ => positional.push(PathBuf::from(arg)),
            }
        }

        match <[PathBuf; 2]>::try_from(positional) {
            Ok([model, data]) => {
                args.model = model;
                args.data = data;
                Ok(args)
            }
            Err(_) => bail!("expected a model and a data file\n{}", USAGE),
        }
    }

    fn prediction_config(&self) -> Result<PredictionConfig> {
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        let source = match &self.config {
            Some(path) => Some(path.as_path()),
            None => fallback.is_file().then_some(fallback),
        };
        let mut config = match source {
            Some(path) => PredictionConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PredictionConfig::default(),
        };
        config.apply_environment_overrides()?;
        if let Some(kind) = self.predict_type {
            config.predict_type = kind;
        }
        if let Some(n) = self.num_iteration {
            config.num_iteration = n;
        }
        if let Some(n) = self.start_iteration {
            config.start_iteration = n;
        }
        if let Some(n) = self.threads {
            config.num_threads = n;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Missing markers become NaN.
fn parse_cell(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed == "?"
    {
        return Some(f64::NAN);
    }
    trimmed.parse().ok()
}

fn read_matrix(args: &Args) -> Result<(Vec<f64>, usize, usize)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(args.delimiter)
        .has_headers(args.has_header)
        .from_path(&args.data)
        .with_context(|| format!("opening {}", args.data.display()))?;

    let mut data = Vec::new();
    let mut ncol = None;
    let mut nrow = 0;
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", row + 1))?;
        let width = *ncol.get_or_insert(record.len());
        if record.len() != width {
            bail!("row {} has {} fields, expected {}", row + 1, record.len(), width);
        }
        for (col, cell) in record.iter().enumerate() {
            let value = parse_cell(cell)
                .with_context(|| format!("invalid value '{}' at row {}, column {}", cell, row + 1, col))?;
            data.push(value);
        }
        nrow += 1;
    }
    Ok((data, nrow, ncol.unwrap_or(0)))
}

fn main() -> Result<()> {
    lightgbm_predict::init()?;
    let args = Args::parse(std::env::args().skip(1))?;
    let config = args.prediction_config()?;

    let ensemble = Ensemble::from_file(&args.model)
        .with_context(|| format!("loading model {}", args.model.display()))?;
    let predictor = Predictor::new(Arc::new(ensemble), config)?;

    let (data, nrow, ncol) = read_matrix(&args)?;
    log::info!("Scoring {} rows from {}", nrow, args.data.display());
    let predictions = predictor.predict_for_mat(&data, nrow, ncol, true)?;

    let width = predictor.num_predict_per_row();
    let mut writer = WriterBuilder::new().from_writer(std::io::stdout().lock());
    if width > 0 {
        for row in predictions.chunks(width) {
            writer.write_record(row.iter().map(|value| format!("{}", value)))?;
        }
    }
    writer.flush()?;
    Ok(())
}
