use access_anomaly::{report, reader, AnomalyDetector, DetectorConfig, LogPreprocessor, RawRow};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};

fn init_parallelism(jobs: Option<usize>) {
    let n = jobs.unwrap_or_else(num_cpus::get).max(1);
    let _ = rayon::ThreadPoolBuilder::new().num_threads(n).build_global();
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

#[derive(Parser, Debug)]
#[command(name = "access-anomaly", version, about = "Flag anomalous access-log entries")]
struct Cli {
    /// Input files, CSV with a header or JSON lines (`-` for stdin). All files form one batch.
    #[arg(required = false)]
    input: Vec<String>,

    /// JSON file with a base detector config; flags below override it
    #[arg(long = "config")]
    config: Option<String>,

    #[arg(long = "working-hours-start")] working_hours_start: Option<u32>,
    #[arg(long = "working-hours-end")] working_hours_end: Option<u32>,
    #[arg(long = "contamination")] contamination: Option<f64>,
    #[arg(long = "seed")] seed: Option<u64>,
    #[arg(long = "trees")] trees: Option<usize>,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Worker threads for tree building (defaults to the number of CPUs)
    #[arg(long = "jobs", short = 'j')]
    jobs: Option<usize>,

    /// Print batch statistics to stderr
    #[arg(long = "verbose", short = 'v', default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn detector_config(&self) -> anyhow::Result<DetectorConfig> {
        let mut cfg = match &self.config {
            Some(path) => DetectorConfig::from_json_file(path).with_context(|| format!("loading config {path}"))?,
            None => DetectorConfig::default(),
        };
        if let Some(v) = self.working_hours_start { cfg.working_hours_start = v; }
        if let Some(v) = self.working_hours_end { cfg.working_hours_end = v; }
        if let Some(v) = self.contamination { cfg.contamination = v; }
        if let Some(v) = self.seed { cfg.random_seed = v; }
        if let Some(v) = self.trees { cfg.n_estimators = v; }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn read_inputs(paths: &[String]) -> anyhow::Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    if paths.is_empty() || paths.iter().any(|p| p == "-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        rows.extend(reader::read_rows(&text).context("reading stdin")?);
    }
    for p in paths.iter().filter(|p| *p != "-") {
        rows.extend(reader::read_file(p).with_context(|| format!("reading {p}"))?);
    }
    Ok(rows)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    init_parallelism(cli.jobs);

    let config = cli.detector_config()?;
    let rows = read_inputs(&cli.input)?;
    let records = LogPreprocessor::new(&config).process(&rows)?;
    let detector = AnomalyDetector::new(config)?;
    let results = detector.detect(&records)?;

    if cli.verbose {
        eprintln!("[access-anomaly] rows={} anomalies={}", records.len(), results.len());
    }

    match cli.format {
        OutputFormat::Csv => print!("{}", report::to_csv(&results)?),
        OutputFormat::Summary => println!("{}", serde_json::to_string_pretty(&report::summarize(records.len(), &results))?),
        OutputFormat::Json => println!("{}", report::to_json(&results)?),
    }
    Ok(())
}
