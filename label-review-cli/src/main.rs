use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use label_review::imagery::{BandTriplet, StretchMode};
use label_review::{
    load_assignments, record_review, Config, LabelRequest, LabelReview, LabelStore, LocalStore,
    PgStore, ReviewLog, SiteLabels, SiteSelector,
};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[cfg_attr(not(feature = "local-tiles"), allow(dead_code))]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config with database credentials
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read tables from an exported directory instead of the database
    #[arg(long, value_name = "DIR")]
    local_store: Option<PathBuf>,

    /// Assignment table (CSV: worker_id,name,assignment_id,kml_type)
    #[arg(short, long, value_name = "FILE")]
    assignments: PathBuf,

    /// Labeller whose work is reviewed
    #[arg(short, long)]
    worker: String,

    /// Assignment type code
    #[arg(long, default_value = "Q")]
    kind: String,

    /// Site name, or "random" for an unreviewed site
    #[arg(long, default_value = "random")]
    site: String,

    /// Review log (CSV)
    #[arg(long, value_name = "FILE", default_value = "reviews.csv")]
    review_log: PathBuf,

    /// Output directory for the map
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Local raster tile to show instead of WMS imagery
    #[arg(long, value_name = "FILE")]
    local_tile: Option<PathBuf>,

    /// Bands for the true color composite
    #[arg(long, default_value_t = BandTriplet::TRUE_COLOR)]
    true_color_bands: BandTriplet,

    /// Bands for the false color composite
    #[arg(long, default_value_t = BandTriplet::FALSE_COLOR)]
    false_color_bands: BandTriplet,

    /// Display stretch for local tiles
    #[arg(long, value_enum, default_value_t = Stretch::Percentile)]
    stretch: Stretch,

    /// Percentile clipped at each end with --stretch percentile (0 <= clip < 50)
    #[arg(long, default_value_t = 1.0, value_parser = parse_clip)]
    clip: f64,

    /// Also rate the expert labels
    #[arg(long)]
    rate_expert: bool,

    /// Write the map without asking for a rating
    #[arg(long)]
    no_rating: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Stretch {
    MinMax,
    Percentile,
}

// At 50 or more the low and high percentiles meet and every pixel turns black.
fn parse_clip(value: &str) -> Result<f64, String> {
    let clip: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if (0.0..50.0).contains(&clip) {
        Ok(clip)
    } else {
        Err(format!("clip must be in [0, 50), got {value}"))
    }
}

impl Args {
    #[cfg_attr(not(feature = "local-tiles"), allow(dead_code))]
    fn stretch_mode(&self) -> StretchMode {
        match self.stretch {
            Stretch::MinMax => StretchMode::MinMax,
            Stretch::Percentile => StretchMode::Percentile { clip: self.clip },
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ログの初期化（プロンプトは標準出力、ログは標準エラー）
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    // CLI引数の解析
    let args = Args::parse();

    // 設定ファイルの読み込み
    let config = match &args.config {
        Some(path) => Some(
            Config::load(path).with_context(|| format!("Failed to load config {:?}", path))?,
        ),
        None => None,
    };
    let settings = config
        .as_ref()
        .map(|c| c.review.clone())
        .unwrap_or_default();

    if let Some(dir) = &args.local_store {
        info!("Using local store: {:?}", dir);
        let store = LocalStore::open(dir).context("Failed to open local store")?;
        let review = LabelReview::new(store, settings).await?;
        run(&review, &args).await
    } else {
        let Some(config) = config else {
            anyhow::bail!("Either --config or --local-store is required");
        };
        let store = PgStore::connect(&config.labeller)
            .await
            .context("Failed to connect to the labelling database")?;
        let review = LabelReview::new(store, settings).await?;
        run(&review, &args).await
    }
}

async fn run<S: LabelStore>(review: &LabelReview<S>, args: &Args) -> Result<()> {
    let assignments = load_assignments(&args.assignments)
        .with_context(|| format!("Failed to load assignments {:?}", args.assignments))?;
    info!("Loaded {} assignments", assignments.len());

    let log = ReviewLog::new(&args.review_log);
    let request = LabelRequest::new(&args.worker)
        .kind(&args.kind)
        .site(SiteSelector::parse(&args.site));

    // サイトの選択とラベルの取得
    let mut rng = rand::rng();
    let labels = review
        .get_labels(&assignments, &request, &log, &mut rng)
        .await?;

    // 地図の出力
    fs::create_dir_all(&args.output)?;
    let map_path = args.output.join(format!("{}.html", labels.name()));
    let map = match &args.local_tile {
        Some(tile) => plot_local(&labels, tile, args)?,
        None => review.plot_labels(&labels)?,
    };
    map.write(&map_path)?;
    println!("Map written to {}", map_path.display());

    if args.no_rating {
        return Ok(());
    }

    // 評価の記録
    let rate_expert = args.rate_expert && labels.expert.is_some();
    if args.rate_expert && !rate_expert {
        warn!("No expert labels on {}, skipping expert rating", labels.name());
    }
    let stdin = io::stdin();
    let records = record_review(
        &log,
        &labels,
        rate_expert,
        &mut stdin.lock(),
        &mut io::stdout(),
    )?;
    info!("Recorded {} rating(s) in {:?}", records.len(), log.path());

    Ok(())
}

#[cfg(feature = "local-tiles")]
fn plot_local(
    labels: &SiteLabels,
    tile: &std::path::Path,
    args: &Args,
) -> Result<label_review::MapDocument> {
    let map = label_review::workflow::plot_labels_local(
        labels,
        tile,
        &args.output,
        [args.true_color_bands, args.false_color_bands],
        args.stretch_mode(),
    )
    .with_context(|| format!("Failed to render local tile {:?}", tile))?;
    Ok(map)
}

#[cfg(not(feature = "local-tiles"))]
fn plot_local(
    _labels: &SiteLabels,
    _tile: &std::path::Path,
    _args: &Args,
) -> Result<label_review::MapDocument> {
    anyhow::bail!("Local tiles need the `local-tiles` feature (requires GDAL)")
}
