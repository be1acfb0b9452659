use tracing::{error, info};

use vinyl_scout::core::config;
use vinyl_scout::scraping::{DirSnapshots, NoSnapshots, SnapshotSink};
use vinyl_scout::{sink, CdpSession, Pipeline};

/// `--genre <label>` or `--genre=<label>`.
fn parse_genre_from_args() -> Option<String> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--genre" {
            if let Some(v) = args.next() {
                let v = v.trim().to_string();
                if !v.is_empty() {
                    return Some(v);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--genre=") {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

fn include_out_of_stock_flag() -> bool {
    std::env::args().any(|a| a == "--include-out-of-stock")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chromiumoxide=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut cfg = config::load_config();
    if let Some(genre) = parse_genre_from_args() {
        cfg.genre = genre;
    }
    if include_out_of_stock_flag() {
        cfg.include_out_of_stock = true;
    }
    let spec = cfg.filter_spec();

    info!(
        "Starting vinyl-scout: genre={:?} out_of_stock={} output={}",
        spec.genre_label,
        spec.include_out_of_stock,
        cfg.output_path.display()
    );

    let session = match CdpSession::launch_auto(cfg.headless, cfg.timeouts.page_load()).await {
        Ok(s) => s,
        Err(e) => {
            // No browser means the grid is unreachable: header-only output, failing exit.
            error!("browser launch failed: {}", e);
            sink::write_csv(&cfg.output_path, &[])?;
            return Err(e.into());
        }
    };

    let dir_snapshots = cfg.snapshot_dir.clone().map(DirSnapshots::new);
    let snapshots: &dyn SnapshotSink = match &dir_snapshots {
        Some(dir) => {
            info!("debug snapshots enabled");
            dir
        }
        None => &NoSnapshots,
    };

    let pipeline = Pipeline::new(&cfg).with_snapshots(snapshots);
    let (records, report, session) = pipeline.run(session, &spec).await;
    session.close().await;

    sink::write_csv(&cfg.output_path, &records)?;
    info!(
        "Done: {} items, {} detail pages tried, {} sentinel, {} restarts",
        report.items_collected,
        report.enrichment_attempted,
        report.enrichment_failed,
        report.session_restarts
    );
    Ok(())
}
