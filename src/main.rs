//! CLIエントリポイント
//!
//! スケジューラ (cron) から1日1回起動される前提。終了コード:
//! 0 = 成功または部分成功 (1件以上のレートを取得)、1 = 致命的エラー。

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use exrate_scraper::{Pipeline, RunConfig};

#[derive(Debug, Parser)]
#[command(name = "exrate-scraper")]
struct Args {
    /// ログを詳細化しタイムアウトを延長する
    #[arg(long)]
    debug: bool,

    /// 永続化をスキップする (MongoDB接続不要)
    #[arg(long)]
    dry_run: bool,

    /// 対象日 (YYYY-MM-DD)。未指定ならコロンボ時間の当日
    #[arg(long)]
    date: Option<String>,

    /// ブラウザを表示モードで起動する (ローカルデバッグ用)
    #[arg(long)]
    headful: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_filter = if args.debug {
        "info,exrate_scraper=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(args).await {
        Ok(()) => {
            info!("Scraper run finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Scraper run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), exrate_scraper::ScrapeError> {
    let config = RunConfig::from_env(args.dry_run)?
        .with_debug(args.debug)
        .with_headless(!args.headful);

    let date = match args.date.as_deref() {
        Some(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
            exrate_scraper::ScrapeError::Config(format!("不正な日付 '{}': {}", s, e))
        })?,
        None => exrate_scraper::local_date(),
    };

    let pipeline = Pipeline::new(config)?;
    let outcome = pipeline.run(date).await?;

    info!(
        "Status: {:?}, banks: {}, sources: {:?}",
        outcome.summary.status,
        outcome.summary.total_banks_scraped,
        outcome.summary.sources_used
    );

    Ok(())
}
