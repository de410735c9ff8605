mod connector;
mod schedule;
mod seeclickfix;
mod settings;

use scf_config::{init_tracing, AppConfig};
use scf_db::issues::pg_repository::PgIssueRepository;

use crate::schedule::{run_schedule, Schedule};
use crate::seeclickfix::client::{IssuesClient, IssuesClientConfig};
use crate::seeclickfix::issue_sync::IssueSyncer;
use crate::seeclickfix::watermark::SinkWatermark;
use crate::settings::IngestSettings;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    tracing::info!(service = "scf-ingest", "starting");

    let config = AppConfig::from_env().expect("failed to load config");
    let settings = IngestSettings::from_env().expect("invalid ingest settings");
    let client_config = IssuesClientConfig::from_env().expect("invalid issues API config");

    let pool = scf_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");
    let repo = PgIssueRepository::with_table(pool.clone(), &settings.table)
        .expect("table name already validated");

    let client = IssuesClient::new(client_config).expect("failed to create issues client");
    tracing::info!(
        place_url = %client.config().place_url,
        table = %repo.table(),
        mode = %settings.run_mode(),
        schedule = ?settings.schedule(),
        "issue sync configured"
    );

    let watermarks = SinkWatermark::new(repo.clone(), settings.bootstrap_watermark);
    let syncer = IssueSyncer::new(client, watermarks, repo);

    let summary = run_schedule(
        &syncer,
        settings.run_mode(),
        settings.schedule(),
        shutdown_signal(),
    )
    .await;

    pool.close().await;
    tracing::info!(
        runs = summary.runs,
        failures = summary.failures,
        "ingest service finished"
    );

    // A single failed run should be visible to whatever launched us.
    if settings.schedule() == Schedule::Once && summary.failures > 0 {
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
