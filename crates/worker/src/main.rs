//! Batch triage: submit each image given on the command line as a citizen report,
//! let the worker pool analyze them, then print the resulting records as JSON.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use gridwatch_ai::{DetectorAdapter, YoloOnnxDetector};
use gridwatch_core::{ImageRef, Report};
use gridwatch_infra::{
    AnalysisDispatcher, AnalysisOrchestrator, DispatcherStats, InMemoryReportStore, ReportIntake,
    TriageConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "gridwatch-worker",
    about = "Classify infrastructure photos and print the triaged reports",
    arg_required_else_help = true
)]
struct Cli {
    /// Image paths or file:// URIs; relative paths resolve under GRIDWATCH_MEDIA_ROOT
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<String>,

    /// Name used for the worker threads in log lines
    #[arg(long, default_value = "triage")]
    pool_name: String,
}

#[derive(Serialize)]
struct BatchSummary {
    reports: Vec<Report>,
    stats: DispatcherStats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    gridwatch_observability::init();

    let config = TriageConfig::from_env().context("invalid triage configuration")?;
    tracing::info!(
        model = %config.model_path.display(),
        media_root = %config.media_root.display(),
        workers = config.workers,
        "starting triage worker"
    );

    let yolo = config.yolo();
    let detector = DetectorAdapter::load(move || YoloOnnxDetector::load(yolo))
        .with_threshold(config.confidence_threshold);

    let store = InMemoryReportStore::arc();
    let orchestrator = AnalysisOrchestrator::new(store.clone(), Arc::new(detector), config.media())
        .with_detect_timeout(config.detect_timeout())
        .with_inference_limit(config.inference_limit());

    let dispatcher = Arc::new(
        AnalysisDispatcher::spawn(
            Arc::new(orchestrator),
            config.dispatcher().with_name(cli.pool_name),
        )
        .context("failed to start analysis workers")?,
    );
    let intake = ReportIntake::new(store.clone(), dispatcher.clone());

    for arg in cli.images {
        let image = ImageRef::new(arg.as_str()).with_context(|| format!("bad image argument {arg:?}"))?;
        let report = Report::submitted(format!("batch submission of {arg}"), Some(image));
        intake.submit(report).context("failed to store report")?;
    }

    dispatcher.shutdown();

    let summary = BatchSummary {
        reports: store.all().context("failed to read reports")?,
        stats: dispatcher.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn images_are_required() {
        assert!(Cli::try_parse_from(["gridwatch-worker"]).is_err());

        let cli = Cli::try_parse_from(["gridwatch-worker", "a.jpg", "file:///srv/b.jpg"]).unwrap();
        assert_eq!(cli.images, vec!["a.jpg", "file:///srv/b.jpg"]);
        assert_eq!(cli.pool_name, "triage");
    }

    #[test]
    fn pool_name_can_be_set() {
        let cli =
            Cli::try_parse_from(["gridwatch-worker", "--pool-name", "night", "a.jpg"]).unwrap();
        assert_eq!(cli.pool_name, "night");
    }
}
