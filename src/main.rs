use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use car_mpg_trainer::config::{TrainArgs, TrainConfig};
use car_mpg_trainer::experiment::FileTracker;
use car_mpg_trainer::trainer::Trainer;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                "car_mpg_trainer=info"
                    .parse()
                    .context("invalid default log directive")?,
            ),
        )
        .init();

    let args = TrainArgs::parse();
    if let Some(model) = &args.model {
        tracing::debug!(model = %model, "ignoring --model");
    }
    let tracking_dir = args.tracking_dir.clone();

    let config = TrainConfig::try_from(args).context("invalid training configuration")?;
    let mut tracker = FileTracker::open(&tracking_dir).with_context(|| {
        format!("cannot open tracking store at {}", tracking_dir.display())
    })?;

    let report = Trainer::new(config)?
        .run(&mut tracker)
        .context("training run failed")?;

    println!(
        "run {} finished: r2_score = {:.4}, model {} v{}, predictions at {}",
        report.run.run_id(),
        report.score,
        report.model_version.name(),
        report.model_version.version(),
        report.predictions_path.display()
    );
    Ok(())
}
