use clap::Parser;
use training::run::{run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    training::init_tracing();
    let args = TrainArgs::parse();
    let cfg = args.resolve()?;
    let outcome = run_train(&cfg)?;
    tracing::info!(
        steps = outcome.report.total_steps(),
        final_loss = outcome.report.final_loss().unwrap_or(f32::NAN),
        samples = %outcome.samples_dir.display(),
        "run complete"
    );
    Ok(())
}
