use burn::tensor::backend::Backend;
use clap::Parser;
use inference::save_inference_samples;
use std::path::PathBuf;
use training::{load_checkpoint, TrainBackend};

#[derive(Parser, Debug)]
#[command(name = "segment", about = "Write road overlays for the KITTI testing split from a checkpoint")]
struct Args {
    /// Checkpoint written by `train --checkpoint-out`.
    #[arg(long)]
    checkpoint: PathBuf,
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    #[arg(long, default_value = "./runs")]
    runs_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    training::init_tracing();
    let args = Args::parse();
    let device = <TrainBackend as Backend>::Device::default();
    let (model, meta) = load_checkpoint::<TrainBackend>(&args.checkpoint, &device)?;
    tracing::info!(
        classes = model.num_classes(),
        height = meta.image_shape.0,
        width = meta.image_shape.1,
        "loaded checkpoint"
    );
    let dir = save_inference_samples(&args.runs_dir, &args.data_dir, &model, meta.image_shape, &device)?;
    println!("{}", dir.display());
    Ok(())
}
