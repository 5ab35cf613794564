use burn::tensor::backend::Backend;
use clap::Parser;
use models::{write_bundle, BackboneConfig, Vgg16Backbone};
use std::path::PathBuf;
use training::TrainBackend;

#[derive(Parser, Debug)]
#[command(
    name = "vgg_bundle",
    about = "Write a randomly initialized backbone bundle (for smoke runs without pretrained weights)"
)]
struct Args {
    #[arg(long, default_value = "./data/vgg")]
    out: PathBuf,
    /// Narrow backbone instead of full VGG16 widths.
    #[arg(long)]
    tiny: bool,
}

fn main() -> anyhow::Result<()> {
    training::init_tracing();
    let args = Args::parse();
    let config = if args.tiny {
        BackboneConfig::tiny()
    } else {
        BackboneConfig::vgg16()
    };
    let device = <TrainBackend as Backend>::Device::default();
    let backbone = Vgg16Backbone::<TrainBackend>::new(config, &device);
    write_bundle(&args.out, &backbone)?;
    tracing::info!(dir = %args.out.display(), "wrote backbone bundle");
    Ok(())
}
