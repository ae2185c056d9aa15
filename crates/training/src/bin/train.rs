use clap::Parser;
use training::logging::init_tracing;
use training::{run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    run_train(TrainArgs::parse())
}
