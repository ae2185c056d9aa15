use clap::Parser;
use training::logging::init_tracing;
use training::{run_eval, EvalArgs};

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    run_eval(EvalArgs::parse())
}
