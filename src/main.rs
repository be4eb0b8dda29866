use clap::Parser;
use media_catalog::args::{Args, Config};
use media_catalog::processor::Processor;

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut processor = Processor::new(Config::from(args));
    processor.run()?;
    Ok(())
}
