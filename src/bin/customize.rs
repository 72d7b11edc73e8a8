use std::{env, error::Error};

use mld_preprocessing::{
    cli::{CliErr, ReturnCode},
    customizer::{Customizer, CustomizerConfig},
    report::enable_reporting,
};

fn main() {
    let code = {
        let _reporter = enable_reporting("customize");
        match run() {
            Ok(code) => code.exit_code(),
            Err(err) => {
                eprintln!("{}", err);
                1
            }
        }
    };
    std::process::exit(code);
}

fn run() -> Result<ReturnCode, Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let graph_dir = args.next().ok_or(CliErr("No graph directory arg given"))?;
    let partition_dir = args.next().ok_or(CliErr("No partition directory arg given"))?;
    let cells_dir = args.next().ok_or(CliErr("No cells output directory arg given"))?;

    let mut config = CustomizerConfig::new(graph_dir.into(), partition_dir.into(), cells_dir.into());
    if let Some(threads) = args.next() {
        config.requested_num_threads = threads.parse()?;
    }

    Ok(Customizer::run(&config))
}
