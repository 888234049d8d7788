mod cmd;
mod error;

use clap::Parser;
use cmd::{init_logger, Args};
use std::process;

fn main() {
    let args = Args::parse();
    init_logger(args.log_level);

    if let Err(e) = cmd::run(args) {
        eprintln!("{e}");
        process::exit(1);
    }
}
