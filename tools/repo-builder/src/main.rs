/*!
`repo-builder` drives one version build of an update repository: it scans each bundle's
installed chroot, diffs it against the previously published manifests, materializes the
content-addressed fullfile store, and assembles packs for client upgrades.

This binary is the orchestration layer the core engine (the `repo-build`, `bundle-scan`,
`fullfile-pack`, and `delta-pack` crates) deliberately leaves out: bundle-definition
parsing, previous-manifest loading, version/format pointer publication, and invocation of
an external signer over `Manifest.MoM`.
*/

mod cmd;
mod config;
mod error;
mod publish;

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
