use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = nft_lib::Cli::parse();

    // Control log level with RUST_LOG env var:
    //   RUST_LOG=debug nft analyze --case Case1 Acme-Case1-1.pcap
    //   RUST_LOG=nft_lib::analysis=trace nft analyze ...
    if cli.verbose {
        nft_lib::logging::init_verbose();
    } else {
        nft_lib::logging::init();
    }

    nft_lib::run(cli)
}
