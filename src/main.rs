fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = truyen_crawl::cli::Args::parse();

    // RUST_LOG wins; otherwise --quiet, then -v/-vv, then info.
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let log_sink = truyen_crawl::progress::ProgressSink::stderr();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_sink.clone())
        .init();

    if let Err(e) = truyen_crawl::cli::run(&args, &log_sink) {
        eprintln!("{}", e);
        if args.verbose > 0 {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
