use clap::Parser;
use log::LevelFilter;
use std::process;

mod args;
mod survey;

fn main() {
    let args = args::Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let res = if args.kiosk {
        survey::start_kiosk(args.config, args.out, args.language)
    } else {
        survey::run_survey(
            args.config,
            args.answers,
            args.out,
            args.language,
            args.print_header,
        )
    };

    match res {
        Ok(()) => {}
        Err(e) if e.is_recoverable() => {
            survey::print_retry_prompt(&e);
            process::exit(2);
        }
        Err(e) => {
            survey::print_error(&e);
            process::exit(1);
        }
    }
}
