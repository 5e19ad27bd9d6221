use std::fs;
use std::io::prelude::*;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use cache_sort::sort::DEFAULT_INSERTION_THRESHOLD;
use cache_sort::ExternalQuicksortBuilder;

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let cache_blocks: usize = arg_parser.value_of_t_or_exit("cache_blocks");
    let threshold: usize = arg_parser.value_of_t_or_exit("threshold");
    let stats_path: Option<&str> = arg_parser.value_of("stats");
    let input = arg_parser.value_of("input").expect("value is required");

    let file = match fs::OpenOptions::new().read(true).write(true).open(input) {
        Ok(file) => file,
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    };

    match file.metadata() {
        Ok(metadata) => log::info!("sorting {} ({})", input, ByteSize(metadata.len())),
        Err(err) => log::warn!("input file metadata unavailable: {}", err),
    }

    let sorter = match ExternalQuicksortBuilder::new()
        .with_cache_blocks(cache_blocks)
        .with_insertion_threshold(threshold)
        .build()
    {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let stats = match sorter.sort(file) {
        Ok(stats) => stats,
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    };

    let summary = format!("Sort on {}\n{}", input, stats);
    let written = match stats_path {
        Some(stats_path) => fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(stats_path)
            .and_then(|mut stats_file| {
                stats_file.write_all(summary.as_bytes())?;
                stats_file.flush()
            }),
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(summary.as_bytes()).and_then(|_| stdout.flush())
        }
    };

    if let Err(err) = written {
        log::error!("statistics saving error: {}", err);
        process::exit(1);
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    let default_threshold = DEFAULT_INSERTION_THRESHOLD.to_string();

    clap::App::new("cache-sort")
        .about("sorts a file of 4-byte records in place through an LRU block cache")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted in place")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("cache_blocks")
                .short('c')
                .long("cache-blocks")
                .help("number of 4 KiB blocks kept in memory")
                .required(true)
                .takes_value(true)
                .validator(|v| match v.parse::<usize>() {
                    Ok(0) => Err("Cache size must be positive".to_string()),
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Cache size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("stats")
                .short('s')
                .long("stats")
                .help("file the run statistics are appended to (stdout if omitted)")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("threshold")
                .short('t')
                .long("threshold")
                .help("longest range sorted by insertion sort")
                .takes_value(true)
                .default_value(&default_threshold),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
