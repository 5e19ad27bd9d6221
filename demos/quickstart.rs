use std::fs;
use std::io::prelude::*;

use env_logger;
use log;
use rand::prelude::*;

use cache_sort::{ExternalQuicksortBuilder, RECORD_SIZE};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("records.bin");

    let mut rng = rand::thread_rng();
    let mut data = vec![0u8; 100_000 * RECORD_SIZE];
    rng.fill_bytes(&mut data);
    fs::write(&path, &data).unwrap();

    let file = fs::OpenOptions::new().read(true).write(true).open(&path).unwrap();
    let sorter = ExternalQuicksortBuilder::new()
        .with_cache_blocks(8)
        .build()
        .unwrap();

    let stats = sorter.sort(file).unwrap();
    print!("Sort on {}\n{}", path.display(), stats);

    let mut sorted = Vec::new();
    fs::File::open(&path).unwrap().read_to_end(&mut sorted).unwrap();
    let keys: Vec<i16> = sorted
        .chunks(RECORD_SIZE)
        .map(|record| i16::from_be_bytes([record[0], record[1]]))
        .collect();
    assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));
}
