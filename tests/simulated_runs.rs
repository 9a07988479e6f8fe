//! Full acquisition runs against the simulated board, from command byte to
//! files on disk.

use std::time::Duration;
use tempfile::TempDir;
use uart_link::acquire;
use uart_link::config::{Config, ShortReadPolicy};
use uart_link::frame::FrameGeometry;
use uart_link::sim::SimulatedBoard;
use uart_link::sink::{self, XadcCsv};
use uart_link::{LinkError, Session};

fn session(board: SimulatedBoard) -> Session<SimulatedBoard> {
    Session::new(board, Duration::from_millis(100), ShortReadPolicy::Fail)
}

fn read_csv(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn bram_dump_to_csv() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::from_toml("[bram]\nbytes = 8\n").unwrap();
    config.bram.output = dir.path().join("read_bram_dump.csv");

    let mut s = session(SimulatedBoard::new());
    let samples = acquire::dump_bram(&mut s, &config.bram).unwrap();
    sink::write_samples(&config.bram.output, &samples).unwrap();

    let rows = read_csv(&config.bram.output);
    assert_eq!(rows[0], vec!["Sample Number", "Hex Sample", "Decimal Code"]);
    assert_eq!(rows[1], vec!["1", "0001", "1"]);
    assert_eq!(rows[4], vec!["4", "0004", "4"]);
    assert_eq!(rows.len(), 5);
    assert_eq!(s.into_inner().commands_received(), &[0x30]);
}

#[test]
fn stock_bram_dump_is_full_depth() {
    let config = Config::default();
    let mut s = session(SimulatedBoard::new());
    let samples = acquire::dump_bram(&mut s, &config.bram).unwrap();
    assert_eq!(samples.len(), 65_536);
    assert_eq!(samples.last().unwrap().value, 0);
    assert_eq!(samples[65_534].token, "ffff");
}

#[test]
fn burst_to_csv_and_tiff() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::from_toml("[burst]\nrows = 8\ncols = 4\nframes = 2\n").unwrap();
    config.burst.output = dir.path().join("read_burst_dump.csv");
    let tiff_dir = dir.path().join("tiff");

    let board = SimulatedBoard::new().with_burst_geometry(FrameGeometry::from(&config.burst));
    let mut s = session(board);
    let burst = acquire::capture_burst(&mut s, &config.burst).unwrap();
    sink::write_samples(&config.burst.output, &burst.samples).unwrap();
    let paths = sink::write_frame_stack(&burst.frames, &tiff_dir, "frame").unwrap();

    assert_eq!(read_csv(&config.burst.output).len(), 1 + 8 * 4 * 2);
    assert_eq!(paths.len(), 2);
    let img = image::open(&paths[1]).unwrap().to_luma16();
    assert_eq!(img.dimensions(), (4, 8));
    assert_eq!(img.get_pixel(3, 7).0[0], burst.frames[1].get(7, 3).unwrap());
}

#[test]
fn xadc_monitor_to_csv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("xadc_dump.csv");
    let config = Config::from_toml("[xadc]\nstop_secs = 0.0\nsamples = 4\n").unwrap();

    let mut csv = XadcCsv::create(&path).unwrap();
    let mut s = session(SimulatedBoard::new().with_xadc_words(0x8000, 0x8000, 0x8000));
    acquire::monitor_xadc(&mut s, &config.xadc, |r| csv.write(r)).unwrap();
    csv.finish().unwrap();

    let rows = read_csv(&path);
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0][3], "Temperature (degrees C)");
    assert_eq!(rows[4][0], "4");
    let celsius: f64 = rows[1][3].parse().unwrap();
    assert!((celsius - -21.1625).abs() < 1e-9);
    let vaux5: f64 = rows[1][4].parse().unwrap();
    assert!((vaux5 - 1.66).abs() < 1e-9);

    let sent = s.into_inner();
    assert_eq!(&sent.commands_received()[..3], &[0x00, 0x15, 0x1C]);
    assert_eq!(sent.commands_received().len(), 12);
}

#[test]
fn stalled_link_is_reported_not_swallowed() {
    let config = Config::default();
    let mut s = session(SimulatedBoard::new().with_response_limit(0));
    let err = acquire::self_test(&mut s, &config.self_test).unwrap_err();
    assert!(matches!(
        err,
        LinkError::ShortRead {
            expected: 3,
            received: 0
        }
    ));
}
