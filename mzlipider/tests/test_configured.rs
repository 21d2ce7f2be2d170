use std::fs;
use std::path::PathBuf;

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};

use mzlipider::{CancellationToken, MZLipider, MZLipiderError};

fn configured(output_name: &str, threads: i32) -> MZLipider {
    let output_file = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(output_name);
    let config = Figment::new()
        .merge(Toml::file_exact("./tests/data/batch.toml"))
        .merge(Serialized::default("output_file", output_file))
        .merge(Serialized::default("threads", threads));
    config.extract().unwrap()
}

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_batch_config() -> Result<(), MZLipiderError> {
    let driver = configured("batch_config.jsonl", 2);
    assert_eq!(driver.analysis.chain_bounds.max_carbons, 24);
    assert_eq!(driver.analysis.max_isotope, 3);
    assert!(driver.time_range.is_none());
    driver.main()?;

    let text = fs::read_to_string(&driver.output_file)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains(r#""hit_id":"PC 34:1""#));
    assert!(lines[3].contains(r#""hit_id":"PC 32:0""#));
    Ok(())
}

#[test_log::test]
fn test_thread_count_does_not_change_output() -> Result<(), MZLipiderError> {
    let single = configured("single_thread.jsonl", 1);
    let multi = configured("four_threads.jsonl", 4);
    let single_prog = single.run(&CancellationToken::new())?;
    let multi_prog = multi.run(&CancellationToken::new())?;
    assert_eq!(single_prog, multi_prog);

    let single_text = fs::read_to_string(&single.output_file)?;
    let multi_text = fs::read_to_string(&multi.output_file)?;
    assert_eq!(single_text, multi_text);
    Ok(())
}

#[test_log::test]
fn test_cancelled_run() -> Result<(), MZLipiderError> {
    let driver = configured("cancelled.jsonl", 2);
    let token = CancellationToken::new();
    token.cancel();
    let prog = driver.run(&token)?;
    assert_eq!(prog.skipped, 4);
    assert_eq!(prog.hits, 0);
    assert!(fs::read_to_string(&driver.output_file)?.is_empty());
    Ok(())
}
