#![allow(dead_code)]

use assert_cmd::cargo_bin;
use std::io::Error;
use std::path::{Path, PathBuf};
use std::process::Command;

/// The sample marketplace shipped with the tests.
pub fn fixture_seed() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/seed")
}

/// A `marketplace` invocation with the fixture seed loaded and `RUST_LOG`
/// cleared so the log level is predictable.
pub fn marketplace() -> Command {
    let mut cmd = Command::new(cargo_bin!("marketplace"));
    cmd.env_remove("RUST_LOG")
        .env_remove("MARKETPLACE_SEED")
        .env_remove("MARKETPLACE_DB_PATH")
        .env_remove("MARKETPLACE_DEPOSIT_LIMIT_PERCENT")
        .env_remove("MARKETPLACE_BEST_CLIENTS_LIMIT")
        .arg("--seed")
        .arg(fixture_seed());
    cmd
}

/// Writes one seed CSV file with the given header and rows.
pub fn write_csv(path: &Path, header: &[&str], rows: &[&[&str]]) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(*row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes a seed directory with one client (id 1), one contractor (id 2),
/// an in-progress contract between them and `jobs` as `(id, price)` unpaid jobs.
pub fn write_small_seed(dir: &Path, client_balance: &str, jobs: &[(u32, &str)]) -> Result<(), Error> {
    write_csv(
        &dir.join("profiles.csv"),
        &["id", "first_name", "last_name", "profession", "balance", "type"],
        &[
            &["1", "Harry", "Potter", "Wizard", client_balance, "client"],
            &["2", "John", "Lenon", "Musician", "0", "contractor"],
        ],
    )?;
    write_csv(
        &dir.join("contracts.csv"),
        &["id", "terms", "status", "client_id", "contractor_id"],
        &[&["1", "bla bla bla", "in_progress", "1", "2"]],
    )?;

    let ids: Vec<String> = jobs.iter().map(|(id, _)| id.to_string()).collect();
    let rows: Vec<[&str; 6]> = jobs
        .iter()
        .zip(&ids)
        .map(|((_, price), id)| [id.as_str(), "1", "work", *price, "", ""])
        .collect();
    let rows: Vec<&[&str]> = rows.iter().map(|row| row.as_slice()).collect();
    write_csv(
        &dir.join("jobs.csv"),
        &["id", "contract_id", "description", "price", "paid", "payment_date"],
        &rows,
    )
}
