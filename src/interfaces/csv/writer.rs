use super::seed_reader::JobRecord;
use crate::application::payment::PaymentReceipt;
use crate::domain::contract::Contract;
use crate::domain::job::Job;
use crate::domain::profile::Profile;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// How results are rendered on the output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Flat view of a [`PaymentReceipt`], one CSV row per payment.
#[derive(Debug, Serialize)]
struct PaymentRow {
    job: u32,
    price: Decimal,
    payment_date: Option<DateTime<Utc>>,
    client: u32,
    balance: Decimal,
}

impl From<&PaymentReceipt> for PaymentRow {
    fn from(receipt: &PaymentReceipt) -> Self {
        Self {
            job: receipt.job.id().0,
            price: receipt.job.price().value(),
            payment_date: receipt.job.payment_date(),
            client: receipt.client.id.0,
            balance: receipt.client.balance.value(),
        }
    }
}

/// Writes query results as CSV (with a header row) or pretty JSON.
///
/// Profiles, contracts and jobs are written in the same layout the seed
/// files use, so an export can be read back as a seed.
pub struct RecordWriter<W: Write> {
    sink: W,
    format: OutputFormat,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W, format: OutputFormat) -> Self {
        Self { sink, format }
    }

    pub fn write_profiles(&mut self, profiles: &[Profile]) -> Result<()> {
        self.write_rows(profiles)
    }

    pub fn write_contracts(&mut self, contracts: &[Contract]) -> Result<()> {
        self.write_rows(contracts)
    }

    pub fn write_jobs(&mut self, jobs: &[Job]) -> Result<()> {
        let records: Vec<JobRecord> = jobs.iter().map(JobRecord::from).collect();
        self.write_rows(&records)
    }

    pub fn write_receipt(&mut self, receipt: &PaymentReceipt) -> Result<()> {
        match self.format {
            OutputFormat::Csv => self.write_rows(&[PaymentRow::from(receipt)]),
            OutputFormat::Json => self.write_json(receipt),
        }
    }

    /// Writes any serializable rows. An empty slice yields no CSV output at
    /// all and an empty JSON array.
    pub fn write_rows<T: Serialize>(&mut self, rows: &[T]) -> Result<()> {
        match self.format {
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(&mut self.sink);
                for row in rows {
                    writer.serialize(row)?;
                }
                writer.flush()?;
                Ok(())
            }
            OutputFormat::Json => self.write_json(&rows),
        }
    }

    /// Writes a single optional row, as for a report that may find nothing.
    pub fn write_optional<T: Serialize>(&mut self, row: Option<&T>) -> Result<()> {
        match (self.format, row) {
            (OutputFormat::Csv, Some(row)) => self.write_rows(std::slice::from_ref(row)),
            (OutputFormat::Csv, None) => Ok(()),
            (OutputFormat::Json, row) => self.write_json(&row),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.sink, value)?;
        writeln!(self.sink)?;
        self.sink.flush()?;
        Ok(())
    }
}
