use crate::domain::contract::{Contract, ContractId};
use crate::domain::dataset::DataSet;
use crate::domain::job::{Job, JobId};
use crate::domain::money::Amount;
use crate::domain::profile::Profile;
use crate::error::{MarketplaceError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const PROFILES_FILE: &str = "profiles.csv";
pub const CONTRACTS_FILE: &str = "contracts.csv";
pub const JOBS_FILE: &str = "jobs.csv";

/// A job as it appears in `jobs.csv`.
///
/// The `paid` column is optional; when present it must agree with
/// `payment_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub contract_id: ContractId,
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(default)]
    pub paid: Option<bool>,
    pub payment_date: Option<DateTime<Utc>>,
}

impl TryFrom<JobRecord> for Job {
    type Error = MarketplaceError;

    fn try_from(record: JobRecord) -> Result<Self> {
        let mut job = Job::new(
            record.id,
            record.contract_id,
            record.description,
            Amount::new(record.price)?,
        );
        match (record.paid, record.payment_date) {
            (Some(true), None) => {
                return Err(MarketplaceError::validation(format!(
                    "job {} is marked paid without a payment date",
                    record.id
                )));
            }
            (Some(false), Some(_)) => {
                return Err(MarketplaceError::validation(format!(
                    "job {} has a payment date but is marked unpaid",
                    record.id
                )));
            }
            (_, Some(date)) => job.mark_paid(date)?,
            (_, None) => {}
        }
        Ok(job)
    }
}

impl From<&Job> for JobRecord {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id(),
            contract_id: job.contract_id(),
            description: job.description().to_string(),
            price: job.price().value(),
            paid: Some(job.is_paid()),
            payment_date: job.payment_date(),
        }
    }
}

/// Reads seed records from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming. Each accessor consumes the
/// reader and lazily deserializes one record type.
pub struct SeedReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> SeedReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn profiles(self) -> impl Iterator<Item = Result<Profile>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(MarketplaceError::from))
    }

    pub fn contracts(self) -> impl Iterator<Item = Result<Contract>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(MarketplaceError::from))
    }

    pub fn jobs(self) -> impl Iterator<Item = Result<Job>> {
        self.reader
            .into_deserialize::<JobRecord>()
            .map(|result| Job::try_from(result?))
    }
}

/// Reads `profiles.csv`, `contracts.csv` and `jobs.csv` from `dir`.
///
/// `profiles.csv` is required. The other two may be absent, which yields no
/// records of that kind. The first malformed row aborts the whole read.
pub fn read_seed_dir(dir: &Path) -> Result<DataSet> {
    let profiles = SeedReader::new(File::open(dir.join(PROFILES_FILE))?)
        .profiles()
        .collect::<Result<Vec<_>>>()?;
    let contracts = match open_optional(&dir.join(CONTRACTS_FILE))? {
        Some(file) => SeedReader::new(file).contracts().collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    let jobs = match open_optional(&dir.join(JOBS_FILE))? {
        Some(file) => SeedReader::new(file).jobs().collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    tracing::debug!(
        dir = %dir.display(),
        profiles = profiles.len(),
        contracts = contracts.len(),
        jobs = jobs.len(),
        "read seed files"
    );
    Ok(DataSet {
        profiles,
        contracts,
        jobs,
    })
}

fn open_optional(path: &Path) -> Result<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::ContractStatus;
    use crate::domain::money::Balance;
    use crate::domain::profile::{ProfileId, ProfileRole};
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_profiles() {
        let data = "id, first_name, last_name, profession, balance, type\n\
                    1, Harry, Potter, Wizard, 1150, client\n\
                    5, John, Lenon, Musician, 64, contractor";
        let profiles: Vec<Profile> = SeedReader::new(data.as_bytes())
            .profiles()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].id, ProfileId(1));
        assert_eq!(profiles[0].balance, Balance::new(dec!(1150)));
        assert_eq!(profiles[1].role, ProfileRole::Contractor);
        assert_eq!(profiles[1].version, 0);
    }

    #[test]
    fn test_reader_contracts() {
        let data = "id,terms,status,client_id,contractor_id\n2,bla bla bla,in_progress,1,6";
        let contracts: Vec<Contract> = SeedReader::new(data.as_bytes())
            .contracts()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(contracts[0].status, ContractStatus::InProgress);
        assert_eq!(contracts[0].contractor_id, ProfileId(6));
    }

    #[test]
    fn test_reader_jobs_paid_and_unpaid() {
        let data = "id,contract_id,description,price,paid,payment_date\n\
                    1,1,work,200,,\n\
                    6,7,work,2020,true,2020-08-15T19:11:26.737Z\n\
                    7,2,work,200,,2020-08-15T19:11:26.737Z";
        let jobs: Vec<Job> = SeedReader::new(data.as_bytes())
            .jobs()
            .collect::<Result<_>>()
            .unwrap();

        assert!(!jobs[0].is_paid());
        assert!(jobs[1].is_paid());
        assert_eq!(jobs[1].price().value(), dec!(2020));
        assert!(jobs[2].is_paid());
    }

    #[test]
    fn test_reader_keeps_every_digit_of_money_fields() {
        let profiles = "id,first_name,last_name,profession,balance,type\n\
                        1,Harry,Potter,Wizard,1234567890123456789.01,client";
        let profiles: Vec<Profile> = SeedReader::new(profiles.as_bytes())
            .profiles()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(profiles[0].balance, Balance::new(dec!(1234567890123456789.01)));

        let jobs = "id,contract_id,description,price,paid,payment_date\n\
                    1,1,work,98765432109876543.21,,\n\
                    2,1,work,0.1,,";
        let jobs: Vec<Job> = SeedReader::new(jobs.as_bytes())
            .jobs()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(jobs[0].price().value(), dec!(98765432109876543.21));
        assert_eq!(jobs[1].price().value(), dec!(0.1));
    }

    #[test]
    fn test_reader_rejects_inconsistent_or_malformed_jobs() {
        let data = "id,contract_id,description,price,paid,payment_date\n\
                    1,1,work,200,true,\n\
                    2,1,work,-5,,\n\
                    3,1,work,abc,,";
        let results: Vec<Result<Job>> = SeedReader::new(data.as_bytes()).jobs().collect();

        assert!(matches!(results[0], Err(MarketplaceError::ValidationError(_))));
        assert!(matches!(results[1], Err(MarketplaceError::ValidationError(_))));
        assert!(matches!(results[2], Err(MarketplaceError::CsvError(_))));
    }

    #[test]
    fn test_reader_malformed_profile_role() {
        let data = "id,first_name,last_name,profession,balance,type\n1,Harry,Potter,Wizard,10,admin";
        let results: Vec<Result<Profile>> = SeedReader::new(data.as_bytes()).profiles().collect();

        assert!(results[0].is_err());
    }

    #[test]
    fn test_job_record_round_trips_payment_state() {
        let mut job = Job::new(JobId(3), ContractId(1), "work", Amount::new(dec!(5)).unwrap());
        job.mark_paid(DateTime::parse_from_rfc3339("2020-08-15T00:00:00Z").unwrap().to_utc())
            .unwrap();

        let record = JobRecord::from(&job);
        assert_eq!(record.paid, Some(true));
        let mut back = Job::try_from(record).unwrap();
        back.version = job.version;
        assert_eq!(back, job);
    }
}
