use super::contract::Contract;
use super::job::Job;
use super::profile::Profile;

/// A batch of records to load into a store in one go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    pub profiles: Vec<Profile>,
    pub contracts: Vec<Contract>,
    pub jobs: Vec<Job>,
}
