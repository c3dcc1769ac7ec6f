use super::engine::{MarketplaceEngine, load_profile};
use crate::domain::contract::{Contract, ContractId};
use crate::domain::job::Job;
use crate::domain::money::Balance;
use crate::domain::ports::StoreTransaction;
use crate::domain::profile::{Profile, ProfileId};
use crate::domain::report::{ClientPayment, ProfessionEarnings, ReportWindow};
use crate::error::{MarketplaceError, Result};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::{BTreeMap, HashMap};

/// Resolves the parties behind paid jobs, fetching each record once per report.
struct Parties<'a> {
    tx: &'a dyn StoreTransaction,
    contracts: HashMap<ContractId, Contract>,
    profiles: HashMap<ProfileId, Profile>,
}

impl<'a> Parties<'a> {
    fn new(tx: &'a dyn StoreTransaction) -> Self {
        Self {
            tx,
            contracts: HashMap::new(),
            profiles: HashMap::new(),
        }
    }

    async fn contract_of(&mut self, job: &Job) -> Result<Contract> {
        let id = job.contract_id();
        if let Some(contract) = self.contracts.get(&id) {
            return Ok(contract.clone());
        }
        let contract = self
            .tx
            .find_contract(id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("Contract", id))?;
        self.contracts.insert(id, contract.clone());
        Ok(contract)
    }

    async fn profile(&mut self, id: ProfileId) -> Result<Profile> {
        if let Some(profile) = self.profiles.get(&id) {
            return Ok(profile.clone());
        }
        let profile = load_profile(self.tx, id).await?;
        self.profiles.insert(id, profile.clone());
        Ok(profile)
    }
}

impl<C> MarketplaceEngine<C>
where
    C: Clock + Send + Sync,
{
    /// The profession whose contractors earned the most from jobs paid in
    /// `[start, end]`.
    ///
    /// Returns `None` when nothing was paid in the window. Ties go to the
    /// profession that sorts first.
    pub async fn best_profession(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<ProfessionEarnings>> {
        let window = ReportWindow::new(start, end)?;
        let tx = self.store.begin().await?;
        let mut parties = Parties::new(tx.as_ref());

        let mut earnings: BTreeMap<String, Balance> = BTreeMap::new();
        for job in tx.jobs_paid_within(window).await? {
            let contract = parties.contract_of(&job).await?;
            let contractor = parties.profile(contract.contractor_id).await?;
            let earned = earnings.entry(contractor.profession).or_default();
            *earned = earned.checked_add(job.price().into())?;
        }

        let mut best: Option<ProfessionEarnings> = None;
        for (profession, earned) in earnings {
            if best.as_ref().is_none_or(|b| earned > b.earned) {
                best = Some(ProfessionEarnings { profession, earned });
            }
        }
        Ok(best)
    }

    /// Clients who paid the most for jobs paid in `[start, end]`, highest first.
    ///
    /// At most `limit` rows are returned, falling back to the configured
    /// default when `None`. Equal totals are ordered by client id.
    pub async fn best_clients(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<ClientPayment>> {
        let limit = match limit {
            Some(0) => return Err(MarketplaceError::validation("limit must be at least 1")),
            Some(limit) => limit,
            None => self.config.best_clients_limit,
        };
        let window = ReportWindow::new(start, end)?;
        let tx = self.store.begin().await?;
        let mut parties = Parties::new(tx.as_ref());

        let mut totals: HashMap<ProfileId, Balance> = HashMap::new();
        for job in tx.jobs_paid_within(window).await? {
            let contract = parties.contract_of(&job).await?;
            let paid = totals.entry(contract.client_id).or_default();
            *paid = paid.checked_add(job.price().into())?;
        }

        let mut rows = Vec::with_capacity(totals.len());
        for (id, paid) in totals {
            let client = parties.profile(id).await?;
            rows.push(ClientPayment {
                id,
                full_name: client.full_name(),
                paid,
            });
        }
        rows.sort_by(|a, b| b.paid.cmp(&a.paid).then(a.id.cmp(&b.id)));
        rows.truncate(limit);
        Ok(rows)
    }
}
