use super::engine::{MarketplaceEngine, load_profile, unpaid_jobs_of};
use crate::domain::job::{Job, JobId};
use crate::domain::money::{Amount, Balance};
use crate::domain::profile::{Profile, ProfileId};
use crate::error::{MarketplaceError, Result};
use mockable::Clock;
use rust_decimal::Decimal;
use serde::Serialize;

/// The records written by a successful [`MarketplaceEngine::pay_job`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub job: Job,
    pub client: Profile,
}

impl<C> MarketplaceEngine<C>
where
    C: Clock + Send + Sync,
{
    /// Pays a job: moves its price from the client to the contractor and
    /// stamps the payment date, all in one transaction.
    ///
    /// Checks run in a fixed order and the first failing one is reported:
    /// the payer must exist and be a client, the job must exist on one of
    /// the payer's contracts, be unpaid, sit on a live contract, and the
    /// payer must afford it. A payment racing another one on the same job
    /// or profile loses with `Conflict` and writes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn pay_job(&self, client_id: ProfileId, job_id: JobId) -> Result<PaymentReceipt> {
        let mut tx = self.store.begin().await?;

        let mut client = load_profile(tx.as_ref(), client_id).await?;
        client.ensure_client("pay for jobs")?;

        let mut job = tx
            .find_job(job_id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("Job", job_id))?;
        // Someone else's job is reported as missing.
        let contract = tx
            .find_contract(job.contract_id())
            .await?
            .filter(|contract| contract.client_id == client.id)
            .ok_or_else(|| MarketplaceError::not_found("Job", job_id))?;

        if job.is_paid() {
            return Err(MarketplaceError::AlreadyPaid(job_id.0));
        }
        if !contract.is_active() {
            return Err(MarketplaceError::ContractTerminated(contract.id.0));
        }

        let price = job.price();
        if let Err(err) = client.debit(price) {
            tracing::warn!(%price, balance = %client.balance, "payment rejected");
            return Err(err);
        }
        let mut contractor = load_profile(tx.as_ref(), contract.contractor_id).await?;
        contractor.credit(price)?;
        job.mark_paid(self.clock.utc())?;

        tx.update_profile(client.clone()).await?;
        tx.update_profile(contractor).await?;
        tx.update_job(job.clone()).await?;
        tx.commit().await?;

        tracing::info!(
            %price,
            contractor = %contract.contractor_id,
            balance = %client.balance,
            "job paid"
        );
        Ok(PaymentReceipt { job, client })
    }

    /// Adds funds to a profile's balance.
    ///
    /// A single deposit may not exceed the configured share (25% by default)
    /// of the profile's unpaid jobs on active contracts. A profile with no
    /// unpaid work cannot deposit at all.
    #[tracing::instrument(skip(self))]
    pub async fn deposit(&self, profile_id: ProfileId, amount: Decimal) -> Result<Profile> {
        let amount = Amount::new(amount)?;
        let mut tx = self.store.begin().await?;

        let mut profile = load_profile(tx.as_ref(), profile_id).await?;
        let unpaid = Balance::total(
            unpaid_jobs_of(tx.as_ref(), &profile)
                .await?
                .iter()
                .map(Job::price),
        )?;
        let limit = unpaid.percent(self.config.deposit_limit_percent)?;
        if Balance::from(amount) > limit {
            tracing::warn!(%amount, %limit, "deposit rejected");
            return Err(MarketplaceError::DepositLimitExceeded {
                amount: amount.value(),
                limit: limit.value(),
            });
        }

        profile.credit(amount)?;
        tx.update_profile(profile.clone()).await?;
        tx.commit().await?;

        tracing::info!(%amount, balance = %profile.balance, "deposit accepted");
        Ok(profile)
    }
}
