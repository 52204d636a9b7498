use campus_eats_engine::{db_types::Contract, MarketplaceDatabase, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

const SWEEP_INTERVAL_SECS: u64 = 60;

/// Starts the contract expiry worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
///
/// The sweep flips the `is_expired`/`is_active` flags on lapsed contracts so that reads agree
/// with reality; the debit path checks the expiry timestamp itself and never depends on the sweep
/// having run.
pub fn start_expiry_worker(db: SqliteDatabase) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
        info!("🕰️ Contract expiry worker started");
        loop {
            timer.tick().await;
            match db.expire_lapsed_contracts().await {
                Ok(expired) if expired.is_empty() => {
                    trace!("🕰️ Contract expiry sweep found nothing to do");
                },
                Ok(expired) => {
                    info!("🕰️ {} contracts expired", expired.len());
                    debug!("🕰️ Expired contracts: {}", contract_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running contract expiry sweep: {e}");
                },
            }
        }
    })
}

fn contract_list(contracts: &[Contract]) -> String {
    contracts
        .iter()
        .map(|c| format!("[{}] user: {} lounge: {} expired: {}", c.id, c.user_id, c.lounge_id, c.expires_at))
        .collect::<Vec<String>>()
        .join(", ")
}
