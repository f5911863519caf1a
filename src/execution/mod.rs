//! Execution Module
//!
//! Boundary contract with the on-chain executor. The decision core hands an
//! allocation and a slippage tolerance across this boundary and inspects
//! only the returned success flag and identifier; settlement, confirmation,
//! retries and key handling all live on the other side. No secret material
//! ever crosses into the core.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::info;
use uuid::Uuid;

use crate::utils::types::{Allocation, AppResult, ExecutionResult};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    /// Perform the on-chain action backing `allocation`.
    async fn execute(
        &self,
        allocation: &Allocation,
        max_slippage_bps: u32,
    ) -> AppResult<ExecutionResult>;
}

/// Paper-trading executor: acknowledges every allocation without touching
/// the chain.
pub struct PaperExecutor;

#[async_trait]
impl Executor for PaperExecutor {
    async fn execute(
        &self,
        allocation: &Allocation,
        _max_slippage_bps: u32,
    ) -> AppResult<ExecutionResult> {
        let signature = format!("paper-{}", Uuid::new_v4());
        info!(
            protocol = %allocation.opportunity.protocol,
            asset = %allocation.opportunity.asset,
            amount = allocation.amount,
            %signature,
            "Paper execution"
        );
        Ok(ExecutionResult {
            success: true,
            signature: Some(signature),
            error: None,
        })
    }
}
