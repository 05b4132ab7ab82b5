//! In-process intent registry backing the vendor adapters. It gives capture
//! and refund real bookkeeping without speaking any vendor wire format.

use dashmap::DashMap;
use rand::RngCore;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use super::{
    CaptureResult, CaptureStatus, CreateIntentRequest, IntentStatus, PaymentIntent,
    RefundRequest, RefundResult, RefundStatus,
};

#[derive(Debug, Clone)]
struct LedgerEntry {
    amount: Decimal,
    captured: bool,
    refunded: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct SandboxLedger {
    entries: Arc<DashMap<String, LedgerEntry>>,
}

pub(crate) fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

impl SandboxLedger {
    pub fn open_intent(
        &self,
        prefix: &str,
        request: &CreateIntentRequest,
        status: IntentStatus,
        with_client_secret: bool,
    ) -> PaymentIntent {
        let id = format!("{}_pi_{}", prefix, random_hex(8));
        self.entries.insert(
            id.clone(),
            LedgerEntry {
                amount: request.amount,
                captured: false,
                refunded: Decimal::ZERO,
            },
        );
        debug!(intent_id = %id, amount = %request.amount, currency = %request.currency, "sandbox intent opened");
        let client_secret = with_client_secret.then(|| format!("{}_secret_{}", id, random_hex(12)));
        PaymentIntent {
            id,
            client_secret,
            status,
        }
    }

    /// Unknown intents fail; capturing twice is a no-op success. Once any
    /// money has been refunded the intent can no longer be captured.
    pub fn capture(&self, intent_id: &str) -> CaptureResult {
        let status = match self.entries.get_mut(intent_id) {
            Some(entry) if entry.refunded > Decimal::ZERO => CaptureStatus::Failed,
            Some(mut entry) => {
                entry.captured = true;
                CaptureStatus::Succeeded
            }
            None => CaptureStatus::Failed,
        };
        CaptureResult {
            id: intent_id.to_string(),
            status,
        }
    }

    /// Refunds only captured money and never more than what remains.
    pub fn refund(&self, prefix: &str, request: &RefundRequest) -> RefundResult {
        let status = match self.entries.get_mut(&request.transaction_id) {
            Some(mut entry) if entry.captured => {
                let remaining = entry.amount - entry.refunded;
                let wanted = request.amount.unwrap_or(remaining);
                if wanted > Decimal::ZERO && wanted <= remaining {
                    entry.refunded += wanted;
                    RefundStatus::Succeeded
                } else {
                    RefundStatus::Failed
                }
            }
            _ => RefundStatus::Failed,
        };
        RefundResult {
            id: format!("{}_re_{}", prefix, random_hex(8)),
            status,
        }
    }
}
