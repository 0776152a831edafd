use super::{SwapDirection, SwapStatus};
use crate::chain::EscrowState;
use crate::config::{
    AUTHORIZATION_GRACE_PERIOD_SECS, CLAIM_GRACE_PERIOD_SECS, REFUND_GRACE_PERIOD_SECS,
};

/// Instants past which a `Created` swap has failed and a `Locked` swap is refundable.
fn deadlines(direction: SwapDirection, expiry: u64) -> (u64, u64) {
    if direction.is_outbound() {
        (
            expiry.saturating_sub(AUTHORIZATION_GRACE_PERIOD_SECS),
            expiry.saturating_add(REFUND_GRACE_PERIOD_SECS),
        )
    } else {
        let claim_deadline = expiry.saturating_sub(CLAIM_GRACE_PERIOD_SECS);
        (claim_deadline, claim_deadline)
    }
}

/// Classifies a record from its last known status, optionally refreshed escrow state, and the
/// clock. Terminal states are sticky; chain truth wins over the cached status.
///
/// An outbound lock is refundable only once the refund grace period past expiry has elapsed.
/// An inbound lock stops being claimable a claim grace period before expiry.
pub fn classify(
    direction: SwapDirection,
    current: SwapStatus,
    escrow: Option<EscrowState>,
    expiry: u64,
    now: u64,
) -> SwapStatus {
    if current.is_terminal() {
        return current;
    }

    let observed = match escrow {
        Some(EscrowState::NotCommitted) => SwapStatus::Created,
        Some(EscrowState::Committed) => SwapStatus::Locked,
        Some(EscrowState::Claimed) => return SwapStatus::Claimed,
        Some(EscrowState::Refunded) => return SwapStatus::Refunded,
        None => current,
    };

    let (created_deadline, locked_deadline) = deadlines(direction, expiry);
    match observed {
        SwapStatus::Created if now >= created_deadline => SwapStatus::Failed,
        SwapStatus::Locked | SwapStatus::Refundable if now >= locked_deadline => {
            SwapStatus::Refundable
        }
        SwapStatus::Refundable => SwapStatus::Locked,
        other => other,
    }
}
