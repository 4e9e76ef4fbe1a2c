//! Refund computation at cancellation time.
//!
//! The evaluator reads each line's ticket-type refund policy as it exists at
//! cancellation time; policy edits after purchase apply to pending
//! cancellations.

use crate::models::{RefundPolicy, RegistrationTicket};
use chrono::{DateTime, Duration, Utc};

/// Sum the refundable portion of each line. Never negative, never more than
/// the sum of line totals.
pub fn refund_for(
    lines: &[(RegistrationTicket, RefundPolicy)],
    event_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    lines
        .iter()
        .map(|(line, policy)| line_refund(line, policy, event_start, now))
        .sum()
}

fn line_refund(
    line: &RegistrationTicket,
    policy: &RefundPolicy,
    event_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    if !policy.allowed {
        return 0;
    }
    if event_start - now < Duration::hours(policy.deadline_hours_before) {
        return 0;
    }

    (line.line_total * policy.percentage.clamp(0, 100)) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(line_total: i64) -> RegistrationTicket {
        RegistrationTicket {
            id: 1,
            registration_id: 1,
            ticket_type_id: 1,
            quantity: 1,
            unit_price: line_total,
            line_total,
        }
    }

    fn policy(allowed: bool, deadline: i64, percentage: i64) -> RefundPolicy {
        RefundPolicy {
            allowed,
            deadline_hours_before: deadline,
            percentage,
        }
    }

    #[test]
    fn half_refund_before_deadline_zero_after() {
        let now = Utc::now();
        let lines = vec![(line(1000), policy(true, 24, 50))];

        // 30 hours out: inside the allowed window.
        assert_eq!(refund_for(&lines, now + Duration::hours(30), now), 500);
        // 10 hours out: past the deadline.
        assert_eq!(refund_for(&lines, now + Duration::hours(10), now), 0);
    }

    #[test]
    fn disallowed_policy_contributes_nothing() {
        let now = Utc::now();
        let lines = vec![(line(1000), policy(false, 0, 100))];
        assert_eq!(refund_for(&lines, now + Duration::hours(100), now), 0);
    }

    #[test]
    fn mixed_lines_sum_independently() {
        let now = Utc::now();
        let lines = vec![
            (line(1000), policy(true, 24, 50)),
            (line(600), policy(true, 48, 100)),
            (line(400), policy(false, 0, 100)),
        ];

        // 30 hours out: first line qualifies, second misses its 48h deadline.
        assert_eq!(refund_for(&lines, now + Duration::hours(30), now), 500);
        // 72 hours out: first two qualify.
        assert_eq!(refund_for(&lines, now + Duration::hours(72), now), 1100);
    }

    #[test]
    fn never_negative_and_never_exceeds_line_totals() {
        let now = Utc::now();
        let lines = vec![(line(1000), policy(true, 0, 100))];

        // Event already started.
        assert_eq!(refund_for(&lines, now - Duration::hours(2), now), 0);
        // Full refund is the ceiling.
        assert_eq!(refund_for(&lines, now + Duration::hours(2), now), 1000);
    }
}
