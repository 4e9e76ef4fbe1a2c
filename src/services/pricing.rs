//! Discount engine.
//!
//! `price` is deliberately a pure function of the cart, the promo code (plus
//! the caller's prior usage count), the active pricing rules and the clock.
//! All database reads happen in the caller's transaction; repeated calls at
//! the same instant with the same inputs return identical results.

use crate::error::{AppError, AppResult};
use crate::models::{DiscountCode, DiscountType, PricingRule, RuleKind, TicketType};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub ticket_type_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total: i64,
    pub promo_applied: bool,
}

/// A promo code together with how many times this member has already used it.
#[derive(Debug, Clone)]
pub struct PromoContext {
    pub code: DiscountCode,
    pub user_uses: i64,
}

pub fn price(
    cart: &[(TicketType, i64)],
    promo: Option<&PromoContext>,
    rules: &[PricingRule],
    now: DateTime<Utc>,
) -> AppResult<Quote> {
    let lines: Vec<PricedLine> = cart
        .iter()
        .map(|(tt, qty)| PricedLine {
            ticket_type_id: tt.id,
            quantity: *qty,
            unit_price: tt.price,
            line_total: tt.price * qty,
        })
        .collect();
    let subtotal: i64 = lines.iter().map(|l| l.line_total).sum();

    let promo_discount = match promo {
        Some(ctx) => Some(evaluate_promo(ctx, &lines, subtotal, now)?),
        None => None,
    };
    let rules_discount = evaluate_rules(cart, &lines, rules, now)?;

    let (discount_amount, promo_applied) = match promo_discount {
        Some(promo_amount) => {
            let stackable = promo.map(|c| c.code.stackable).unwrap_or(false);
            if stackable {
                (promo_amount + rules_discount, true)
            } else if rules_discount > promo_amount {
                // Non-stackable: the larger single discount wins.
                (rules_discount, false)
            } else {
                (promo_amount, true)
            }
        }
        None => (rules_discount, false),
    };

    let discount_amount = discount_amount.min(subtotal);

    Ok(Quote {
        total: subtotal - discount_amount,
        lines,
        subtotal,
        discount_amount,
        promo_applied,
    })
}

fn evaluate_promo(
    ctx: &PromoContext,
    lines: &[PricedLine],
    subtotal: i64,
    now: DateTime<Utc>,
) -> AppResult<i64> {
    let code = &ctx.code;

    if !code.is_active {
        return Err(AppError::DiscountError("Promo code is not active".to_string()));
    }
    if let Some(from) = code.valid_from {
        if now < from {
            return Err(AppError::DiscountError(
                "Promo code is not yet valid".to_string(),
            ));
        }
    }
    if let Some(until) = code.valid_until {
        if now > until {
            return Err(AppError::DiscountError("Promo code has expired".to_string()));
        }
    }
    if let Some(max) = code.max_uses {
        if code.current_uses >= max {
            return Err(AppError::DiscountError(
                "Promo code usage limit reached".to_string(),
            ));
        }
    }
    if let Some(per_user) = code.max_uses_per_user {
        if ctx.user_uses >= per_user {
            return Err(AppError::DiscountError(
                "You have already used this promo code".to_string(),
            ));
        }
    }
    if let Some(min) = code.min_cart_value {
        if subtotal < min {
            return Err(AppError::DiscountError(format!(
                "Cart total is below the promo code minimum of {min}"
            )));
        }
    }

    let allowlist = code.allowlist();
    let applicable: i64 = lines
        .iter()
        .filter(|l| match &allowlist {
            Some(ids) => ids.contains(&l.ticket_type_id),
            None => true,
        })
        .map(|l| l.line_total)
        .sum();
    if applicable == 0 {
        return Err(AppError::DiscountError(
            "Promo code does not apply to any item in this cart".to_string(),
        ));
    }

    discount_of(code.discount_type, code.value, applicable)
}

fn evaluate_rules(
    cart: &[(TicketType, i64)],
    lines: &[PricedLine],
    rules: &[PricingRule],
    now: DateTime<Utc>,
) -> AppResult<i64> {
    let mut ordered: Vec<&PricingRule> = rules.iter().filter(|r| r.is_active).collect();
    ordered.sort_by_key(|r| (r.priority, r.id));

    let mut total = 0i64;
    for ((tt, qty), line) in cart.iter().zip(lines.iter()) {
        // First applicable rule wins; rules never stack with each other.
        for rule in &ordered {
            if rule_applies(rule, tt, *qty, now) {
                total += discount_of(rule.discount_type, rule.value, line.line_total)?;
                break;
            }
        }
    }

    Ok(total)
}

fn rule_applies(rule: &PricingRule, ticket_type: &TicketType, quantity: i64, now: DateTime<Utc>) -> bool {
    if let Some(scope) = rule.ticket_type_id {
        if scope != ticket_type.id {
            return false;
        }
    }
    if let Some(from) = rule.valid_from {
        if now < from {
            return false;
        }
    }
    if let Some(until) = rule.valid_until {
        if now >= until {
            return false;
        }
    }

    match rule.rule_kind {
        RuleKind::EarlyBirdDate => true,
        RuleKind::EarlyBirdVolume => match rule.quantity_threshold {
            Some(threshold) => ticket_type.sold_count < threshold,
            None => false,
        },
        RuleKind::Group => match rule.quantity_threshold {
            Some(threshold) => quantity >= threshold,
            None => false,
        },
    }
}

fn discount_of(discount_type: DiscountType, value: i64, applicable: i64) -> AppResult<i64> {
    match discount_type {
        DiscountType::Percentage => {
            // Above-100 percentages are data-entry errors, surfaced rather
            // than silently clamped.
            if !(0..=100).contains(&value) {
                return Err(AppError::DiscountError(
                    "Invalid discount configuration".to_string(),
                ));
            }
            Ok(applicable * value / 100)
        }
        DiscountType::Flat => Ok(value.max(0).min(applicable)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ticket_type(id: i64, price: i64, sold: i64) -> TicketType {
        TicketType {
            id,
            event_id: 1,
            name: format!("tt-{id}"),
            price,
            total_capacity: None,
            sold_count: sold,
            reserved_count: 0,
            sale_start_at: None,
            sale_end_at: None,
            is_hidden: false,
            access_code: None,
            min_per_order: 1,
            max_per_order: 10,
            max_per_user: None,
            gender_restriction: None,
            refund_allowed: false,
            refund_deadline_hours: 0,
            refund_percentage: 0,
            is_active: true,
            display_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn promo(discount_type: DiscountType, value: i64) -> PromoContext {
        PromoContext {
            code: DiscountCode {
                id: 1,
                event_id: 1,
                code: "LAUNCH".to_string(),
                discount_type,
                value,
                max_uses: None,
                max_uses_per_user: None,
                valid_from: None,
                valid_until: None,
                min_cart_value: None,
                ticket_type_ids: None,
                stackable: false,
                is_active: true,
                current_uses: 0,
                created_at: Utc::now(),
            },
            user_uses: 0,
        }
    }

    fn volume_rule(threshold: i64, value: i64) -> PricingRule {
        PricingRule {
            id: 1,
            event_id: 1,
            ticket_type_id: None,
            rule_kind: RuleKind::EarlyBirdVolume,
            discount_type: DiscountType::Percentage,
            value,
            quantity_threshold: Some(threshold),
            valid_from: None,
            valid_until: None,
            priority: 100,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn base_totals_without_discounts() {
        let cart = vec![(ticket_type(1, 500, 0), 2), (ticket_type(2, 1000, 0), 1)];
        let quote = price(&cart, None, &[], Utc::now()).unwrap();
        assert_eq!(quote.subtotal, 2000);
        assert_eq!(quote.discount_amount, 0);
        assert_eq!(quote.total, 2000);
        assert_eq!(quote.lines[0].line_total, 1000);
    }

    #[test]
    fn flat_promo_below_minimum_cart_is_rejected() {
        let cart = vec![(ticket_type(1, 800, 0), 1)];
        let mut ctx = promo(DiscountType::Flat, 500);
        ctx.code.min_cart_value = Some(1000);

        let err = price(&cart, Some(&ctx), &[], Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::DiscountError(_)));
    }

    #[test]
    fn flat_promo_never_drives_total_below_zero() {
        let cart = vec![(ticket_type(1, 300, 0), 1)];
        let ctx = promo(DiscountType::Flat, 500);

        let quote = price(&cart, Some(&ctx), &[], Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, 300);
        assert_eq!(quote.total, 0);
    }

    #[test]
    fn percentage_above_100_is_rejected_not_clamped() {
        let cart = vec![(ticket_type(1, 1000, 0), 1)];
        let ctx = promo(DiscountType::Percentage, 150);

        assert!(price(&cart, Some(&ctx), &[], Utc::now()).is_err());
    }

    #[test]
    fn promo_allowlist_scopes_the_discount() {
        let cart = vec![(ticket_type(1, 1000, 0), 1), (ticket_type(2, 1000, 0), 1)];
        let mut ctx = promo(DiscountType::Percentage, 50);
        ctx.code.ticket_type_ids = Some("[2]".to_string());

        let quote = price(&cart, Some(&ctx), &[], Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, 500);
    }

    #[test]
    fn promo_with_no_allowlist_intersection_is_rejected() {
        let cart = vec![(ticket_type(1, 1000, 0), 1)];
        let mut ctx = promo(DiscountType::Percentage, 50);
        ctx.code.ticket_type_ids = Some("[9]".to_string());

        assert!(price(&cart, Some(&ctx), &[], Utc::now()).is_err());
    }

    #[test]
    fn volume_rule_stops_at_threshold() {
        let rules = vec![volume_rule(100, 10)];

        let below = vec![(ticket_type(1, 1000, 99), 1)];
        let quote = price(&below, None, &rules, Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, 100);

        let at = vec![(ticket_type(1, 1000, 100), 1)];
        let quote = price(&at, None, &rules, Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, 0);
    }

    #[test]
    fn date_rule_respects_validity_window() {
        let now = Utc::now();
        let mut rule = volume_rule(0, 10);
        rule.rule_kind = RuleKind::EarlyBirdDate;
        rule.quantity_threshold = None;
        rule.valid_until = Some(now - Duration::hours(1));

        let cart = vec![(ticket_type(1, 1000, 0), 1)];
        let quote = price(&cart, None, &[rule], now).unwrap();
        assert_eq!(quote.discount_amount, 0);
    }

    #[test]
    fn group_rule_requires_line_quantity() {
        let mut rule = volume_rule(4, 20);
        rule.rule_kind = RuleKind::Group;

        let small = vec![(ticket_type(1, 500, 0), 2)];
        assert_eq!(price(&small, None, std::slice::from_ref(&rule), Utc::now()).unwrap().discount_amount, 0);

        let big = vec![(ticket_type(1, 500, 0), 4)];
        assert_eq!(price(&big, None, &[rule], Utc::now()).unwrap().discount_amount, 400);
    }

    #[test]
    fn lowest_priority_rule_wins_and_rules_do_not_stack() {
        let mut first = volume_rule(100, 10);
        first.priority = 1;
        let mut second = volume_rule(100, 50);
        second.priority = 2;

        let cart = vec![(ticket_type(1, 1000, 0), 1)];
        let quote = price(&cart, None, &[second, first], Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, 100);
    }

    #[test]
    fn non_stackable_promo_takes_larger_of_promo_and_rules() {
        let cart = vec![(ticket_type(1, 1000, 0), 1)];
        let rules = vec![volume_rule(100, 30)];

        // Promo 10% (100) vs rule 30% (300): rule wins, promo not consumed.
        let ctx = promo(DiscountType::Percentage, 10);
        let quote = price(&cart, Some(&ctx), &rules, Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, 300);
        assert!(!quote.promo_applied);

        // Promo 50% (500) vs rule 30% (300): promo wins.
        let ctx = promo(DiscountType::Percentage, 50);
        let quote = price(&cart, Some(&ctx), &rules, Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, 500);
        assert!(quote.promo_applied);
    }

    #[test]
    fn stackable_promo_combines_with_rules() {
        let cart = vec![(ticket_type(1, 1000, 0), 1)];
        let rules = vec![volume_rule(100, 30)];
        let mut ctx = promo(DiscountType::Percentage, 10);
        ctx.code.stackable = true;

        let quote = price(&cart, Some(&ctx), &rules, Utc::now()).unwrap();
        assert_eq!(quote.discount_amount, 400);
        assert!(quote.promo_applied);
    }

    #[test]
    fn exhausted_promo_is_rejected() {
        let cart = vec![(ticket_type(1, 1000, 0), 1)];
        let mut ctx = promo(DiscountType::Flat, 100);
        ctx.code.max_uses = Some(5);
        ctx.code.current_uses = 5;

        assert!(price(&cart, Some(&ctx), &[], Utc::now()).is_err());
    }

    #[test]
    fn per_user_exhausted_promo_is_rejected() {
        let cart = vec![(ticket_type(1, 1000, 0), 1)];
        let mut ctx = promo(DiscountType::Flat, 100);
        ctx.code.max_uses_per_user = Some(1);
        ctx.user_uses = 1;

        assert!(price(&cart, Some(&ctx), &[], Utc::now()).is_err());
    }

    #[test]
    fn pricing_is_deterministic_at_a_fixed_instant() {
        let now = Utc::now();
        let cart = vec![(ticket_type(1, 1000, 10), 2)];
        let rules = vec![volume_rule(100, 15)];
        let ctx = promo(DiscountType::Flat, 250);

        let a = price(&cart, Some(&ctx), &rules, now).unwrap();
        let b = price(&cart, Some(&ctx), &rules, now).unwrap();
        assert_eq!(a, b);
    }
}
