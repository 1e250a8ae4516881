// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Payment ledger engine.
//!
//! Pure, synchronous rules for accepting and voiding payments. Nothing here
//! touches storage: callers feed in the reservation and its prior active
//! payments, and persist whatever comes back (see [`crate::LedgerService`]).
//!
//! # Rules
//!
//! | Rule | Applies when | Violation |
//! |------|--------------|-----------|
//! | Positive amount | always | [`ValidationError::NonPositiveAmount`] |
//! | Minimum first payment | active total before the payment is zero | [`ValidationError::FirstPaymentBelowMinimum`] |
//! | Representable share | always | [`ValidationError::AmountOutOfRange`] |
//! | No overpayment | always | [`ValidationError::OverpaymentNotAllowed`] |
//!
//! Every rule is evaluated; a rejection lists all of them that failed.
//! "First payment" means the active total is zero, so a reservation whose
//! payments were all voided is back to needing the minimum.

use crate::config::LedgerConfig;
use crate::error::ValidationError;
use crate::payment::{Payment, PaymentDraft};
use crate::reservation::{Reservation, ReservationStatus, derive_status};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// An accepted payment together with the reservation state it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPayment<P = PaymentDraft> {
    pub payment: P,
    /// Reservation status after the payment.
    pub status: ReservationStatus,
    /// Active total before the payment.
    pub prior_total: Decimal,
    /// Active total including the payment.
    pub total_paid: Decimal,
}

/// Result of voiding a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoidOutcome {
    Voided,
    /// The payment was already voided; nothing changed.
    AlreadyVoided,
}

/// Sum of the amounts of the non-voided payments.
pub fn active_total<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Decimal {
    payments
        .into_iter()
        .filter(|payment| payment.is_active())
        .map(Payment::amount)
        .sum()
}

/// Share of `total_amount` that `amount` represents, in percent.
///
/// Rounded to [`Payment::PERCENTAGE_PRECISION`] places. `total_amount` is
/// positive for every [`Reservation`]. Returns `None` when the share does
/// not fit in a [`Decimal`], which only happens for amounts many orders of
/// magnitude away from the total.
pub fn percentage_of(amount: Decimal, total_amount: Decimal) -> Option<Decimal> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(total_amount))
        .or_else(|| {
            amount
                .checked_div(total_amount)
                .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
        })
        .map(|percentage| percentage.round_dp(Payment::PERCENTAGE_PRECISION))
}

/// True if `amount` covers less than `minimum` percent of `total_amount`.
///
/// Compared unrounded so the stored percentage rounding never flips a
/// boundary. Near the top of the [`Decimal`] range the minimum is scaled
/// down first instead, which keeps the product within the total.
fn below_minimum(amount: Decimal, total_amount: Decimal, minimum: Decimal) -> bool {
    match (
        amount.checked_mul(Decimal::ONE_HUNDRED),
        total_amount.checked_mul(minimum),
    ) {
        (Some(paid), Some(required)) => paid < required,
        _ => minimum
            .checked_div(Decimal::ONE_HUNDRED)
            .and_then(|share| total_amount.checked_mul(share))
            .is_some_and(|required| amount < required),
    }
}

/// Validates a candidate payment and computes its snapshots.
///
/// `prior_payments` should be the reservation's active payments; voided
/// entries and payments of other reservations are ignored, so passing the
/// full history is also fine.
///
/// # Errors
///
/// Returns every [`ValidationError`] that applies. Nothing is produced for
/// the caller to persist in that case, and the reservation status is
/// unchanged.
pub fn record_payment(
    reservation: &Reservation,
    prior_payments: &[Payment],
    amount: Decimal,
    date: NaiveDate,
    receipt: Option<Vec<u8>>,
    config: &LedgerConfig,
) -> Result<RecordedPayment, Vec<ValidationError>> {
    let total_amount = reservation.total_amount();
    let prior_total = active_total(
        prior_payments
            .iter()
            .filter(|payment| payment.reservation_id() == reservation.id()),
    );

    // Both sides are non-negative, so this cannot overflow.
    let outstanding = total_amount - prior_total;
    let percentage = percentage_of(amount, total_amount);

    let mut violations = Vec::new();

    if amount <= Decimal::ZERO {
        violations.push(ValidationError::NonPositiveAmount { amount });
    }

    if percentage.is_none() {
        violations.push(ValidationError::AmountOutOfRange { amount });
    }

    let minimum = config.minimum_first_payment_percentage;
    if prior_total.is_zero()
        && below_minimum(amount, total_amount, minimum)
        && let Some(percentage) = percentage
    {
        violations.push(ValidationError::FirstPaymentBelowMinimum {
            percentage,
            minimum,
        });
    }

    if amount > outstanding {
        violations.push(ValidationError::OverpaymentNotAllowed {
            attempted: amount,
            outstanding,
        });
    }

    let Some(percentage) = percentage.filter(|_| violations.is_empty()) else {
        return Err(violations);
    };

    // 0 < amount <= outstanding from here on.
    let remaining_balance = outstanding - amount;
    let total_paid = prior_total + amount;
    let status = if total_paid.is_zero() {
        reservation.status()
    } else {
        derive_status(total_amount, total_paid)
    };

    Ok(RecordedPayment {
        payment: PaymentDraft::new(
            reservation.id(),
            date,
            amount,
            percentage,
            remaining_balance,
            receipt,
        ),
        status,
        prior_total,
        total_paid,
    })
}

/// Voids a payment. Voiding twice is a no-op.
///
/// Only the flag changes: the payment's own snapshots, its siblings and the
/// reservation status are left alone.
pub fn void_payment(payment: &mut Payment) -> VoidOutcome {
    if payment.void() {
        VoidOutcome::Voided
    } else {
        VoidOutcome::AlreadyVoided
    }
}
