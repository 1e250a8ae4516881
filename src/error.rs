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

//! Error types for the payment ledger.
//!
//! Business-rule rejections are [`ValidationError`]s and are always reported
//! together. Everything the caller has to handle is a [`LedgerError`].

use crate::base::{PaymentId, ReservationId};
use rust_decimal::Decimal;
use thiserror::Error;

/// A single business-rule violation found while validating a payment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Amount is zero or negative
    #[error("payment amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Decimal },

    /// First active payment covers less than the required share of the total
    #[error("first payment must be at least {minimum}% of the total, got {percentage}%")]
    FirstPaymentBelowMinimum {
        percentage: Decimal,
        minimum: Decimal,
    },

    /// Amount is so far from the total that its share does not fit in a Decimal
    #[error("payment amount {amount} is out of range for this reservation")]
    AmountOutOfRange { amount: Decimal },

    /// Accepting the payment would take the active total past the reservation total
    #[error("payment of {attempted} exceeds the outstanding balance of {outstanding}")]
    OverpaymentNotAllowed {
        attempted: Decimal,
        outstanding: Decimal,
    },
}

/// Failures of the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Active total changed between read and save
    #[error("reservation {reservation_id} was modified concurrently (expected active total {expected}, found {found})")]
    ConcurrentModification {
        reservation_id: ReservationId,
        expected: Decimal,
        found: Decimal,
    },

    /// Reservation ID already present in the store
    #[error("reservation {0} already exists")]
    DuplicateReservation(ReservationId),

    /// Payment ID already present in the store
    #[error("payment {0} already exists")]
    DuplicatePayment(PaymentId),

    /// Every payment ID has been handed out
    #[error("payment IDs exhausted")]
    PaymentIdsExhausted,
}

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Reservation ID unknown to the store
    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),

    /// Payment ID unknown to the store
    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),

    /// Reservation total is zero or negative
    #[error("reservation total must be positive, got {0}")]
    InvalidTotal(Decimal),

    /// One or more business rules rejected the payment
    #[error("payment rejected: {}", join_violations(.0))]
    Validation(Vec<ValidationError>),

    /// Store refused the read or write
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl LedgerError {
    /// Returns the validation violations, if this is a business-rule rejection.
    pub fn violations(&self) -> Option<&[ValidationError]> {
        match self {
            Self::Validation(violations) => Some(violations.as_slice()),
            _ => None,
        }
    }

    /// True for missing reservations or payments.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ReservationNotFound(_) | Self::PaymentNotFound(_)
        )
    }
}

impl From<Vec<ValidationError>> for LedgerError {
    fn from(violations: Vec<ValidationError>) -> Self {
        Self::Validation(violations)
    }
}

fn join_violations(violations: &[ValidationError]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
