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

//! Payment ("abono") records.
//!
//! A payment is created once through the ledger and afterwards only ever
//! changes by being voided:
//!
//! ```text
//!  PaymentDraft ──save──► Payment (active) ──void──► Payment (voided)
//! ```
//!
//! `percentage_of_total` and `remaining_balance` are snapshots taken when the
//! payment was accepted. They describe the ledger "as of this payment" and
//! are never recomputed when sibling payments are voided or deleted.

use crate::base::{PaymentId, ReservationId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// A validated payment that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDraft {
    reservation_id: ReservationId,
    date: NaiveDate,
    amount: Decimal,
    percentage_of_total: Decimal,
    remaining_balance: Decimal,
    receipt: Option<Vec<u8>>,
}

impl PaymentDraft {
    pub(crate) fn new(
        reservation_id: ReservationId,
        date: NaiveDate,
        amount: Decimal,
        percentage_of_total: Decimal,
        remaining_balance: Decimal,
        receipt: Option<Vec<u8>>,
    ) -> Self {
        Self {
            reservation_id,
            date,
            amount,
            percentage_of_total,
            remaining_balance,
            // An empty upload is no receipt at all.
            receipt: receipt.filter(|bytes| !bytes.is_empty()),
        }
    }

    pub fn reservation_id(&self) -> ReservationId {
        self.reservation_id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn percentage_of_total(&self) -> Decimal {
        self.percentage_of_total
    }

    pub fn remaining_balance(&self) -> Decimal {
        self.remaining_balance
    }

    /// Turns the draft into a stored payment. Called by stores when they
    /// allocate the ID.
    pub fn assign_id(self, id: PaymentId) -> Payment {
        Payment {
            id,
            reservation_id: self.reservation_id,
            date: self.date,
            amount: self.amount,
            percentage_of_total: self.percentage_of_total,
            remaining_balance: self.remaining_balance,
            voided: false,
            receipt: self.receipt,
        }
    }
}

/// A recorded payment against a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    id: PaymentId,
    reservation_id: ReservationId,
    date: NaiveDate,
    amount: Decimal,
    percentage_of_total: Decimal,
    remaining_balance: Decimal,
    voided: bool,
    /// Opaque receipt image; never interpreted by the ledger.
    receipt: Option<Vec<u8>>,
}

impl Payment {
    /// Decimal places kept for the stored percentage snapshot.
    pub const PERCENTAGE_PRECISION: u32 = 4;

    /// Decimal places used when serializing amounts.
    const DECIMAL_PRECISION: u32 = 4;

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn reservation_id(&self) -> ReservationId {
        self.reservation_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn percentage_of_total(&self) -> Decimal {
        self.percentage_of_total
    }

    pub fn remaining_balance(&self) -> Decimal {
        self.remaining_balance
    }

    pub fn voided(&self) -> bool {
        self.voided
    }

    pub fn is_active(&self) -> bool {
        !self.voided
    }

    pub fn receipt(&self) -> Option<&[u8]> {
        self.receipt.as_deref()
    }

    /// Marks the payment voided. Returns `false` if it already was.
    pub(crate) fn void(&mut self) -> bool {
        if self.voided {
            return false;
        }
        self.voided = true;
        true
    }
}

impl Serialize for Payment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Payment", 8)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("reservation", &self.reservation_id)?;
        state.serialize_field("date", &self.date)?;
        state.serialize_field(
            "amount",
            &self.amount.round_dp(Payment::DECIMAL_PRECISION),
        )?;
        state.serialize_field("percentage", &self.percentage_of_total)?;
        state.serialize_field(
            "remaining",
            &self.remaining_balance.round_dp(Payment::DECIMAL_PRECISION),
        )?;
        state.serialize_field("voided", &self.voided)?;
        state.serialize_field("has_receipt", &self.receipt.is_some())?;
        state.end()
    }
}
