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

//! Reservations and their payment-driven status.
//!
//! Status is never set directly by callers. It is derived from the sum of
//! active payments:
//!
//! ```text
//!  Pending ──first accepted payment──► PartiallyPaid ──balance covered──► Confirmed
//!     │                                                                      ▲
//!     └──────────────── payment covering the full total ─────────────────────┘
//! ```

use crate::base::ReservationId;
use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment stage of a reservation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Pending,
    PartiallyPaid,
    Confirmed,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::PartiallyPaid => "partially_paid",
            Self::Confirmed => "confirmed",
        };
        f.write_str(name)
    }
}

/// Derives the reservation status from the active payment total.
///
/// Anything at or above the total confirms the reservation; any positive
/// amount below it is a partial payment; nothing paid is pending.
pub fn derive_status(total_amount: Decimal, active_total: Decimal) -> ReservationStatus {
    if active_total >= total_amount {
        ReservationStatus::Confirmed
    } else if active_total > Decimal::ZERO {
        ReservationStatus::PartiallyPaid
    } else {
        ReservationStatus::Pending
    }
}

/// A reservation as seen by the ledger.
///
/// The total is fixed at creation and is always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    id: ReservationId,
    total_amount: Decimal,
    status: ReservationStatus,
}

impl Reservation {
    /// Creates a pending reservation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTotal`] if `total_amount` is not positive.
    pub fn new(id: ReservationId, total_amount: Decimal) -> Result<Self, LedgerError> {
        Self::with_status(id, total_amount, ReservationStatus::Pending)
    }

    /// Rebuilds a reservation loaded from storage.
    pub fn with_status(
        id: ReservationId,
        total_amount: Decimal,
        status: ReservationStatus,
    ) -> Result<Self, LedgerError> {
        if total_amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidTotal(total_amount));
        }
        Ok(Self {
            id,
            total_amount,
            status,
        })
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: ReservationStatus) {
        self.status = status;
    }
}
