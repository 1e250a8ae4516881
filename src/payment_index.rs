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

//! Thread-safe payment index with deduplication.
//!
//! Maps every payment ID to its owning reservation so payments can be
//! addressed by ID alone.

use crate::base::{PaymentId, ReservationId};
use crate::error::PersistenceError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// A concurrent payment index with duplicate detection.
///
/// Backed by a [`DashMap`]; the entry API makes check-and-insert atomic.
#[derive(Debug, Default)]
pub struct PaymentIndex {
    owners: DashMap<PaymentId, ReservationId>,
}

impl PaymentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a payment under its reservation.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::DuplicatePayment`] if the ID is taken.
    pub fn insert(
        &self,
        payment_id: PaymentId,
        reservation_id: ReservationId,
    ) -> Result<(), PersistenceError> {
        match self.owners.entry(payment_id) {
            Entry::Occupied(_) => Err(PersistenceError::DuplicatePayment(payment_id)),
            Entry::Vacant(entry) => {
                entry.insert(reservation_id);
                Ok(())
            }
        }
    }

    pub fn owner(&self, payment_id: PaymentId) -> Option<ReservationId> {
        self.owners.get(&payment_id).map(|entry| *entry)
    }

    pub fn remove(&self, payment_id: PaymentId) -> Option<ReservationId> {
        self.owners.remove(&payment_id).map(|(_, owner)| owner)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
