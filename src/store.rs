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

//! Persistence collaborator for the ledger.
//!
//! [`PaymentStore`] is the seam between the pure ledger rules and whatever
//! keeps reservations and payments. [`MemoryStore`] is the in-process
//! implementation used by the CLI and the tests.

use crate::base::{PaymentId, ReservationId};
use crate::error::{LedgerError, PersistenceError};
use crate::ledger::active_total;
use crate::payment::{Payment, PaymentDraft};
use crate::payment_index::PaymentIndex;
use crate::reservation::{Reservation, ReservationStatus};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};

/// Storage for reservations and their payments.
///
/// Every write that touches both a payment and the reservation status must
/// apply both or neither.
pub trait PaymentStore: Send + Sync {
    /// # Errors
    ///
    /// [`PersistenceError::DuplicateReservation`] if the ID is taken.
    fn insert_reservation(&self, reservation: Reservation) -> Result<(), LedgerError>;

    fn reservation(&self, id: ReservationId) -> Result<Reservation, LedgerError>;

    /// All reservation IDs, ascending.
    fn reservation_ids(&self) -> Vec<ReservationId>;

    /// Every payment of a reservation, voided ones included, in recording order.
    fn payments(&self, id: ReservationId) -> Result<Vec<Payment>, LedgerError>;

    /// Non-voided payments of a reservation, in recording order.
    fn active_payments(&self, id: ReservationId) -> Result<Vec<Payment>, LedgerError> {
        let mut payments = self.payments(id)?;
        payments.retain(Payment::is_active);
        Ok(payments)
    }

    fn payment(&self, id: PaymentId) -> Result<Payment, LedgerError>;

    /// Stores a new payment and the reservation status it produced.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::ConcurrentModification`] if the reservation's
    /// active total is no longer `expected_active_total`. Nothing is written
    /// on error.
    fn save_atomically(
        &self,
        draft: PaymentDraft,
        status: ReservationStatus,
        expected_active_total: Decimal,
    ) -> Result<Payment, LedgerError>;

    /// Replaces a stored payment, optionally updating the reservation status
    /// in the same write.
    fn update_payment(
        &self,
        payment: &Payment,
        status: Option<ReservationStatus>,
    ) -> Result<(), LedgerError>;

    /// Removes a payment, optionally updating the reservation status in the
    /// same write. Returns the removed record.
    fn delete_payment(
        &self,
        id: PaymentId,
        status: Option<ReservationStatus>,
    ) -> Result<Payment, LedgerError>;
}

#[derive(Debug)]
struct ReservationRecord {
    reservation: Reservation,
    payments: Vec<Payment>,
}

/// In-memory [`PaymentStore`].
///
/// Each reservation and its payments sit behind one [`Mutex`], so every
/// write is atomic per reservation. Payment IDs start at 1 and are never
/// reused; once `u32::MAX` is reached saves fail with
/// [`PersistenceError::PaymentIdsExhausted`].
#[derive(Debug)]
pub struct MemoryStore {
    reservations: DashMap<ReservationId, Mutex<ReservationRecord>>,
    index: PaymentIndex,
    next_payment_id: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            reservations: DashMap::new(),
            index: PaymentIndex::new(),
            next_payment_id: AtomicU32::new(1),
        }
    }

    /// Number of stored payments across all reservations.
    pub fn payment_count(&self) -> usize {
        self.index.len()
    }

    fn with_record<T>(
        &self,
        id: ReservationId,
        f: impl FnOnce(&mut ReservationRecord) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let entry = self
            .reservations
            .get(&id)
            .ok_or(LedgerError::ReservationNotFound(id))?;
        let mut record = entry.lock();
        f(&mut record)
    }

    /// Hands out the next payment ID, refusing to wrap around.
    fn allocate_payment_id(&self) -> Result<PaymentId, PersistenceError> {
        self.next_payment_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| next.checked_add(1))
            .map(PaymentId)
            .map_err(|_| PersistenceError::PaymentIdsExhausted)
    }

    fn owner_of(&self, id: PaymentId) -> Result<ReservationId, LedgerError> {
        self.index.owner(id).ok_or(LedgerError::PaymentNotFound(id))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentStore for MemoryStore {
    fn insert_reservation(&self, reservation: Reservation) -> Result<(), LedgerError> {
        match self.reservations.entry(reservation.id()) {
            Entry::Occupied(_) => {
                Err(PersistenceError::DuplicateReservation(reservation.id()).into())
            }
            Entry::Vacant(entry) => {
                entry.insert(Mutex::new(ReservationRecord {
                    reservation,
                    payments: Vec::new(),
                }));
                Ok(())
            }
        }
    }

    fn reservation(&self, id: ReservationId) -> Result<Reservation, LedgerError> {
        self.with_record(id, |record| Ok(record.reservation.clone()))
    }

    fn reservation_ids(&self) -> Vec<ReservationId> {
        let mut ids: Vec<_> = self.reservations.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    fn payments(&self, id: ReservationId) -> Result<Vec<Payment>, LedgerError> {
        self.with_record(id, |record| Ok(record.payments.clone()))
    }

    fn payment(&self, id: PaymentId) -> Result<Payment, LedgerError> {
        let owner = self.owner_of(id)?;
        self.with_record(owner, |record| {
            record
                .payments
                .iter()
                .find(|payment| payment.id() == id)
                .cloned()
                .ok_or(LedgerError::PaymentNotFound(id))
        })
    }

    fn save_atomically(
        &self,
        draft: PaymentDraft,
        status: ReservationStatus,
        expected_active_total: Decimal,
    ) -> Result<Payment, LedgerError> {
        let reservation_id = draft.reservation_id();
        self.with_record(reservation_id, |record| {
            let found = active_total(&record.payments);
            if found != expected_active_total {
                return Err(PersistenceError::ConcurrentModification {
                    reservation_id,
                    expected: expected_active_total,
                    found,
                }
                .into());
            }

            let id = self.allocate_payment_id()?;
            self.index.insert(id, reservation_id)?;

            let payment = draft.assign_id(id);
            record.payments.push(payment.clone());
            record.reservation.set_status(status);
            Ok(payment)
        })
    }

    fn update_payment(
        &self,
        payment: &Payment,
        status: Option<ReservationStatus>,
    ) -> Result<(), LedgerError> {
        let owner = self.owner_of(payment.id())?;
        self.with_record(owner, |record| {
            let stored = record
                .payments
                .iter_mut()
                .find(|stored| stored.id() == payment.id())
                .ok_or(LedgerError::PaymentNotFound(payment.id()))?;
            *stored = payment.clone();
            if let Some(status) = status {
                record.reservation.set_status(status);
            }
            Ok(())
        })
    }

    fn delete_payment(
        &self,
        id: PaymentId,
        status: Option<ReservationStatus>,
    ) -> Result<Payment, LedgerError> {
        let owner = self.owner_of(id)?;
        let removed = self.with_record(owner, |record| {
            let position = record
                .payments
                .iter()
                .position(|payment| payment.id() == id)
                .ok_or(LedgerError::PaymentNotFound(id))?;
            let removed = record.payments.remove(position);
            if let Some(status) = status {
                record.reservation.set_status(status);
            }
            Ok(removed)
        })?;
        self.index.remove(id);
        Ok(removed)
    }
}
