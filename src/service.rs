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

//! Ledger service.
//!
//! The [`LedgerService`] is the unit of work around the pure rules in
//! [`crate::ledger`]: it reads a reservation's active payments, validates
//! the candidate and saves the result, holding a per-reservation lock across
//! the whole sequence so two submissions can never both pass the
//! overpayment check against the same stale total.
//!
//! # Operations
//!
//! | Operation | Status change |
//! |-----------|---------------|
//! | [`record_payment`](LedgerService::record_payment) | Derived from the new active total |
//! | [`void_payment`](LedgerService::void_payment) | Per [`LedgerConfig::status_on_void`] |
//! | [`delete_payment`](LedgerService::delete_payment) | Per [`LedgerConfig::status_on_delete`] |
//!
//! Snapshots of sibling payments are never rewritten by any operation.
//!
//! # Thread Safety
//!
//! Locks live in a [`DashMap`] keyed by reservation, so submissions for
//! different reservations run in parallel.

use crate::base::{PaymentId, ReservationId};
use crate::config::{LedgerConfig, StatusPolicy};
use crate::error::{LedgerError, ValidationError};
use crate::ledger::{self, RecordedPayment, VoidOutcome, active_total};
use crate::payment::Payment;
use crate::reservation::{Reservation, ReservationStatus, derive_status};
use crate::store::{MemoryStore, PaymentStore};
use chrono::NaiveDate;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something that happened in the ledger, in the order it happened.
///
/// Drained by the caller with [`LedgerService::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    PaymentRecorded {
        reservation_id: ReservationId,
        payment_id: PaymentId,
        amount: Decimal,
        status: ReservationStatus,
    },
    PaymentRejected {
        reservation_id: ReservationId,
        amount: Decimal,
        violations: Vec<ValidationError>,
    },
    PaymentVoided {
        reservation_id: ReservationId,
        payment_id: PaymentId,
        status: ReservationStatus,
    },
    PaymentDeleted {
        reservation_id: ReservationId,
        payment_id: PaymentId,
        status: ReservationStatus,
    },
}

/// Outcome of [`LedgerService::void_payment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoidedPayment {
    pub payment: Payment,
    pub outcome: VoidOutcome,
    /// Reservation status after the void.
    pub status: ReservationStatus,
}

/// Outcome of [`LedgerService::delete_payment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedPayment {
    pub payment: Payment,
    /// Reservation status after the delete.
    pub status: ReservationStatus,
}

pub struct LedgerService<S = MemoryStore> {
    store: S,
    config: LedgerConfig,
    /// Serializes read-validate-write per reservation.
    locks: DashMap<ReservationId, Arc<Mutex<()>>>,
    events: SegQueue<LedgerEvent>,
}

impl LedgerService<MemoryStore> {
    /// Creates a service over an empty [`MemoryStore`] with default rules.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }
}

impl Default for LedgerService<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PaymentStore> LedgerService<S> {
    pub fn with_store(store: S, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            locks: DashMap::new(),
            events: SegQueue::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Registers a new pending reservation.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidTotal`] - `total_amount` is not positive.
    /// - [`LedgerError::Persistence`] - the ID is already taken.
    pub fn open_reservation(
        &self,
        id: ReservationId,
        total_amount: Decimal,
    ) -> Result<Reservation, LedgerError> {
        let reservation = Reservation::new(id, total_amount)?;
        self.store.insert_reservation(reservation.clone())?;
        info!(reservation_id = %id, total = %total_amount, "reservation opened");
        Ok(reservation)
    }

    pub fn reservation(&self, id: ReservationId) -> Result<Reservation, LedgerError> {
        self.store.reservation(id)
    }

    /// Every payment of the reservation, voided ones included.
    pub fn payments(&self, id: ReservationId) -> Result<Vec<Payment>, LedgerError> {
        self.store.payments(id)
    }

    /// Validates and records a payment, updating the reservation status.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ReservationNotFound`] - unknown reservation.
    /// - [`LedgerError::Validation`] - every business rule the payment breaks.
    /// - [`LedgerError::Persistence`] - the store refused the write.
    ///
    /// Nothing is written on error.
    pub fn record_payment(
        &self,
        reservation_id: ReservationId,
        amount: Decimal,
        date: NaiveDate,
        receipt: Option<Vec<u8>>,
    ) -> Result<RecordedPayment<Payment>, LedgerError> {
        let lock = self.lock_for(reservation_id);
        let _guard = lock.lock();

        let reservation = self.store.reservation(reservation_id)?;
        let prior = self.store.active_payments(reservation_id)?;

        let recorded = match ledger::record_payment(
            &reservation,
            &prior,
            amount,
            date,
            receipt,
            &self.config,
        ) {
            Ok(recorded) => recorded,
            Err(violations) => {
                warn!(
                    reservation_id = %reservation_id,
                    amount = %amount,
                    violations = violations.len(),
                    "payment rejected"
                );
                self.events.push(LedgerEvent::PaymentRejected {
                    reservation_id,
                    amount,
                    violations: violations.clone(),
                });
                return Err(LedgerError::Validation(violations));
            }
        };

        let RecordedPayment {
            payment: draft,
            status,
            prior_total,
            total_paid,
        } = recorded;
        let payment = self.store.save_atomically(draft, status, prior_total)?;

        info!(
            reservation_id = %reservation_id,
            payment_id = %payment.id(),
            amount = %amount,
            remaining = %payment.remaining_balance(),
            status = %status,
            "payment recorded"
        );
        self.events.push(LedgerEvent::PaymentRecorded {
            reservation_id,
            payment_id: payment.id(),
            amount,
            status,
        });

        Ok(RecordedPayment {
            payment,
            status,
            prior_total,
            total_paid,
        })
    }

    /// Voids a payment. Voiding an already voided payment succeeds without
    /// changing anything.
    pub fn void_payment(&self, payment_id: PaymentId) -> Result<VoidedPayment, LedgerError> {
        let reservation_id = self.store.payment(payment_id)?.reservation_id();
        let lock = self.lock_for(reservation_id);
        let _guard = lock.lock();

        // Re-read under the lock.
        let mut payment = self.store.payment(payment_id)?;
        let reservation = self.store.reservation(reservation_id)?;

        let outcome = ledger::void_payment(&mut payment);
        if outcome == VoidOutcome::AlreadyVoided {
            debug!(payment_id = %payment_id, "payment already voided");
            return Ok(VoidedPayment {
                payment,
                outcome,
                status: reservation.status(),
            });
        }

        let status = self.status_after_removal(
            self.config.status_on_void,
            &reservation,
            payment_id,
        )?;
        self.store.update_payment(&payment, status)?;
        let status = status.unwrap_or(reservation.status());

        info!(
            reservation_id = %reservation_id,
            payment_id = %payment_id,
            status = %status,
            "payment voided"
        );
        self.events.push(LedgerEvent::PaymentVoided {
            reservation_id,
            payment_id,
            status,
        });

        Ok(VoidedPayment {
            payment,
            outcome,
            status,
        })
    }

    /// Permanently removes a payment.
    pub fn delete_payment(&self, payment_id: PaymentId) -> Result<DeletedPayment, LedgerError> {
        let reservation_id = self.store.payment(payment_id)?.reservation_id();
        let lock = self.lock_for(reservation_id);
        let _guard = lock.lock();

        let reservation = self.store.reservation(reservation_id)?;
        let status = self.status_after_removal(
            self.config.status_on_delete,
            &reservation,
            payment_id,
        )?;
        let payment = self.store.delete_payment(payment_id, status)?;
        let status = status.unwrap_or(reservation.status());

        info!(
            reservation_id = %reservation_id,
            payment_id = %payment_id,
            status = %status,
            "payment deleted"
        );
        self.events.push(LedgerEvent::PaymentDeleted {
            reservation_id,
            payment_id,
            status,
        });

        Ok(DeletedPayment { payment, status })
    }

    /// Takes every event recorded so far, oldest first.
    pub fn drain_events(&self) -> Vec<LedgerEvent> {
        let mut events = Vec::with_capacity(self.events.len());
        while let Some(event) = self.events.pop() {
            events.push(event);
        }
        events
    }

    /// Status to store once `removed` no longer counts, or `None` to keep
    /// the current one.
    fn status_after_removal(
        &self,
        policy: StatusPolicy,
        reservation: &Reservation,
        removed: PaymentId,
    ) -> Result<Option<ReservationStatus>, LedgerError> {
        match policy {
            StatusPolicy::Keep => Ok(None),
            StatusPolicy::Recompute => {
                let remaining = self.store.active_payments(reservation.id())?;
                let total = active_total(remaining.iter().filter(|p| p.id() != removed));
                Ok(Some(derive_status(reservation.total_amount(), total)))
            }
        }
    }

    fn lock_for(&self, id: ReservationId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id).or_default().value())
    }
}
