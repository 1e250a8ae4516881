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

//! # Abono Ledger
//!
//! This library tracks partial payments ("abonos") made against a
//! reservation's total, enforcing the payment rules and deriving the
//! reservation status from what has been paid.
//!
//! ## Core Components
//!
//! - [`ledger`]: Pure rules for recording and voiding payments
//! - [`LedgerService`]: Serialized read-validate-save unit of work over a store
//! - [`PaymentStore`]: Persistence seam, with [`MemoryStore`] as the in-process implementation
//! - [`Payment`]: A recorded payment with its creation-time snapshots
//! - [`LedgerError`]: Error types, including the full list of rule violations
//!
//! ## Rules
//!
//! - The first active payment must cover at least 50% of the total (configurable).
//! - The active total may never exceed the reservation total.
//! - Status is `Pending`, `PartiallyPaid` or `Confirmed` depending on the active total.
//! - Voided payments stay in the ledger but no longer count.
//!
//! ## Example
//!
//! ```
//! use abono_ledger::{LedgerService, ReservationId, ReservationStatus};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let service = LedgerService::new();
//! let reservation = ReservationId(1);
//! service.open_reservation(reservation, dec!(1000)).unwrap();
//!
//! let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//!
//! // Below half of the total: rejected as a first payment.
//! assert!(service.record_payment(reservation, dec!(400), date, None).is_err());
//!
//! let recorded = service.record_payment(reservation, dec!(600), date, None).unwrap();
//! assert_eq!(recorded.payment.remaining_balance(), dec!(400));
//! assert_eq!(recorded.status, ReservationStatus::PartiallyPaid);
//! ```
//!
//! ## Thread Safety
//!
//! The service serializes submissions per reservation, allowing payments for
//! different reservations to be processed in parallel.

mod base;
pub mod config;
pub mod error;
pub mod ledger;
mod payment;
mod payment_index;
mod reservation;
mod service;
pub mod store;

pub use base::{PaymentId, ReservationId};
pub use config::{LedgerConfig, StatusPolicy};
pub use error::{LedgerError, PersistenceError, ValidationError};
pub use ledger::{RecordedPayment, VoidOutcome};
pub use payment::{Payment, PaymentDraft};
pub use payment_index::PaymentIndex;
pub use reservation::{Reservation, ReservationStatus, derive_status};
pub use service::{DeletedPayment, LedgerEvent, LedgerService, VoidedPayment};
pub use store::{MemoryStore, PaymentStore};
