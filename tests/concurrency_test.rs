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

//! Concurrency tests for the ledger service.
//!
//! Many threads submit, void and delete payments at once. The per-reservation
//! lock must keep "read prior total, validate, save" sequential, so the
//! overpayment rule holds no matter how submissions interleave.
//!
//! A background thread runs parking_lot's deadlock detector (enabled through
//! the `deadlock_detection` feature in dev-dependencies) for the duration of
//! each test.

use abono_ledger::ledger::active_total;
use abono_ledger::{
    LedgerConfig, LedgerError, LedgerService, PaymentId, ReservationId, ReservationStatus,
    StatusPolicy,
};
use chrono::NaiveDate;
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

struct DeadlockDetector {
    running: Arc<AtomicBool>,
    found: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Starts a background thread that checks for deadlocks.
fn start_deadlock_detector() -> DeadlockDetector {
    let running = Arc::new(AtomicBool::new(true));
    let found = Arc::new(AtomicBool::new(false));
    let (running_clone, found_clone) = (running.clone(), found.clone());

    let handle = thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(50));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                found_clone.store(true, Ordering::SeqCst);
                return;
            }
        }
    });

    DeadlockDetector {
        running,
        found,
        handle,
    }
}

/// Stops the detector and fails the test if it saw a deadlock.
fn stop_deadlock_detector(detector: DeadlockDetector) {
    detector.running.store(false, Ordering::SeqCst);
    detector.handle.join().expect("detector thread panicked");
    assert!(
        !detector.found.load(Ordering::SeqCst),
        "Deadlock detected! See output above for details."
    );
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()
}

// === Tests ===

/// Many threads race to pay the same reservation; the total is never exceeded.
#[test]
fn concurrent_payments_never_overpay() {
    let detector = start_deadlock_detector();
    let service = Arc::new(LedgerService::new());
    let id = ReservationId(1);
    service.open_reservation(id, dec!(1000)).unwrap();
    service.record_payment(id, dec!(500), date(), None).unwrap();

    const NUM_THREADS: usize = 16;
    const OPS_PER_THREAD: usize = 50;
    let accepted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let service = service.clone();
            let accepted = accepted.clone();
            thread::spawn(move || {
                for _ in 0..OPS_PER_THREAD {
                    match service.record_payment(id, dec!(7), date(), None) {
                        Ok(_) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(LedgerError::Validation(_)) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    stop_deadlock_detector(detector);

    // 500 remaining / 7 per payment.
    assert_eq!(accepted.load(Ordering::SeqCst), 71);
    let payments = service.payments(id).unwrap();
    assert_eq!(active_total(&payments), dec!(997));
    assert_eq!(
        service.reservation(id).unwrap().status(),
        ReservationStatus::PartiallyPaid
    );

    // Every snapshot reflects a distinct, sequential prior total.
    let mut balances: Vec<Decimal> = payments.iter().map(|p| p.remaining_balance()).collect();
    balances.sort();
    balances.dedup();
    assert_eq!(balances.len(), payments.len());
}

/// Only one of many simultaneous full payments can be the first payment.
#[test]
fn racing_full_payments_confirm_once() {
    let detector = start_deadlock_detector();
    let service = Arc::new(LedgerService::new());
    let id = ReservationId(1);
    service.open_reservation(id, dec!(250)).unwrap();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || service.record_payment(id, dec!(250), date(), None).is_ok())
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .filter(|ok| *ok)
        .count();
    stop_deadlock_detector(detector);

    assert_eq!(successes, 1);
    assert_eq!(service.payments(id).unwrap().len(), 1);
    assert_eq!(
        service.reservation(id).unwrap().status(),
        ReservationStatus::Confirmed
    );
}

/// Payments, voids and deletes interleave across many reservations.
#[test]
fn mixed_operations_across_reservations() {
    let detector = start_deadlock_detector();
    let config = LedgerConfig {
        status_on_void: StatusPolicy::Recompute,
        status_on_delete: StatusPolicy::Recompute,
        ..LedgerConfig::default()
    };
    let service = Arc::new(LedgerService::with_config(config));

    const NUM_RESERVATIONS: u32 = 8;
    for r in 0..NUM_RESERVATIONS {
        service
            .open_reservation(ReservationId(r), dec!(100))
            .unwrap();
    }

    let handles: Vec<_> = (0..24u32)
        .map(|t| {
            let service = service.clone();
            thread::spawn(move || {
                for i in 0..100u32 {
                    let id = ReservationId((t + i) % NUM_RESERVATIONS);
                    match i % 4 {
                        0 => {
                            let _ = service.record_payment(id, dec!(60), date(), None);
                        }
                        1 => {
                            let _ = service.record_payment(id, dec!(10), date(), None);
                        }
                        2 => {
                            if let Some(p) = service.payments(id).unwrap().first() {
                                let _ = service.void_payment(p.id());
                            }
                        }
                        _ => {
                            if let Some(p) = service.payments(id).unwrap().last() {
                                let _ = service.delete_payment(p.id());
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    stop_deadlock_detector(detector);

    for r in 0..NUM_RESERVATIONS {
        let id = ReservationId(r);
        let reservation = service.reservation(id).unwrap();
        let active = active_total(&service.payments(id).unwrap());
        assert!(active <= reservation.total_amount());
        assert_eq!(
            reservation.status(),
            abono_ledger::derive_status(reservation.total_amount(), active)
        );
    }
}

/// Voiding the same payment from many threads succeeds everywhere and
/// reports exactly one real void.
#[test]
fn concurrent_void_same_payment() {
    let detector = start_deadlock_detector();
    let service = Arc::new(LedgerService::new());
    let id = ReservationId(1);
    service.open_reservation(id, dec!(100)).unwrap();
    let payment: PaymentId = service
        .record_payment(id, dec!(80), date(), None)
        .unwrap()
        .payment
        .id();
    service.drain_events();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || service.void_payment(payment).unwrap().outcome)
        })
        .collect();

    let voided = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .filter(|outcome| *outcome == abono_ledger::VoidOutcome::Voided)
        .count();
    stop_deadlock_detector(detector);

    assert_eq!(voided, 1);
    assert_eq!(service.drain_events().len(), 1);
    assert!(service.payments(id).unwrap()[0].voided());
}
