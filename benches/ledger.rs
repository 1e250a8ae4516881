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

//! Benchmarks for the payment ledger.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Pure rule evaluation against growing payment histories
//! - Sequential record/void cycles through the service
//! - Parallel submissions to one reservation and to many

use abono_ledger::ledger;
use abono_ledger::{LedgerConfig, LedgerService, Payment, Reservation, ReservationId};
use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Builds a reservation already carrying `count` accepted payments.
///
/// The first payment covers half of the total, the rest are one unit each.
fn history(count: u32) -> (Reservation, Vec<Payment>) {
    let service = LedgerService::new();
    let id = ReservationId(1);
    let total = Decimal::from(count) * Decimal::from(2);
    service.open_reservation(id, total).unwrap();

    service
        .record_payment(id, total / Decimal::from(2), date(), None)
        .unwrap();
    for _ in 1..count {
        service
            .record_payment(id, Decimal::ONE, date(), None)
            .unwrap();
    }

    (
        service.reservation(id).unwrap(),
        service.payments(id).unwrap(),
    )
}

// =============================================================================
// Rule Benchmarks
// =============================================================================

fn bench_record_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_rules");
    let config = LedgerConfig::default();

    for count in [1, 100, 1_000].iter() {
        let (reservation, prior) = history(*count);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let _ = ledger::record_payment(
                    black_box(&reservation),
                    black_box(&prior),
                    Decimal::ONE,
                    date(),
                    None,
                    &config,
                );
            })
        });
    }
    group.finish();
}

// =============================================================================
// Service Benchmarks
// =============================================================================

fn bench_record_and_void(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_and_void");

    for count in [100, 1_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let service = LedgerService::new();
                let id = ReservationId(1);
                service.open_reservation(id, Decimal::from(100)).unwrap();

                for _ in 0..count {
                    let recorded = service
                        .record_payment(id, Decimal::from(60), date(), None)
                        .unwrap();
                    service.void_payment(recorded.payment.id()).unwrap();
                }
                black_box(&service);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_same_reservation(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_same_reservation");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let service = Arc::new(LedgerService::new());
                let id = ReservationId(1);
                service.open_reservation(id, Decimal::from(count)).unwrap();
                service
                    .record_payment(id, Decimal::from(count / 2), date(), None)
                    .unwrap();

                (0..count).into_par_iter().for_each(|_| {
                    let _ = service.record_payment(id, Decimal::ONE, date(), None);
                });

                black_box(&service);
            })
        });
    }
    group.finish();
}

fn bench_parallel_many_reservations(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_many_reservations");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let service = Arc::new(LedgerService::new());

                (0..count).into_par_iter().for_each(|i| {
                    let id = ReservationId(i as u32);
                    service.open_reservation(id, Decimal::from(100)).unwrap();
                    service
                        .record_payment(id, Decimal::from(100), date(), None)
                        .unwrap();
                });

                black_box(&service);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(rules, bench_record_rules,);

criterion_group!(service, bench_record_and_void,);

criterion_group!(
    multi_threaded,
    bench_parallel_same_reservation,
    bench_parallel_many_reservations,
);

criterion_main!(rules, service, multi_threaded);
