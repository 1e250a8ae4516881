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

use abono_ledger::{
    LedgerConfig, LedgerError, LedgerService, PaymentId, PaymentStore, ReservationId, StatusPolicy,
};
use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{debug, trace, warn};
use tracing_subscriber::EnvFilter;

/// Abono Ledger - Replay reservation payment CSV files
///
/// Reads ledger commands from a CSV file and writes every resulting payment
/// to stdout. Rejected commands are logged to stderr and skipped.
#[derive(Parser, Debug)]
#[command(name = "abono-ledger")]
#[command(about = "Replays reservation payments and reports the resulting ledger", long_about = None)]
struct Args {
    /// Path to CSV file with ledger commands
    ///
    /// Expected format: type,reservation,payment,amount,date
    /// Example: cargo run -- payments.csv > ledger.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// JSON file with ledger settings; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Minimum share of the total, in percent, for a first payment
    #[arg(long, value_name = "PCT")]
    min_first_payment: Option<Decimal>,

    /// Reservation status handling when a payment is voided (keep|recompute)
    #[arg(long, value_name = "POLICY")]
    void_policy: Option<StatusPolicy>,

    /// Reservation status handling when a payment is deleted (keep|recompute)
    #[arg(long, value_name = "POLICY")]
    delete_policy: Option<StatusPolicy>,
}

impl Args {
    fn ledger_config(&self) -> Result<LedgerConfig, abono_ledger::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => LedgerConfig::load(path)?,
            None => LedgerConfig::default(),
        };
        if let Some(minimum) = self.min_first_payment {
            config.minimum_first_payment_percentage = minimum;
        }
        if let Some(policy) = self.void_policy {
            config.status_on_void = policy;
        }
        if let Some(policy) = self.delete_policy {
            config.status_on_delete = policy;
        }
        config.validate()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.ledger_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let service = match process_commands(BufReader::new(file), config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error processing commands: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_payments(&service, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, reservation, payment, amount, date`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    command: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    reservation: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    payment: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Open {
        reservation: ReservationId,
        total: Decimal,
    },
    Pay {
        reservation: ReservationId,
        amount: Decimal,
        date: NaiveDate,
    },
    Void {
        payment: PaymentId,
    },
    Delete {
        payment: PaymentId,
    },
}

impl CsvRecord {
    /// Converts a CSV record to a command.
    ///
    /// Returns `None` for unknown commands or missing required fields.
    fn into_command(self) -> Option<Command> {
        match self.command.to_lowercase().as_str() {
            "open" => Some(Command::Open {
                reservation: ReservationId(self.reservation?),
                total: self.amount?,
            }),
            "pay" => Some(Command::Pay {
                reservation: ReservationId(self.reservation?),
                amount: self.amount?,
                date: self.date?,
            }),
            "void" => Some(Command::Void {
                payment: PaymentId(self.payment?),
            }),
            "delete" => Some(Command::Delete {
                payment: PaymentId(self.payment?),
            }),
            _ => None,
        }
    }
}

fn apply(service: &LedgerService, command: Command) -> Result<(), LedgerError> {
    match command {
        Command::Open { reservation, total } => {
            service.open_reservation(reservation, total)?;
        }
        Command::Pay {
            reservation,
            amount,
            date,
        } => {
            service.record_payment(reservation, amount, date, None)?;
        }
        Command::Void { payment } => {
            service.void_payment(payment)?;
        }
        Command::Delete { payment } => {
            service.delete_payment(payment)?;
        }
    }
    Ok(())
}

/// Replays ledger commands from a CSV reader.
///
/// Rows are streamed and ledger events are drained after every row, so
/// arbitrarily large files are fine. Malformed rows and rejected commands
/// are logged and skipped.
///
/// # CSV Format
///
/// Expected columns: `type, reservation, payment, amount, date`
/// - `open`: `reservation` and `amount` (the reservation total)
/// - `pay`: `reservation`, `amount` and `date` (`YYYY-MM-DD`)
/// - `void` / `delete`: `payment`, an ID assigned by an earlier `pay` (IDs start at 1)
///
/// # Example
///
/// ```csv
/// type,reservation,payment,amount,date
/// open,1,,1000,
/// pay,1,,600,2024-03-01
/// void,,1,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails.
pub fn process_commands<R: Read>(
    reader: R,
    config: LedgerConfig,
) -> Result<LedgerService, csv::Error> {
    let service = LedgerService::with_config(config);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(line = line + 2, error = %e, "skipping malformed row");
                continue;
            }
        };

        let Some(command) = record.into_command() else {
            warn!(line = line + 2, "skipping invalid command");
            continue;
        };

        debug!(line = line + 2, ?command, "applying command");
        if let Err(e) = apply(&service, command) {
            warn!(line = line + 2, error = %e, "command rejected");
        }

        // Nothing downstream consumes the outbox; keep it from growing.
        for event in service.drain_events() {
            trace!(line = line + 2, ?event, "ledger event");
        }
    }

    Ok(service)
}

/// Output row for one payment.
#[derive(Debug, serde::Serialize)]
struct PaymentRow {
    id: PaymentId,
    reservation: ReservationId,
    date: NaiveDate,
    amount: Decimal,
    percentage: Decimal,
    remaining: Decimal,
    voided: bool,
    has_receipt: bool,
}

/// Writes every payment, grouped by reservation in recording order.
///
/// # CSV Format
///
/// Columns: `id, reservation, date, amount, percentage, remaining, voided, has_receipt`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_payments<W: Write>(service: &LedgerService, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for reservation in service.store().reservation_ids() {
        let Ok(payments) = service.payments(reservation) else {
            continue;
        };
        for payment in payments {
            // Same shape as the Payment JSON serialization, flattened for CSV.
            wtr.serialize(PaymentRow {
                id: payment.id(),
                reservation: payment.reservation_id(),
                date: payment.date(),
                amount: payment.amount().round_dp(4),
                percentage: payment.percentage_of_total(),
                remaining: payment.remaining_balance().round_dp(4),
                voided: payment.voided(),
                has_receipt: payment.receipt().is_some(),
            })?;
        }
    }

    wtr.flush()?;
    Ok(())
}
