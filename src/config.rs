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

//! Ledger configuration.
//!
//! Defaults reproduce the reference behaviour: a first payment must cover
//! at least half of the total, and neither voiding nor deleting a payment
//! touches the reservation status.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// What happens to the reservation status when a payment stops counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Status stays as it was; only new payments move it.
    #[default]
    Keep,
    /// Status is derived again from the remaining active payments.
    Recompute,
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "recompute" => Ok(Self::Recompute),
            other => Err(format!("unknown status policy '{other}' (expected keep|recompute)")),
        }
    }
}

/// Errors loading a configuration file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("minimum first payment must be within 0..=100, got {0}")]
    MinimumOutOfRange(Decimal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Share of the total (in percent) the first active payment must cover.
    /// Accepted as a JSON string or number.
    #[serde(deserialize_with = "decimal_from_string_or_number")]
    pub minimum_first_payment_percentage: Decimal,
    pub status_on_void: StatusPolicy,
    pub status_on_delete: StatusPolicy,
}

impl LedgerConfig {
    pub const DEFAULT_MINIMUM_FIRST_PAYMENT: Decimal = dec!(50);

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        let minimum = self.minimum_first_payment_percentage;
        if minimum < Decimal::ZERO || minimum > Decimal::ONE_HUNDRED {
            return Err(ConfigError::MinimumOutOfRange(minimum));
        }
        Ok(self)
    }
}

/// Reads a decimal written either as `"30.5"` or as `30.5`.
///
/// Numbers go through their shortest text form, so `0.1` stays `0.1`.
fn decimal_from_string_or_number<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDecimal {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    match RawDecimal::deserialize(deserializer)? {
        RawDecimal::Text(text) => Decimal::from_str(text.trim()).map_err(de::Error::custom),
        RawDecimal::Integer(value) => Ok(Decimal::from(value)),
        RawDecimal::Float(value) => {
            Decimal::from_str(&value.to_string()).map_err(de::Error::custom)
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            minimum_first_payment_percentage: Self::DEFAULT_MINIMUM_FIRST_PAYMENT,
            status_on_void: StatusPolicy::Keep,
            status_on_delete: StatusPolicy::Keep,
        }
    }
}
