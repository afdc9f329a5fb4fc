// Copyright 2025 porter contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use snafu::Snafu;

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;
pub const TIB: u64 = GIB * 1024;

/// Error returned when parsing a size string fails.
#[derive(Debug, Snafu)]
#[snafu(display("invalid size string {input:?}: {reason}"))]
pub struct ParseReadableSizeError {
    pub input:  String,
    pub reason: String,
}

/// A byte count that formats and parses in human-readable units
/// (`512KiB`, `20MiB`, `3.9GiB`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadableSize(pub u64);

impl ReadableSize {
    #[must_use]
    pub const fn kb(count: u64) -> Self { Self(count * KIB) }

    #[must_use]
    pub const fn mb(count: u64) -> Self { Self(count * MIB) }

    #[must_use]
    pub const fn gb(count: u64) -> Self { Self(count * GIB) }

    #[must_use]
    pub const fn as_bytes(self) -> u64 { self.0 }

    /// Bytes expressed in whole mebibytes, rounding down.
    #[must_use]
    pub const fn as_mb(self) -> u64 { self.0 / MIB }
}

impl From<u64> for ReadableSize {
    fn from(bytes: u64) -> Self { Self(bytes) }
}

impl fmt::Display for ReadableSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        let (unit, suffix) = if bytes >= TIB {
            (TIB, "TiB")
        } else if bytes >= GIB {
            (GIB, "GiB")
        } else if bytes >= MIB {
            (MIB, "MiB")
        } else if bytes >= KIB {
            (KIB, "KiB")
        } else {
            return write!(f, "{bytes}B");
        };

        if bytes % unit == 0 {
            write!(f, "{}{}", bytes / unit, suffix)
        } else {
            #[allow(clippy::cast_precision_loss)]
            write!(f, "{:.1}{}", bytes as f64 / unit as f64, suffix)
        }
    }
}

impl FromStr for ReadableSize {
    type Err = ParseReadableSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = |reason: &str| ParseReadableSizeError {
            input:  s.to_string(),
            reason: reason.to_string(),
        };

        let digits_end = trimmed
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(digits_end);
        let value: f64 = number.parse().map_err(|_| err("expected a number"))?;
        if value < 0.0 {
            return Err(err("size cannot be negative"));
        }

        let multiplier = match unit.trim() {
            "" | "B" => 1,
            "K" | "KB" | "KiB" => KIB,
            "M" | "MB" | "MiB" => MIB,
            "G" | "GB" | "GiB" => GIB,
            "T" | "TB" | "TiB" => TIB,
            _ => return Err(err("unknown unit")),
        };

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Self((value * multiplier as f64).round() as u64))
    }
}

impl Serialize for ReadableSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReadableSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
