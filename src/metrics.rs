//! Metric table — the fixed set of values published per circuit.
//!
//! Each descriptor names a circuit field, how to convert it, where it is
//! published and how Home Assistant should present it.

use std::fmt;

use crate::chaos::Circuit;

/// Circuit field a metric is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceField {
    QuotaRemaining,
    QuotaMonthly,
    RxRate,
    TxRate,
    Postcode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Integer pass-through.
    Integer,
    /// Float pass-through.
    Float,
    /// Bytes to GB (10^9), 3 decimals.
    Gigabytes,
    /// Bits per second to Mbit/s (10^6), 3 decimals.
    Megabits,
    /// Human readable decimal size, e.g. `5 GB`.
    Human,
    /// String pass-through, trimmed.
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub topic: &'static str,
    pub field: SourceField,
    pub conversion: Conversion,
    pub unit: &'static str,
    pub icon: &'static str,
}

const fn metric(
    name: &'static str,
    topic: &'static str,
    field: SourceField,
    conversion: Conversion,
    unit: &'static str,
    icon: &'static str,
) -> MetricDescriptor {
    MetricDescriptor { name, topic, field, conversion, unit, icon }
}

const GAUGE: &str = "mdi:gauge";
const SPEEDOMETER: &str = "mdi:speedometer";

pub static METRICS: &[MetricDescriptor] = &[
    metric("quota_remaining", "quota/remaining", SourceField::QuotaRemaining, Conversion::Integer, "B", GAUGE),
    metric("quota_remaining_gb", "quota/remaining/gb", SourceField::QuotaRemaining, Conversion::Gigabytes, "GB", GAUGE),
    metric("quota_remaining_human", "quota/remaining/human", SourceField::QuotaRemaining, Conversion::Human, "", GAUGE),
    metric("quota_monthly", "quota/monthly", SourceField::QuotaMonthly, Conversion::Integer, "B", GAUGE),
    metric("quota_monthly_gb", "quota/monthly/gb", SourceField::QuotaMonthly, Conversion::Gigabytes, "GB", GAUGE),
    metric("quota_monthly_human", "quota/monthly/human", SourceField::QuotaMonthly, Conversion::Human, "", GAUGE),
    metric("syncrate_up", "syncrate/up", SourceField::RxRate, Conversion::Float, "bit/s", SPEEDOMETER),
    metric("syncrate_up_mbps", "syncrate/up/mb", SourceField::RxRate, Conversion::Megabits, "Mbit/s", SPEEDOMETER),
    metric("syncrate_up_human", "syncrate/up/human", SourceField::RxRate, Conversion::Human, "", SPEEDOMETER),
    metric("syncrate_down", "syncrate/down", SourceField::TxRate, Conversion::Float, "bit/s", SPEEDOMETER),
    metric("syncrate_down_mbps", "syncrate/down/mb", SourceField::TxRate, Conversion::Megabits, "Mbit/s", SPEEDOMETER),
    metric("syncrate_down_human", "syncrate/down/human", SourceField::TxRate, Conversion::Human, "", SPEEDOMETER),
    metric("postcode", "postcode", SourceField::Postcode, Conversion::Text, "", "mdi:tag-text"),
];

/// A converted value, rendered as the message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Integer(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{v}"),
            MetricValue::Float(v) => f.write_str(&format_float(*v)),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

/// Raw field value before conversion.
#[derive(Debug, Clone, Copy)]
enum RawField<'a> {
    Integer(u64),
    Float(f64),
    Text(&'a str),
}

impl SourceField {
    fn read(self, circuit: &Circuit) -> RawField<'_> {
        match self {
            SourceField::QuotaRemaining => RawField::Integer(circuit.quota_remaining),
            SourceField::QuotaMonthly => RawField::Integer(circuit.quota_monthly),
            SourceField::RxRate => RawField::Float(circuit.rx_rate),
            SourceField::TxRate => RawField::Float(circuit.tx_rate),
            SourceField::Postcode => RawField::Text(&circuit.postcode),
        }
    }
}

impl Conversion {
    fn apply(self, raw: RawField<'_>) -> MetricValue {
        let whole = match raw {
            RawField::Integer(v) => v,
            // Rates are whole bit/s; truncate as integer conversions do.
            RawField::Float(v) => v as u64,
            RawField::Text(s) => return MetricValue::Text(s.trim().to_string()),
        };
        match self {
            Conversion::Integer => MetricValue::Integer(whole),
            Conversion::Float => MetricValue::Float(match raw {
                RawField::Float(v) => v,
                _ => whole as f64,
            }),
            Conversion::Gigabytes => MetricValue::Float(bytes_to_gigabytes(whole)),
            Conversion::Megabits => MetricValue::Float(bits_to_megabits(whole)),
            Conversion::Human => MetricValue::Text(human_size(whole)),
            Conversion::Text => MetricValue::Text(whole.to_string()),
        }
    }
}

impl MetricDescriptor {
    /// Convert this metric's source field of `circuit`.
    pub fn format(&self, circuit: &Circuit) -> MetricValue {
        self.conversion.apply(self.field.read(circuit))
    }
}

/// Round to 3 decimals from the exact binary value, so `1.2345` (stored
/// just below) becomes `1.234`.
fn round3(value: f64) -> f64 {
    format!("{value:.3}").parse().unwrap_or(value)
}

pub fn bytes_to_gigabytes(bytes: u64) -> f64 {
    round3(bytes as f64 / 1e9)
}

pub fn bits_to_megabits(bits_per_sec: u64) -> f64 {
    round3(bits_per_sec as f64 / 1e6)
}

const SIZE_UNITS: [&str; 8] = ["KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Decimal (powers of 1000) human readable size: `999 bytes`, `1.23 MB`.
pub fn human_size(bytes: u64) -> String {
    for (i, unit) in SIZE_UNITS.iter().enumerate().rev() {
        let divider = 1000f64.powi(i as i32 + 1);
        if bytes as f64 >= divider {
            let text = format!("{:.2}", bytes as f64 / divider);
            let text = text.trim_end_matches('0').trim_end_matches('.');
            return format!("{text} {unit}");
        }
    }
    if bytes == 1 {
        "1 byte".to_string()
    } else {
        format!("{bytes} bytes")
    }
}

/// Shortest round-trip form, always with a fractional part (`5.0`).
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaos::tests::sample_circuit;

    fn payload(name: &str, circuit: &Circuit) -> String {
        METRICS
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.format(circuit).to_string())
            .unwrap_or_else(|| panic!("no metric named {name}"))
    }

    #[test]
    fn test_table_names_unique() {
        let mut names: Vec<&str> = METRICS.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), METRICS.len());
        assert_eq!(METRICS.len(), 13);
    }

    #[test]
    fn test_quota_metrics() {
        let circuit = sample_circuit();
        assert_eq!(payload("quota_remaining", &circuit), "5000000000");
        assert_eq!(payload("quota_remaining_gb", &circuit), "5.0");
        assert_eq!(payload("quota_remaining_human", &circuit), "5 GB");
        assert_eq!(payload("quota_monthly", &circuit), "200000000000");
        assert_eq!(payload("quota_monthly_gb", &circuit), "200.0");
        assert_eq!(payload("quota_monthly_human", &circuit), "200 GB");
    }

    #[test]
    fn test_syncrate_metrics() {
        let circuit = sample_circuit();
        assert_eq!(payload("syncrate_up", &circuit), "20000000.0");
        assert_eq!(payload("syncrate_up_mbps", &circuit), "20.0");
        assert_eq!(payload("syncrate_up_human", &circuit), "20 MB");
        assert_eq!(payload("syncrate_down", &circuit), "80000000.0");
        assert_eq!(payload("syncrate_down_mbps", &circuit), "80.0");
        assert_eq!(payload("syncrate_down_human", &circuit), "80 MB");
    }

    #[test]
    fn test_postcode_trimmed() {
        let mut circuit = sample_circuit();
        circuit.postcode = " SW1A 1AA \n".to_string();
        assert_eq!(payload("postcode", &circuit), "SW1A 1AA");
    }

    #[test]
    fn test_gigabytes_rounding() {
        assert_eq!(bytes_to_gigabytes(5_000_000_000), 5.0);
        assert_eq!(bytes_to_gigabytes(123_456_789_012), 123.457);
        assert_eq!(bytes_to_gigabytes(0), 0.0);
        assert_eq!(bytes_to_gigabytes(1_499_999), 0.001);
    }

    #[test]
    fn test_gigabytes_rounding_ties() {
        assert_eq!(bytes_to_gigabytes(1_234_500_000), 1.234);
        assert_eq!(bytes_to_gigabytes(4_500_000), 0.004);
        let mut circuit = sample_circuit();
        circuit.quota_remaining = 1_234_500_000;
        assert_eq!(payload("quota_remaining_gb", &circuit), "1.234");
    }

    #[test]
    fn test_megabits_rounding() {
        assert_eq!(bits_to_megabits(80_000_000), 80.0);
        assert_eq!(bits_to_megabits(72_123_456), 72.123);
        assert_eq!(bits_to_megabits(1_234_567), 1.235);
    }

    #[test]
    fn test_megabits_rounding_ties() {
        assert_eq!(bits_to_megabits(1_234_500), 1.234);
        assert_eq!(bits_to_megabits(4_500), 0.004);
        let mut circuit = sample_circuit();
        circuit.tx_rate = 1_234_500.0;
        assert_eq!(payload("syncrate_down_mbps", &circuit), "1.234");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 bytes");
        assert_eq!(human_size(1), "1 byte");
        assert_eq!(human_size(999), "999 bytes");
        assert_eq!(human_size(1000), "1 KB");
        assert_eq!(human_size(1_234_567), "1.23 MB");
        assert_eq!(human_size(10_500_000), "10.5 MB");
        assert_eq!(human_size(5_000_000_000), "5 GB");
        assert_eq!(human_size(100_000_000_000_000), "100 TB");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(5.0), "5.0");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(72.123), "72.123");
        assert_eq!(format_float(1_700_000_000.25), "1700000000.25");
    }

    #[test]
    fn test_fractional_rate_truncated_for_derived_values() {
        let mut circuit = sample_circuit();
        circuit.rx_rate = 1_999_999.9;
        assert_eq!(payload("syncrate_up", &circuit), "1999999.9");
        assert_eq!(payload("syncrate_up_mbps", &circuit), "2.0");
        assert_eq!(payload("syncrate_up_human", &circuit), "2 MB");
    }
}
