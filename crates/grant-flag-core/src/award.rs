use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Award as delivered by the awards API or stored in the cache.
///
/// Every field is kept as text; numeric JSON values are stringified and
/// missing or `null` fields become empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAward {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub agency: String,
    #[serde(deserialize_with = "lenient_string")]
    pub awardee_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub abstract_text: String,
    #[serde(deserialize_with = "lenient_string")]
    pub funds_obligated_amt: String,
    #[serde(deserialize_with = "lenient_string")]
    pub estimated_total_amt: String,
    #[serde(rename = "pdPIName", deserialize_with = "lenient_string")]
    pub pd_pi_name: String,
    #[serde(rename = "coPDPI", deserialize_with = "lenient_string")]
    pub co_pdpi: String,
    #[serde(deserialize_with = "lenient_string")]
    pub po_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub start_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub exp_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub primary_program: String,
}

impl RawAward {
    /// Field names in API order; also the CSV header row and the `printFields` list.
    pub const FIELDS: [&'static str; 13] = [
        "id",
        "agency",
        "awardeeName",
        "title",
        "abstractText",
        "fundsObligatedAmt",
        "estimatedTotalAmt",
        "pdPIName",
        "coPDPI",
        "poName",
        "startDate",
        "expDate",
        "primaryProgram",
    ];

    /// Build an award from a CSV row, looking columns up by header name.
    ///
    /// Unknown columns are ignored and absent ones stay empty. Values are taken
    /// verbatim so identifiers with leading zeros survive.
    pub fn from_csv_record(headers: &csv::StringRecord, record: &csv::StringRecord) -> Self {
        let mut award = Self::default();
        for (header, value) in headers.iter().zip(record.iter()) {
            if let Some(slot) = award.field_mut(header.trim()) {
                *slot = value.to_string();
            }
        }
        award
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        let slot = match name {
            "id" => &mut self.id,
            "agency" => &mut self.agency,
            "awardeeName" => &mut self.awardee_name,
            "title" => &mut self.title,
            "abstractText" => &mut self.abstract_text,
            "fundsObligatedAmt" => &mut self.funds_obligated_amt,
            "estimatedTotalAmt" => &mut self.estimated_total_amt,
            "pdPIName" => &mut self.pd_pi_name,
            "coPDPI" => &mut self.co_pdpi,
            "poName" => &mut self.po_name,
            "startDate" => &mut self.start_date,
            "expDate" => &mut self.exp_date,
            "primaryProgram" => &mut self.primary_program,
            _ => return None,
        };
        Some(slot)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientVisitor;

    impl<'de> de::Visitor<'de> for LenientVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string, number, boolean or null")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(LenientVisitor)
}

/// Which raw amount column feeds [`AwardRecord::funding`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingField {
    /// `fundsObligatedAmt`
    #[default]
    Obligated,
    /// `estimatedTotalAmt`
    Estimated,
}

impl FundingField {
    fn select<'a>(&self, raw: &'a RawAward) -> &'a str {
        match self {
            Self::Obligated => &raw.funds_obligated_amt,
            Self::Estimated => &raw.estimated_total_amt,
        }
    }
}

impl FromStr for FundingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "obligated" => Ok(Self::Obligated),
            "estimated" | "estimated-total" => Ok(Self::Estimated),
            other => Err(format!(
                "unknown funding field `{other}` (expected `obligated` or `estimated`)"
            )),
        }
    }
}

/// Secondary award attributes carried through for display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardDetails {
    pub agency: String,
    pub pi_name: String,
    pub co_pi: String,
    pub program_officer: String,
    pub start_date: String,
    pub end_date: String,
    pub program: String,
}

/// Normalized award used by the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardRecord {
    /// Position in the source sequence (0-based); breaks funding ties.
    pub ordinal: usize,
    pub id: String,
    pub title: String,
    pub awardee: String,
    pub abstract_text: String,
    pub funding: Decimal,
    pub details: AwardDetails,
}

impl AwardRecord {
    /// Normalize a raw award. Never fails: bad amounts become zero.
    pub fn from_raw(ordinal: usize, raw: RawAward, funding_field: FundingField) -> Self {
        let funding = parse_amount(funding_field.select(&raw));
        Self {
            ordinal,
            id: raw.id,
            title: raw.title,
            awardee: raw.awardee_name,
            abstract_text: raw.abstract_text,
            funding,
            details: AwardDetails {
                agency: raw.agency,
                pi_name: raw.pd_pi_name,
                co_pi: raw.co_pdpi,
                program_officer: raw.po_name,
                start_date: raw.start_date,
                end_date: raw.exp_date,
                program: raw.primary_program,
            },
        }
    }

    /// Normalize a whole source sequence, numbering records in order.
    pub fn ingest(raws: Vec<RawAward>, funding_field: FundingField) -> Vec<Self> {
        raws.into_iter()
            .enumerate()
            .map(|(ordinal, raw)| Self::from_raw(ordinal, raw, funding_field))
            .collect()
    }
}

/// Largest amount, in whole dollars, accepted for a single award.
pub const MAX_AMOUNT_DOLLARS: i64 = 1_000_000_000_000;

/// Parse a numeric-like amount field into a non-negative decimal.
///
/// Accepts plain and scientific notation, a leading `$` and thousands
/// separators. Anything else, negative values and amounts above
/// [`MAX_AMOUNT_DOLLARS`] yield zero.
pub fn parse_amount(raw: &str) -> Decimal {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    let parsed = Decimal::from_str(&cleaned).or_else(|_| Decimal::from_scientific(&cleaned));
    match parsed {
        Ok(value) if value.is_sign_negative() || value > Decimal::from(MAX_AMOUNT_DOLLARS) => {
            Decimal::ZERO
        }
        Ok(value) => value.normalize(),
        Err(_) => Decimal::ZERO,
    }
}
