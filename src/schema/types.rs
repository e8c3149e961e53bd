// src/schema/types.rs

use arrow::datatypes::DataType;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Semantic type of a rating-file column.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Categorical,
    Date,
    Text,
}

impl ColumnKind {
    /// Arrow storage type for a column of this kind.
    pub fn arrow_type(self) -> DataType {
        match self {
            ColumnKind::Integer => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::Date => DataType::Date32,
            ColumnKind::Categorical | ColumnKind::Text => DataType::Utf8,
        }
    }
}

/// Declared column set of the MachineLearningRating_v3 feed.
///
/// Columns present in a file but not listed here are left untouched by the
/// cleaning pass; listed columns missing from a file are skipped with a
/// warning.
pub static RATING_COLUMNS: &[(&str, ColumnKind)] = &[
    ("UnderwrittenCoverID", ColumnKind::Integer),
    ("PolicyID", ColumnKind::Integer),
    ("TransactionMonth", ColumnKind::Date),
    ("IsVATRegistered", ColumnKind::Boolean),
    ("Citizenship", ColumnKind::Categorical),
    ("LegalType", ColumnKind::Categorical),
    ("Title", ColumnKind::Categorical),
    ("Language", ColumnKind::Categorical),
    ("Bank", ColumnKind::Categorical),
    ("AccountType", ColumnKind::Categorical),
    ("MaritalStatus", ColumnKind::Categorical),
    ("Gender", ColumnKind::Categorical),
    ("Country", ColumnKind::Categorical),
    ("Province", ColumnKind::Categorical),
    ("PostalCode", ColumnKind::Integer),
    ("MainCrestaZone", ColumnKind::Categorical),
    ("SubCrestaZone", ColumnKind::Categorical),
    ("ItemType", ColumnKind::Categorical),
    ("mmcode", ColumnKind::Integer),
    ("VehicleType", ColumnKind::Categorical),
    ("RegistrationYear", ColumnKind::Integer),
    ("make", ColumnKind::Categorical),
    ("Model", ColumnKind::Text),
    ("Cylinders", ColumnKind::Integer),
    ("cubiccapacity", ColumnKind::Float),
    ("kilowatts", ColumnKind::Float),
    ("bodytype", ColumnKind::Categorical),
    ("NumberOfDoors", ColumnKind::Integer),
    ("VehicleIntroDate", ColumnKind::Date),
    ("CustomValueEstimate", ColumnKind::Float),
    ("AlarmImmobiliser", ColumnKind::Boolean),
    ("TrackingDevice", ColumnKind::Boolean),
    ("CapitalOutstanding", ColumnKind::Float),
    ("NewVehicle", ColumnKind::Boolean),
    ("WrittenOff", ColumnKind::Boolean),
    ("Rebuilt", ColumnKind::Boolean),
    ("Converted", ColumnKind::Boolean),
    ("CrossBorder", ColumnKind::Boolean),
    ("NumberOfVehiclesInFleet", ColumnKind::Integer),
    ("SumInsured", ColumnKind::Float),
    ("TermFrequency", ColumnKind::Categorical),
    ("CalculatedPremiumPerTerm", ColumnKind::Float),
    ("ExcessSelected", ColumnKind::Text),
    ("CoverCategory", ColumnKind::Categorical),
    ("CoverType", ColumnKind::Categorical),
    ("CoverGroup", ColumnKind::Categorical),
    ("Section", ColumnKind::Categorical),
    ("Product", ColumnKind::Categorical),
    ("StatutoryClass", ColumnKind::Categorical),
    ("StatutoryRiskType", ColumnKind::Categorical),
    ("TotalPremium", ColumnKind::Float),
    ("TotalClaims", ColumnKind::Float),
];

static KIND_BY_NAME: Lazy<HashMap<&'static str, ColumnKind>> =
    Lazy::new(|| RATING_COLUMNS.iter().copied().collect());

/// Declared kind for `name`, if the column is part of the rating schema.
pub fn column_kind(name: &str) -> Option<ColumnKind> {
    KIND_BY_NAME.get(name).copied()
}

/// Arrow storage type for `name`, if mapped.
pub fn arrow_type_for(name: &str) -> Option<DataType> {
    column_kind(name).map(ColumnKind::arrow_type)
}

/// Header names with no entry in the rating schema.
pub fn unmapped_columns<'a>(headers: &'a [String]) -> Vec<&'a str> {
    headers
        .iter()
        .map(String::as_str)
        .filter(|h| column_kind(h).is_none())
        .collect()
}
