//! Column layout of the credit-card transaction table.

/// Feature columns in file order: time offset, 28 anonymized principal
/// components, monetary amount.
pub const FEATURE_COLUMNS: [&str; 30] = [
    "Time", "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10", "V11", "V12", "V13",
    "V14", "V15", "V16", "V17", "V18", "V19", "V20", "V21", "V22", "V23", "V24", "V25", "V26",
    "V27", "V28", "Amount",
];

/// Binary label column, last in the file.
pub const LABEL_COLUMN: &str = "Class";

pub const TIME_COLUMN: &str = "Time";
pub const AMOUNT_COLUMN: &str = "Amount";

/// Total number of columns in a transaction file (features + label).
pub const N_COLUMNS: usize = FEATURE_COLUMNS.len() + 1;

/// Full expected header, label included.
pub fn expected_header() -> Vec<String> {
    FEATURE_COLUMNS
        .iter()
        .chain(std::iter::once(&LABEL_COLUMN))
        .map(|c| c.to_string())
        .collect()
}

/// Feature column names as owned strings.
pub fn feature_columns() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}
