use serde::{Deserialize, Serialize};

/// One scalar signal reading
pub type Sample = f32;

/// A downsampled point appended to the display window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    /// Monotonic counter, one per appended point
    pub index: u64,
    pub value: Sample,
}

impl DisplayPoint {
    pub fn new(index: u64, value: Sample) -> Self {
        Self { index, value }
    }
}

/// A single persisted `(sequence_number, value)` row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub sequence_number: u64,
    pub value: Sample,
}

impl Record {
    pub const HEADER: &'static str = "SampleNumber,ECG_Value";

    pub fn new(sequence_number: u64, value: Sample) -> Self {
        Self {
            sequence_number,
            value,
        }
    }

    /// CSV line without the trailing newline
    pub fn to_csv_line(&self) -> String {
        format!("{},{:?}", self.sequence_number, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_csv_line() {
        assert_eq!(Record::new(0, 0.0).to_csv_line(), "0,0.0");
        assert_eq!(Record::new(7, -1.0).to_csv_line(), "7,-1.0");
        assert_eq!(Record::new(12, 0.5).to_csv_line(), "12,0.5");
    }
}
