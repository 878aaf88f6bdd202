//! Firmware version code parsing and normalization.
//!
//! A [`VersionCode`] always normalizes to exactly four `/`-separated parts
//! (`PDA/CSC/MODEM/BOOTLOADER`), matching the four-part strings devices and
//! FUS both speak, even though upstream servers sometimes report only three.

use std::fmt;

/// A normalized four-part firmware version code (`AAA/BBB/CCC/DDD`).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct VersionCode {
    parts: [String; 4],
}

impl VersionCode {
    /// Parses and normalizes a version code.
    ///
    /// Accepts both the full four-part form and the three-part form FOTA
    /// sometimes reports. Normalization rules:
    ///
    /// - three parts: the fourth part duplicates the first.
    /// - an empty third part is replaced by the first part.
    ///
    /// Any other number of parts is rejected.
    pub fn normalize(raw: &str) -> Option<Self> {
        let raw_parts: Vec<&str> = raw.split('/').collect();

        let mut parts = match raw_parts.len() {
            4 => [
                raw_parts[0].to_string(),
                raw_parts[1].to_string(),
                raw_parts[2].to_string(),
                raw_parts[3].to_string(),
            ],
            3 => [
                raw_parts[0].to_string(),
                raw_parts[1].to_string(),
                raw_parts[2].to_string(),
                raw_parts[0].to_string(),
            ],
            _ => return None,
        };

        if parts[2].is_empty() {
            parts[2] = parts[0].clone();
        }

        Some(Self { parts })
    }

    /// The leading (PDA) segment.
    pub fn pda(&self) -> &str {
        &self.parts[0]
    }

    /// The CSC segment.
    pub fn csc(&self) -> &str {
        &self.parts[1]
    }

    /// The modem segment.
    pub fn modem(&self) -> &str {
        &self.parts[2]
    }

    /// The bootloader segment.
    pub fn bootloader(&self) -> &str {
        &self.parts[3]
    }

    /// Returns the canonical `AAA/BBB/CCC/DDD` string form.
    pub fn as_str(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VersionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.parts[0], self.parts[1], self.parts[2], self.parts[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_part_passes_through() {
        let v = VersionCode::normalize("A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3/A146PXXS6CXK3").unwrap();
        assert_eq!(v.as_str(), "A146PXXS6CXK3/A146POXM6CXK3/A146PXXS6CXK3/A146PXXS6CXK3");
    }

    #[test]
    fn three_part_duplicates_first_as_fourth() {
        let v = VersionCode::normalize("AAA/BBB/CCC").unwrap();
        assert_eq!(v.as_str(), "AAA/BBB/CCC/AAA");
    }

    #[test]
    fn empty_third_segment_is_replaced_by_first() {
        let v = VersionCode::normalize("AAA/BBB//DDD").unwrap();
        assert_eq!(v.as_str(), "AAA/BBB/AAA/DDD");
    }

    #[test]
    fn rejects_wrong_segment_counts() {
        assert!(VersionCode::normalize("AAA/BBB").is_none());
        assert!(VersionCode::normalize("AAA/BBB/CCC/DDD/EEE").is_none());
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = VersionCode::normalize("AAA/BBB//DDD").unwrap();
        let twice = VersionCode::normalize(&once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalized_form_has_exactly_three_separators_and_nonempty_third() {
        let v = VersionCode::normalize("AAA/BBB/CCC").unwrap();
        let s = v.as_str();
        assert_eq!(s.matches('/').count(), 3);
        assert!(!v.modem().is_empty());
    }
}
