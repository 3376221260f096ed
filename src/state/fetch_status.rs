use std::fmt;

/// Outcome of extracting one item detail page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    /// Every expected field was found
    Ok,

    /// The page was fetched but some fields were missing or malformed
    Partial,

    /// The page could not be fetched at all
    Failed,
}

impl FetchStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_db_string() {
        for status in [FetchStatus::Ok, FetchStatus::Partial, FetchStatus::Failed] {
            assert_eq!(FetchStatus::from_db_string(status.to_db_string()), Some(status));
        }
        assert_eq!(FetchStatus::from_db_string("unknown"), None);
    }

    #[test]
    fn test_is_failed() {
        assert!(FetchStatus::Failed.is_failed());
        assert!(!FetchStatus::Partial.is_failed());
        assert!(!FetchStatus::Ok.is_failed());
    }
}
