//! Bank transfer entity and proof-of-payment lifecycle.
//!
//! A bank transfer starts `pending`, becomes `submitted` once the user
//! uploads a proof file, and ends `approved` or `rejected` after an admin
//! review. Reviewed transfers are immutable.

use serde::{Deserialize, Serialize};

/// Accepted proof file extensions.
const ALLOWED_PROOF_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "pdf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankTransferStatus {
    Pending,
    Submitted,
    Approved,
    Rejected,
}

impl BankTransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankTransferStatus::Pending => "pending",
            BankTransferStatus::Submitted => "submitted",
            BankTransferStatus::Approved => "approved",
            BankTransferStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BankTransferStatus::Pending),
            "submitted" => Some(BankTransferStatus::Submitted),
            "approved" => Some(BankTransferStatus::Approved),
            "rejected" => Some(BankTransferStatus::Rejected),
            _ => None,
        }
    }

    /// Whether a proof may still be attached or replaced.
    pub fn accepts_proof(&self) -> bool {
        matches!(
            self,
            BankTransferStatus::Pending | BankTransferStatus::Submitted
        )
    }

    /// Whether an admin can still review this transfer.
    pub fn reviewable(&self) -> bool {
        matches!(self, BankTransferStatus::Submitted)
    }
}

impl std::fmt::Display for BankTransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extract and validate the extension of an uploaded proof file name.
pub fn validate_proof_filename(filename: &str) -> Result<String, String> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .ok_or_else(|| "Proof file must have an extension".to_string())?;
    if ALLOWED_PROOF_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(format!("Proof file type .{} is not accepted", ext))
    }
}

/// Reject proof uploads above the configured size cap.
pub fn validate_proof_size(len: usize, max_bytes: usize) -> Result<(), String> {
    if len == 0 {
        return Err("Proof file is empty".to_string());
    }
    if len > max_bytes {
        return Err(format!(
            "Proof file too large: {} bytes (maximum: {})",
            len, max_bytes
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            BankTransferStatus::Pending,
            BankTransferStatus::Submitted,
            BankTransferStatus::Approved,
            BankTransferStatus::Rejected,
        ] {
            assert_eq!(BankTransferStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_accepts_proof() {
        assert!(BankTransferStatus::Pending.accepts_proof());
        assert!(BankTransferStatus::Submitted.accepts_proof());
        assert!(!BankTransferStatus::Approved.accepts_proof());
        assert!(!BankTransferStatus::Rejected.accepts_proof());
    }

    #[test]
    fn test_reviewable_only_when_submitted() {
        assert!(BankTransferStatus::Submitted.reviewable());
        assert!(!BankTransferStatus::Pending.reviewable());
        assert!(!BankTransferStatus::Approved.reviewable());
    }

    #[test]
    fn test_proof_filename_accepted() {
        assert_eq!(validate_proof_filename("receipt.PDF").unwrap(), "pdf");
        assert_eq!(validate_proof_filename("scan.jpeg").unwrap(), "jpeg");
    }

    #[test]
    fn test_proof_filename_rejected() {
        assert!(validate_proof_filename("run.exe").is_err());
        assert!(validate_proof_filename("noextension").is_err());
    }

    #[test]
    fn test_proof_size_limits() {
        assert!(validate_proof_size(1024, 2048).is_ok());
        assert!(validate_proof_size(0, 2048).is_err());
        assert!(validate_proof_size(4096, 2048).is_err());
    }
}
