//! Field-level checks for incoming send requests.

use algo_transfer_types::{MAX_TRANSFER_ALGO, SendTransactionRequest, ValidationIssue};

use crate::algod::ChainClient;

/// Check every field and report all problems at once.
pub fn validate_send(
    req: &SendTransactionRequest,
    chain: &dyn ChainClient,
    min_amount: f64,
) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if req.from_mnemonic.trim().is_empty() {
        issues.push(ValidationIssue::new("fromMnemonic", "Mnemonic is required"));
    } else if chain.recover_signer(&req.from_mnemonic).is_err() {
        issues.push(ValidationIssue::new("fromMnemonic", "Invalid mnemonic format"));
    }

    if req.to_address.is_empty() {
        issues.push(ValidationIssue::new("toAddress", "Recipient address is required"));
    } else if !chain.validate_address(&req.to_address) {
        issues.push(ValidationIssue::new(
            "toAddress",
            "Invalid Algorand address format",
        ));
    }

    if !req.amount.is_finite() || req.amount <= 0.0 {
        issues.push(ValidationIssue::new("amount", "Amount must be positive"));
    } else if req.amount > MAX_TRANSFER_ALGO {
        issues.push(ValidationIssue::new(
            "amount",
            format!("Maximum amount is {} ALGO", MAX_TRANSFER_ALGO),
        ));
    } else if req.amount < min_amount {
        issues.push(ValidationIssue::new(
            "amount",
            format!("Minimum amount is {} ALGO", min_amount),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
