//! RFC 5321 subset address checks used before any address reaches the wire.

mod domain;
mod local;
mod types;

pub use types::{AddressError, NormalizedAddress, ValidationMode, ValidationReport};

pub(crate) use domain::normalize_domain;

use domain::check_domain;
use local::{is_local_relaxed, is_local_strict};

/// Rejects CR and LF anywhere in `line` (SMTP command injection guard).
pub fn check_line(line: &str) -> Result<(), AddressError> {
    if line.contains(['\r', '\n']) {
        return Err(AddressError::LineBreak);
    }
    Ok(())
}

pub fn validate_address(
    address: &str,
    mode: ValidationMode,
) -> Result<ValidationReport, AddressError> {
    check_line(address)?;
    let input = address.trim();
    if input.is_empty() {
        return Err(AddressError::Empty);
    }

    let mut reasons = Vec::new();

    if input.len() > 254 {
        reasons.push(format!("total length {} > 254", input.len()));
    }

    let Some((local, domain)) = input.rsplit_once('@') else {
        reasons.push("missing '@'".to_string());
        return Ok(ValidationReport { ok: false, reasons });
    };
    if mode == ValidationMode::Strict && local.contains('@') {
        reasons.push("must contain exactly one '@'".to_string());
    }

    if local.is_empty() || local.len() > 64 {
        reasons.push(format!(
            "local part length {} invalid (1..=64)",
            local.len()
        ));
    }

    check_domain(domain, mode, &mut reasons);

    let local_ok = match mode {
        ValidationMode::Strict => is_local_strict(local),
        ValidationMode::Relaxed => is_local_relaxed(local),
    };
    if !local_ok {
        reasons.push(match mode {
            ValidationMode::Strict => "invalid local part (strict rules)".into(),
            ValidationMode::Relaxed => "invalid local part (relaxed rules)".into(),
        });
    }

    let ok = reasons.is_empty();
    Ok(ValidationReport { ok, reasons })
}

/// Validates `address` and splits it into its local part and normalised
/// domain. The local part keeps its case.
pub fn normalize_address(
    address: &str,
    mode: ValidationMode,
) -> Result<NormalizedAddress, AddressError> {
    let report = validate_address(address, mode)?;
    let input = address.trim();
    let (local, domain) = input.rsplit_once('@').unwrap_or((input, ""));
    let (domain_lower, ascii_domain) = normalize_domain(domain);

    Ok(NormalizedAddress {
        original: address.to_string(),
        local: local.to_string(),
        domain: domain_lower,
        ascii_domain,
        mode,
        valid: report.ok,
        reasons: report.reasons,
    })
}
