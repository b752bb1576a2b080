//! # Loan Terms
//!
//! The borrower's offer: how much is borrowed, the premium paid on top at
//! repayment, which collateral token backs the loan and how much of it, and
//! how many days the lender waits for payback. Terms are supplied once, in
//! WAITING_FOR_DATA, and are immutable afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ethlend_core::{Address, Amount};

/// Upper bound on `days_to_lend`. Ten years.
pub const MAX_DAYS_TO_LEND: u32 = 3650;

/// Upper bound on the length of the token name.
pub const MAX_TOKEN_NAME_LEN: usize = 64;

/// Upper bound on the length of the info link.
pub const MAX_INFO_LINK_LEN: usize = 2048;

/// Malformed loan terms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TermsError {
    /// Nothing would be borrowed.
    #[error("loan amount must be positive")]
    ZeroLoanAmount,

    /// No collateral backs the loan.
    #[error("collateral token amount must be positive")]
    ZeroCollateral,

    /// The collateral token is unnamed.
    #[error("collateral token name must not be empty")]
    EmptyTokenName,

    /// The collateral token name is too long.
    #[error("collateral token name exceeds {max} characters")]
    TokenNameTooLong {
        /// Maximum accepted length.
        max: usize,
    },

    /// The info link is too long.
    #[error("info link exceeds {max} characters")]
    InfoLinkTooLong {
        /// Maximum accepted length.
        max: usize,
    },

    /// The payback window is outside `1..=MAX_DAYS_TO_LEND`.
    #[error("days to lend must be between 1 and {max}, got {days}")]
    DaysToLendOutOfRange {
        /// The rejected value.
        days: u32,
        /// Maximum accepted value.
        max: u32,
    },

    /// Principal plus premium does not fit in an amount.
    #[error("loan amount plus premium overflows")]
    RepaymentOverflow,
}

/// The collateral token: display name and the contract that issues it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralToken {
    /// Token name as shown to lenders.
    pub name: String,
    /// Token contract address.
    pub contract_address: Address,
}

/// The terms of a lending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Principal, in wei.
    pub loan_amount: Amount,
    /// Paid to the lender on top of the principal, in wei.
    pub premium: Amount,
    /// Collateral required, in token base units.
    pub collateral_token_amount: Amount,
    /// Which token is posted as collateral.
    pub collateral_token: CollateralToken,
    /// Free-form link describing the token or the borrower.
    pub info_link: String,
    /// Length of the payback window in days.
    pub days_to_lend: u32,
}

impl LoanTerms {
    /// Check the terms are well-formed.
    ///
    /// # Errors
    ///
    /// Returns the first [`TermsError`] found.
    pub fn validate(&self) -> Result<(), TermsError> {
        if self.loan_amount.is_zero() {
            return Err(TermsError::ZeroLoanAmount);
        }
        if self.collateral_token_amount.is_zero() {
            return Err(TermsError::ZeroCollateral);
        }
        let name = self.collateral_token.name.trim();
        if name.is_empty() {
            return Err(TermsError::EmptyTokenName);
        }
        if name.chars().count() > MAX_TOKEN_NAME_LEN {
            return Err(TermsError::TokenNameTooLong {
                max: MAX_TOKEN_NAME_LEN,
            });
        }
        if self.info_link.chars().count() > MAX_INFO_LINK_LEN {
            return Err(TermsError::InfoLinkTooLong {
                max: MAX_INFO_LINK_LEN,
            });
        }
        if self.days_to_lend == 0 || self.days_to_lend > MAX_DAYS_TO_LEND {
            return Err(TermsError::DaysToLendOutOfRange {
                days: self.days_to_lend,
                max: MAX_DAYS_TO_LEND,
            });
        }
        self.repayment_amount()?;
        Ok(())
    }

    /// Principal plus premium: the exact amount that settles the loan.
    pub fn repayment_amount(&self) -> Result<Amount, TermsError> {
        self.loan_amount
            .checked_add(self.premium)
            .map_err(|_| TermsError::RepaymentOverflow)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn token_contract() -> Address {
        Address::parse("0x1111111111111111111111111111111111111111").unwrap()
    }

    /// 1 ETH loan, 0.2 ETH premium, 10 tokens of collateral, 10 days.
    pub fn standard_terms() -> LoanTerms {
        LoanTerms {
            loan_amount: Amount::ether(1),
            premium: Amount::new(200_000_000_000_000_000),
            collateral_token_amount: Amount::new(10),
            collateral_token: CollateralToken {
                name: "Augur tokens".to_string(),
                contract_address: token_contract(),
            },
            info_link: "https://etherscan.io/token/REP".to_string(),
            days_to_lend: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::standard_terms;
    use super::*;

    #[test]
    fn standard_terms_are_valid() {
        assert!(standard_terms().validate().is_ok());
    }

    #[test]
    fn repayment_is_principal_plus_premium() {
        assert_eq!(
            standard_terms().repayment_amount().unwrap(),
            Amount::new(1_200_000_000_000_000_000)
        );
    }

    #[test]
    fn zero_days_rejected() {
        let mut terms = standard_terms();
        terms.days_to_lend = 0;
        assert_eq!(
            terms.validate(),
            Err(TermsError::DaysToLendOutOfRange {
                days: 0,
                max: MAX_DAYS_TO_LEND
            })
        );
    }

    #[test]
    fn excessive_days_rejected() {
        let mut terms = standard_terms();
        terms.days_to_lend = MAX_DAYS_TO_LEND + 1;
        assert!(matches!(
            terms.validate(),
            Err(TermsError::DaysToLendOutOfRange { .. })
        ));
    }

    #[test]
    fn zero_amounts_rejected() {
        let mut terms = standard_terms();
        terms.loan_amount = Amount::ZERO;
        assert_eq!(terms.validate(), Err(TermsError::ZeroLoanAmount));

        let mut terms = standard_terms();
        terms.collateral_token_amount = Amount::ZERO;
        assert_eq!(terms.validate(), Err(TermsError::ZeroCollateral));
    }

    #[test]
    fn blank_token_name_rejected() {
        let mut terms = standard_terms();
        terms.collateral_token.name = "   ".to_string();
        assert_eq!(terms.validate(), Err(TermsError::EmptyTokenName));
    }

    #[test]
    fn zero_premium_is_allowed() {
        let mut terms = standard_terms();
        terms.premium = Amount::ZERO;
        assert!(terms.validate().is_ok());
    }

    #[test]
    fn overflowing_repayment_rejected() {
        let mut terms = standard_terms();
        terms.loan_amount = Amount::new(u128::MAX);
        terms.premium = Amount::new(1);
        assert_eq!(terms.validate(), Err(TermsError::RepaymentOverflow));
    }
}
