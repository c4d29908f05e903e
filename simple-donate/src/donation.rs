//! Headless donation flow: amount → bank → payment → return.
//!
//! Knows nothing about HTML. Callers feed it the visitor's input and render
//! whatever it hands back.

use paynl_client::{Bank, GatewayClient, PaymentStatus, TransactionRequest, IDEAL_PAYMENT_PROFILE_ID};

use crate::config::WidgetConfig;
use crate::error::{Error, Result};

/// Convert an amount in currency units ("10.00", "7,5") to cents.
pub fn parse_amount(input: &str) -> Result<u64> {
    let invalid = || Error::InvalidAmount(input.to_string());
    let normalized = input.trim().replace(',', ".");

    let (whole, fraction) = match normalized.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (normalized.as_str(), ""),
    };
    if whole.is_empty()
        || fraction.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: u64 = whole.parse().map_err(|_| invalid())?;
    let fraction: u64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };
    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(invalid)?;

    if cents == 0 {
        return Err(invalid());
    }
    Ok(cents)
}

/// What the visitor submitted so far.
#[derive(Debug, Clone, Default)]
pub struct DonationInput {
    pub amount: Option<String>,
    pub bank_id: Option<String>,
    pub payment_session_id: Option<String>,
}

/// Next step of the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DonationStep {
    AskAmount,
    SelectBank { amount: u64 },
    Pay { amount: u64, bank_id: i64 },
    ReturnFromPayment { payment_session_id: String },
}

impl DonationStep {
    /// A returning visitor wins over a bank choice, which wins over an amount.
    pub fn from_input(input: &DonationInput) -> Result<Self> {
        if let Some(session) = non_empty(&input.payment_session_id) {
            return Ok(DonationStep::ReturnFromPayment {
                payment_session_id: session.to_string(),
            });
        }

        let amount = non_empty(&input.amount).map(parse_amount).transpose()?;

        match (amount, non_empty(&input.bank_id)) {
            (Some(amount), Some(bank)) => {
                let bank_id = bank
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidBankId(bank.to_string()))?;
                Ok(DonationStep::Pay { amount, bank_id })
            }
            (None, Some(_)) => Err(Error::InvalidAmount(String::new())),
            (Some(amount), None) => Ok(DonationStep::SelectBank { amount }),
            (None, None) => Ok(DonationStep::AskAmount),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Result shown to a visitor coming back from the payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Thanks(String),
    Sorry { message: String, status: String },
}

impl Outcome {
    pub fn from_status(status: &PaymentStatus, widget: &WidgetConfig) -> Self {
        if status.is_paid() {
            Outcome::Thanks(widget.thanks.clone())
        } else {
            Outcome::Sorry {
                message: widget.sorry.clone(),
                status: status.status.clone(),
            }
        }
    }
}

/// One donation flow over an authenticated client.
pub struct Donation<'a> {
    client: &'a GatewayClient,
    widget: &'a WidgetConfig,
}

impl<'a> Donation<'a> {
    pub fn new(client: &'a GatewayClient, widget: &'a WidgetConfig) -> Self {
        Self { client, widget }
    }

    /// Banks to offer the visitor. Empty when the website location has no
    /// iDEAL profile.
    pub async fn select_bank(&self) -> Result<Vec<Bank>> {
        let profiles = self.client.active_payment_profiles().await?;
        if !profiles.offers_bank_selection() {
            tracing::info!("No iDEAL profile active, skipping bank list");
            return Ok(Vec::new());
        }
        Ok(self.client.ideal_banks().await?)
    }

    /// Create an iDEAL transaction and return the URL to redirect to.
    pub async fn pay(&self, amount: u64, bank_id: i64, return_url: &str) -> Result<String> {
        let amount = i64::try_from(amount).map_err(|_| Error::InvalidAmount(amount.to_string()))?;
        let mut builder = TransactionRequest::builder(amount, i64::from(IDEAL_PAYMENT_PROFILE_ID))
            .bank_id(bank_id)
            .return_url(return_url)
            .extra("extra1", self.widget.description.as_str());
        if let Some(ref url) = self.widget.exchange_url {
            builder = builder.exchange_url(url.as_str());
        }
        let request = builder.build()?;

        let result = self.client.create_transaction(&request).await?;
        let redirect = result.issuer_url().ok_or(Error::MissingRedirect)?;
        tracing::info!(
            amount = request.amount(),
            transaction_id = ?result.transaction_id(),
            "Donation transaction created"
        );
        Ok(redirect.to_string())
    }

    pub async fn handle_return(&self, payment_session_id: &str) -> Result<Outcome> {
        let status = self.client.payment_status(payment_session_id).await?;
        tracing::info!(status = %status.status, "Donation returned from payment page");
        Ok(Outcome::from_status(&status, self.widget))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paynl_client::Record;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("10.00").unwrap(), 1000);
        assert_eq!(parse_amount("10").unwrap(), 1000);
        assert_eq!(parse_amount("7,5").unwrap(), 750);
        assert_eq!(parse_amount(" 0.29 ").unwrap(), 29);
        assert_eq!(parse_amount("0.01").unwrap(), 1);
    }

    #[test]
    fn test_parse_amount_rejects_invalid_input() {
        for input in ["", "0", "0.00", "-5", "1.234", "ten", "1.2.3", ".50", "1e3", "5."] {
            assert!(parse_amount(input).is_err(), "accepted {:?}", input);
        }
    }

    #[test]
    fn test_step_selection() {
        let mut input = DonationInput::default();
        assert_eq!(DonationStep::from_input(&input).unwrap(), DonationStep::AskAmount);

        input.amount = Some("10.00".to_string());
        assert_eq!(
            DonationStep::from_input(&input).unwrap(),
            DonationStep::SelectBank { amount: 1000 }
        );

        input.bank_id = Some("4".to_string());
        assert_eq!(
            DonationStep::from_input(&input).unwrap(),
            DonationStep::Pay { amount: 1000, bank_id: 4 }
        );

        input.payment_session_id = Some("123456789".to_string());
        assert_eq!(
            DonationStep::from_input(&input).unwrap(),
            DonationStep::ReturnFromPayment {
                payment_session_id: "123456789".to_string()
            }
        );
    }

    #[test]
    fn test_step_rejects_bank_without_amount() {
        let input = DonationInput {
            bank_id: Some("4".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            DonationStep::from_input(&input),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_step_rejects_non_numeric_bank() {
        let input = DonationInput {
            amount: Some("5".to_string()),
            bank_id: Some("ing".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            DonationStep::from_input(&input),
            Err(Error::InvalidBankId(_))
        ));
    }

    fn status(code: &str) -> PaymentStatus {
        PaymentStatus {
            status: code.to_string(),
            amount: Some(1000),
            stats_added: None,
            customer: Record::new(),
        }
    }

    #[test]
    fn test_outcome_for_paid_status() {
        let widget = WidgetConfig::default();
        assert_eq!(
            Outcome::from_status(&status("PAID"), &widget),
            Outcome::Thanks(widget.thanks.clone())
        );
    }

    #[test]
    fn test_outcome_for_other_status() {
        let widget = WidgetConfig::default();
        assert_eq!(
            Outcome::from_status(&status("CANCEL"), &widget),
            Outcome::Sorry {
                message: widget.sorry.clone(),
                status: "CANCEL".to_string(),
            }
        );
    }
}
