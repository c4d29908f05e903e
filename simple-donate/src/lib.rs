//! Simple Donate - headless iDEAL donation flow on top of the Pay.nl client.

pub mod config;
pub mod donation;
pub mod error;

pub use config::{Config, WidgetConfig};
pub use donation::{parse_amount, Donation, DonationInput, DonationStep, Outcome};
pub use error::{Error, Result};
