//! Simple Donate - command line front-end for the donation flow.

use std::env;

use paynl_client::GatewayClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use simple_donate::{parse_amount, Config, Donation, Error, Outcome, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "simple-donate <profiles | banks | donate <amount> <bank-id> <return-url> | status <payment-session-id>>";

fn print_version() {
    println!("simple-donate {}", VERSION);
}

enum Command {
    Profiles,
    Banks,
    Donate {
        amount: u64,
        bank_id: i64,
        return_url: String,
    },
    Status {
        payment_session_id: String,
    },
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        match args {
            [cmd] if cmd == "profiles" => Ok(Command::Profiles),
            [cmd] if cmd == "banks" => Ok(Command::Banks),
            [cmd, amount, bank, return_url] if cmd == "donate" => Ok(Command::Donate {
                amount: parse_amount(amount)?,
                bank_id: bank
                    .parse()
                    .map_err(|_| Error::InvalidBankId(bank.clone()))?,
                return_url: return_url.clone(),
            }),
            [cmd, id] if cmd == "status" => Ok(Command::Status {
                payment_session_id: id.clone(),
            }),
            _ => Err(Error::Usage(USAGE.to_string())),
        }
    }
}

async fn run(command: Command, client: &GatewayClient, config: &Config) -> Result<()> {
    let donation = Donation::new(client, &config.widget);
    match command {
        Command::Profiles => {
            let profiles = client.active_payment_profiles().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(profiles.as_value()).unwrap_or_default()
            );
        }
        Command::Banks => {
            let banks = donation.select_bank().await?;
            if banks.is_empty() {
                println!("iDEAL is not available for this website location");
            }
            for bank in banks {
                println!("{:>4}  {}", bank.id, bank.name);
            }
        }
        Command::Donate {
            amount,
            bank_id,
            return_url,
        } => {
            let redirect = donation.pay(amount, bank_id, &return_url).await?;
            println!("{}", redirect);
        }
        Command::Status { payment_session_id } => {
            match donation.handle_return(&payment_session_id).await? {
                Outcome::Thanks(message) => println!("{}", message),
                Outcome::Sorry { message, status } => println!("{} ({})", message, status),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = Command::parse(&args)?;

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Make sure donate.toml exists or set the DONATE__GATEWAY__* environment variables.",
            e
        )
    })?;
    let client_config = config.client_config()?;
    tracing::info!(
        "Starting simple-donate for program {} (test mode: {})",
        client_config.program_id(),
        client_config.test_mode()
    );

    let client = GatewayClient::connect(client_config).await?;
    let result = run(command, &client, &config).await;
    client.logout().await;

    result?;
    Ok(())
}
