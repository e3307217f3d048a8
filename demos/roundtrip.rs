// SPDX-License-Identifier: MIT OR Apache-2.0

//! Round-trips a message through the worker bridge on the command line.
//!
//! ```bash
//! cargo run --example roundtrip -- "attack at dawn"
//! ```
//!
//! Pass `--recipient` to encrypt to existing age public keys instead of a freshly generated
//! identity; the demo then stops after printing the ciphertext.

use age_bridge::{AgeEngine, Bridge};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Encrypt and decrypt a message through the age worker bridge")]
struct Args {
    /// Message to run through the worker.
    #[arg(default_value = "hello from the other side of the bridge")]
    message: String,

    /// Encrypt to these public keys instead of generating an identity.
    #[arg(short, long)]
    recipient: Vec<String>,
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let args = Args::parse();

    let bridge = Bridge::builder(AgeEngine::new()).spawn();

    if !args.recipient.is_empty() {
        let ciphertext = bridge.encrypt(args.message, args.recipient).await?;
        println!("{ciphertext}");
        return Ok(());
    }

    let pair = bridge.generate_identity().await?;
    println!("public key:  {}", pair.public);
    println!("private key: {}\n", pair.private);

    let ciphertext = bridge
        .encrypt(args.message.clone(), vec![pair.public])
        .await?;
    println!("{ciphertext}\n");

    let plaintext = bridge.decrypt(ciphertext, pair.private).await?;
    println!("decrypted: {plaintext}");
    anyhow::ensure!(plaintext == args.message, "round trip altered the message");

    Ok(())
}
