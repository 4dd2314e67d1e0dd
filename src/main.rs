/*
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use smtp_probe::{
    config::Config,
    probe::{self, Mode},
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Merge the local override file into the environment; variables that are
    // already set win over the file.
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    init_tracing(Mode::for_port(config.port));

    println!("Probando conexión a {}:{}", config.host, config.port);
    println!(
        "Usuario: {}",
        config.username.as_deref().unwrap_or("(sin definir)")
    );

    let outcome = probe::run(&config).await;
    println!("\n{outcome}");

    std::process::exit(outcome.exit_code());
}

/// STARTTLS mode mirrors the verbose protocol logging of the plaintext
/// handshake path; `RUST_LOG` overrides either default.
fn init_tracing(mode: Mode) {
    let default = match mode {
        Mode::StartTls => "smtp_probe=debug",
        Mode::ImplicitTls => "smtp_probe=info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}
