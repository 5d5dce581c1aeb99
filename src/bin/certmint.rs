extern crate certmint;

use std::sync::Arc;

use certmint::config::Config;
use certmint::daemon::start::start_certmint_daemon;

#[tokio::main]
async fn main() {
    match Config::create() {
        Ok(config) => {
            if let Err(e) = start_certmint_daemon(Arc::new(config), None).await {
                eprintln!("certmint failed to start: {e}");
                ::std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            ::std::process::exit(1);
        }
    }
}
