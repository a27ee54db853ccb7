use std::{env, process};

mod cli;
mod config;
mod error;
mod login;
mod output;
mod parser;
mod records;
mod session;
mod url_builder;

#[tokio::main]
async fn main() {
    if let Err(err) = cli::run(env::args()).await {
        log::error!("{:#}", err);
        process::exit(1);
    }
}
