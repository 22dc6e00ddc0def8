use anyhow::Result;
use clap::{Parser, Subcommand};

mod check;
mod serve;

#[derive(Parser)]
#[command(author, version, about)]
pub struct App {
    #[command(subcommand)]
    pub commands: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Serve(serve::ServeArgs),
    Check(check::CheckArgs),
}

impl App {
    pub async fn run(&self) -> Result<()> {
        match &self.commands {
            Commands::Serve(args) => args.run().await,
            Commands::Check(args) => args.run(),
        }
    }
}
