//! `fl-deploy up|down|status`. Output goes to the writer handed in by the
//! caller so tests can capture it without touching the process's stdout.

use std::io::Write;

use crate::{DeployError, Deployer, Result};

pub const USAGE: &str = "usage: fl-deploy <up|down|status>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
    Status,
}

impl Command {
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        match args.iter().map(AsRef::as_ref).collect::<Vec<_>>().as_slice() {
            ["up"] => Ok(Command::Up),
            ["down"] => Ok(Command::Down),
            ["status"] => Ok(Command::Status),
            _ => Err(DeployError::Config(USAGE.to_string())),
        }
    }
}

pub async fn run<W: Write>(command: Command, deployer: &Deployer, out: &mut W) -> Result<()> {
    let target = &deployer.config().target;
    match command {
        Command::Up => {
            writeln!(out, "Deploying FunLess locally...")?;
            deployer.deploy().await?;
            writeln!(
                out,
                "Deployment complete: {} and {} are running.",
                target.core_container, target.worker_container
            )?;
        }
        Command::Down => {
            writeln!(out, "Removing local FunLess deployment...")?;
            deployer.destroy().await?;
            writeln!(out, "All clear!")?;
        }
        Command::Status => {
            let status = deployer.status().await?;
            let rendered = serde_json::to_string_pretty(&status)?;
            writeln!(out, "{rendered}")?;
        }
    }
    Ok(())
}
