mod bindings;
mod camera;
mod cli;
mod controls;
mod interactive;
mod offline;
mod paths;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
