mod commands;
mod error;
mod opt;
mod table;
mod uuid;

use self::error::*;
use self::opt::*;
use clap::Parser;
use log::debug;
use std::fs;
use std::path::Path;

macro_rules! main_unwrap {
    ($e:expr) => {{
        match $e {
            Ok(x) => x,
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        }
    }};
}

fn main() {
    let opt = Opt::parse();

    env_logger::init();
    debug!("options: {:?}", opt);

    main_unwrap!(run(opt.command));
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Print(opt) => {
            let image = fs::read(&opt.image)?;
            commands::print(&opt.image.display().to_string(), &image, opt.block_size)
        }
        Command::Verify(opt) => {
            let image = fs::read(&opt.image)?;
            commands::verify(&image, opt.block_size)
        }
        Command::Mirror(opt) => update(&opt.image, |image| {
            commands::mirror(image, opt.block_size)
        }),
        Command::Init { image: opt, guid } => update(&opt.image, |image| {
            commands::init(image, opt.block_size, guid)
        }),
    }
}

/// Read the whole image, change it in memory, then write it back.
fn update<F>(path: &Path, f: F) -> Result<()>
where
    F: FnOnce(&mut [u8]) -> Result<()>,
{
    let mut image = fs::read(path)?;
    f(&mut image)?;
    fs::write(path, &image)?;
    debug!("{} bytes written to {}", image.len(), path.display());

    Ok(())
}
