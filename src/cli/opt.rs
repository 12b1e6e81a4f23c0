use clap::{Args, Parser, Subcommand};
use gptkit::Guid;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// display the header and the partitions of a disk image
    Print(ImageOpt),

    /// check the checksums of both copies of the GPT
    Verify(ImageOpt),

    /// rewrite both copies of the GPT from the one that can be read
    Mirror(ImageOpt),

    /// write a protective MBR and an empty GPT on a disk image
    Init {
        #[command(flatten)]
        image: ImageOpt,

        /// disk GUID (default: random)
        #[arg(long = "guid")]
        guid: Option<Guid>,
    },
}

#[derive(Args, Debug)]
pub struct ImageOpt {
    /// disk image to open
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// block size (default: guessed, or 512 for init)
    #[arg(short = 'b', long = "block-size", value_parser = clap::value_parser!(u64).range(1..))]
    pub block_size: Option<u64>,
}
