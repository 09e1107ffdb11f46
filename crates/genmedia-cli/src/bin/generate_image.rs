use clap::Parser;
use genmedia_cli::{exit_code_for, run_image, ImageArgs};
use genmedia_contracts::settings::Settings;

fn main() {
    match run_image(ImageArgs::parse(), &Settings::from_env()) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("generate-image error: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}
