use clap::Parser;
use genmedia_cli::{exit_code_for, run_video, VideoArgs};
use genmedia_contracts::settings::Settings;

fn main() {
    match run_video(VideoArgs::parse(), &Settings::from_env()) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("generate-video error: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}
