use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub fn print_banner() {
    println!("{}", "==================================================================".magenta());
    println!("{}", " _         _                              _     ".magenta().bold());
    println!("{}", "| |_ _   _| |__   ___  __ _ _ __ __ _| |__  ".magenta().bold());
    println!("{}", "| __| | | | '_ \\ / _ \\/ _` | '__/ _` | '_ \\ ".magenta().bold());
    println!("{}", "| |_| |_| | |_) |  __/ (_| | | | (_| | |_) |".magenta().bold());
    println!("{}", " \\__|\\__,_|_.__/ \\___|\\__, |_|  \\__,_|_.__/ ".magenta().bold());
    println!("{}", "                      |___/                 ".magenta().bold());
    println!("{}", "==================================================================".magenta());
    println!("{}", "Welcome to tubegrab, the easy video downloader!".cyan().bold());
    println!("{}", "Paste a video or playlist link below.".yellow());
    println!();
}

pub fn info(message: &str) {
    println!("{}", message.cyan());
}

pub fn notice(message: &str) {
    println!("{}", message.magenta());
}

pub fn warn(message: &str) {
    println!("{}", message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{}", message.red());
}

/// Spinner shown while waiting on the engine
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg} {elapsed:.dim}") {
        pb.set_style(style.tick_strings(&[
            "▹▹▹▹▹",
            "▸▹▹▹▹",
            "▹▸▹▹▹",
            "▹▹▸▹▹",
            "▹▹▹▸▹",
            "▹▹▹▹▸",
            "▪▪▪▪▪",
        ]));
    }
    pb.set_message(message.to_string());
    pb
}
