use colored::Colorize;
use slacklib_config::{PresentationDefaults, SettableKey};
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_reply(text: &str, params: &PresentationDefaults) {
    println!("{} {}", params.icon_emoji.dimmed(), params.username.bold());
    println!("{text}");
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_keys() {
    let mut builder = Builder::default();
    builder.push_record(["Key", "Description"]);
    for key in SettableKey::all() {
        builder.push_record([key.as_str(), key.description()]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}
