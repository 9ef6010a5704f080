use colored::Colorize;
use commands::command_argument_builder;
use sitegraph::handlers::{
    handle_crawl, handle_init, handle_load, handle_rank, handle_sanitize, init_tracing,
    print_banner,
};
use std::path::PathBuf;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let config_path = chosen_command.get_one::<PathBuf>("config").cloned();

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    init_tracing(quiet);

    let outcome = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("crawl", primary_command)) => {
            handle_crawl(primary_command, config_path.as_ref(), quiet).await
        }
        Some(("rank", primary_command)) => handle_rank(primary_command, config_path.as_ref()),
        Some(("load", primary_command)) => {
            handle_load(primary_command, config_path.as_ref(), quiet).await
        }
        Some(("sanitize", primary_command)) => handle_sanitize(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
