use crate::CLAP_STYLING;
use clap::{Arg, arg, command};
use std::path::PathBuf;
use url::Url;

/// Flags shared by `crawl` and `load`.
fn crawl_args() -> Vec<Arg> {
    vec![
        arg!(-u --"url" <URL>)
            .required(false)
            .help("Seed URL; the crawl stays under it (overrides seed_url in the config)")
            .value_parser(clap::value_parser!(Url)),
        arg!(-m --"max-pages" <NUM>)
            .required(false)
            .help("Page budget for the crawl (default: 10)")
            .value_parser(clap::value_parser!(usize)),
        arg!(-t --"threads" <NUM_WORKERS>)
            .required(false)
            .help("Pages fetched concurrently per crawl round (default: 1)")
            .value_parser(clap::value_parser!(usize)),
        arg!(--"exclude" <EXT>)
            .required(false)
            .num_args(1..)
            .help("File extensions never crawled (default: pdf jpg png docx xlsx pptx zip jpeg)"),
        arg!(--"browser" <PATH>)
            .required(false)
            .help("Headless Chromium binary used to render page content")
            .value_parser(clap::value_parser!(PathBuf)),
        arg!(--"render-timeout" <SECONDS>)
            .required(false)
            .help("Timeout for rendering one page (default: none)")
            .value_parser(clap::value_parser!(u64)),
        arg!(--"retries" <NUM>)
            .required(false)
            .help("Retries for transient HTTP failures while rendering (default: 0)")
            .value_parser(clap::value_parser!(usize)),
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Page set file (default: pages.json)")
            .value_parser(clap::value_parser!(PathBuf)),
        arg!(--"db" <PATH>)
            .required(false)
            .help("Record the session in this SQLite database (e.g. ~/.config/sitegraph/sitegraph.db)"),
    ]
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitegraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitegraph")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-c --"config" <FILE>)
                .required(false)
                .global(true)
                .help("JSON config file (default: ~/.config/sitegraph/config.json if present)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the sitegraph config directory, default config and database")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the sitegraph config directory")
                        .default_value("~/.config/sitegraph/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing config and database at the \
                        specified location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about("Crawl a site within a page budget and save the fetched pages")
                .args(crawl_args())
                .arg(
                    arg!(-F --"file" <PATH>)
                        .required(false)
                        .num_args(1..)
                        .help("Local .html, .txt or .md documents to add to the page set")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("rank")
                .about("Rank the pages of a saved page set by how often they are referenced")
                .arg(
                    arg!(-i --"input" <FILE>)
                        .required(true)
                        .help("Page set written by crawl or load")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-l --"limit" <NUM>)
                        .required(false)
                        .help("Number of candidates to keep (default: derived from max_pages)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("load")
                .about(
                    "Crawl, fetch and rank in one go, reusing an existing page set at the \
                output path",
                )
                .args(crawl_args())
                .arg(
                    arg!(--"refresh")
                        .required(false)
                        .help("Crawl again even if the output file exists")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("sanitize")
                .about("Drop sentences citing unknown, unreachable URLs from a generated answer")
                .arg(
                    arg!(-i --"input" <FILE>)
                        .required(false)
                        .help("Answer to clean (default: stdin)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"known" <FILE>)
                        .required(false)
                        .help("Newline-delimited URLs that are always kept")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"prompt" <FILE>)
                        .required(false)
                        .help("Prompt text; URLs it mentions are always kept")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-r --"replace" <FROM_TO>)
                        .required(false)
                        .action(clap::ArgAction::Append)
                        .help("Literal FROM=TO replacement applied first; repeatable"),
                )
                .arg(
                    arg!(--"no-network")
                        .required(false)
                        .help("Skip live link checks and keep every URL")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Link check timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                ),
        )
}
