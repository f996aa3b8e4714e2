use anyhow::Context;
use clap::{Arg, ArgAction, Command, value_parser};
use std::process;

use designer::models::QueryDefinition;
use designer::odata;

fn compile_file(path: &str, page: u32, page_size: u32, count_only: bool) -> anyhow::Result<String> {
    let document =
        std::fs::read_to_string(path).with_context(|| format!("reading query file {}", path))?;
    let query: QueryDefinition = serde_json::from_str(&document)
        .with_context(|| format!("parsing query definition in {}", path))?;
    Ok(odata::compile(&query, page, page_size, count_only))
}

#[tokio::main]
async fn main() {
    let matches = Command::new("Query Designer")
        .version("0.1")
        .about("Builds and runs Dataverse queries through OData")
        .subcommand(
            Command::new("serve")
                .about("Run the query designer API")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Sets a custom config file"),
                ),
        )
        .subcommand(
            Command::new("compile")
                .about("Print the OData query string for a query definition")
                .arg(
                    Arg::new("file")
                        .short('f')
                        .long("file")
                        .value_name("FILE")
                        .required(true)
                        .help("QueryDefinition JSON document"),
                )
                .arg(
                    Arg::new("page")
                        .long("page")
                        .value_parser(value_parser!(u32).range(1..))
                        .default_value("1"),
                )
                .arg(
                    Arg::new("page-size")
                        .long("page-size")
                        .value_parser(value_parser!(u32).range(1..))
                        .default_value("50"),
                )
                .arg(
                    Arg::new("count-only")
                        .long("count-only")
                        .action(ArgAction::SetTrue),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("serve", serve_matches)) => {
            let config_path = serve_matches
                .get_one::<String>("config")
                .map(|s| s.as_str())
                .unwrap_or("config/designer.toml");

            if let Err(e) = designer::run_server(config_path).await {
                eprintln!("Query designer error: {}", e);
                process::exit(1);
            }
        }
        Some(("compile", compile_matches)) => {
            let path = compile_matches
                .get_one::<String>("file")
                .map(|s| s.as_str())
                .unwrap_or_default();
            let page = compile_matches.get_one::<u32>("page").copied().unwrap_or(1);
            let page_size = compile_matches
                .get_one::<u32>("page-size")
                .copied()
                .unwrap_or(50);
            let count_only = compile_matches.get_flag("count-only");

            match compile_file(path, page, page_size, count_only) {
                Ok(compiled) => println!("{}", compiled),
                Err(e) => {
                    eprintln!("Compile error: {:#}", e);
                    process::exit(1);
                }
            }
        }
        _ => {
            println!("No subcommand specified. Use --help for usage information.");
            process::exit(1);
        }
    }
}
