use std::env;
use std::fs;
use std::process;

use minicc::error::{EXIT_RESOURCE, EXIT_USAGE};
use minicc::generate_assembly;

fn main() {
  env_logger::init();

  let args: Vec<String> = env::args().collect();
  if args.len() != 2 {
    let program = args.first().map(String::as_str).unwrap_or("minicc");
    eprintln!("Usage: {program} <path_to_source>");
    process::exit(EXIT_USAGE);
  }

  let source = match fs::read_to_string(&args[1]) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("Error: not possible to open file '{}': {err}.", args[1]);
      process::exit(EXIT_RESOURCE);
    }
  };

  match generate_assembly(&source) {
    Ok(asm) => print!("{asm}"),
    Err(err) => {
      eprintln!("{err}");
      process::exit(err.exit_code());
    }
  }
}
