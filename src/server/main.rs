mod error;

use std::env;
use std::thread::sleep;
use std::time::Duration;

use prefork::config::Config;
use prefork::control::USAGE;
use prefork::error::{Error, EXIT_CONFIG};
use prefork::logger::LOG;
use prefork::registry::Registry;
use prefork::CONF_FILE;

use error::ArgError;

fn demo_registry() -> Result<Registry, Error> {
    let mut registry = Registry::new();
    let mut batches = 0u64;
    registry
        .register("mcq", 2, move || {
            batches += 1;
            if batches % 50 == 0 {
                LOG.info(&format!("mcq: {batches} batches consumed"));
            }
            sleep(Duration::from_millis(200));
        })?
        .register("other", 4, || sleep(Duration::from_millis(100)))?;
    Ok(registry)
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog_name = args.first().map_or("preforkd", String::as_str);
    let (command, conf_file) = match args.get(1..).unwrap_or_default() {
        [command] => (command.as_str(), CONF_FILE),
        [command, conf_file] => (command.as_str(), conf_file.as_str()),
        _ => {
            eprintln!("{}", ArgError::new(prog_name));
            std::process::exit(EXIT_CONFIG);
        }
    };

    let conf = match Config::from(conf_file) {
        Ok(o) => o,
        Err(e) => prefork::exit_with_error(Error::Config(e)),
    };

    let outcome = demo_registry().and_then(|registry| prefork::run(registry, conf, command));
    match outcome {
        Ok(message) => println!("{message}"),
        Err(e @ Error::UnknownCommand(_)) => {
            println!("{USAGE}");
            prefork::exit_with_error(e)
        }
        Err(e) => prefork::exit_with_error(e),
    }
}
