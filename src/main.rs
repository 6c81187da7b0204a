use std::error::Error;

use env_logger::Env;

use mysh::config::Config;
use mysh::shell::Shell;
use mysh::sig::install_reaper;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    install_reaper()?;

    Shell::new(Config::from_env()).run()
}
