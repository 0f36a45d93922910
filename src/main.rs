use azkv::cli::{Cli, Commands};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    azkv::logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Show { ref name, no_copy } => {
            azkv::cli::commands::show::execute(&cli, name.as_deref(), no_copy)
        }
        Commands::Find { ref text } => azkv::cli::commands::find::execute(&cli, text),
        Commands::Edit { ref name } => azkv::cli::commands::edit::execute(&cli, name.as_deref()),
        Commands::Check => azkv::cli::commands::check::execute(&cli),
        Commands::List => azkv::cli::commands::list::execute(&cli),
        Commands::Vaults { ref action } => azkv::cli::commands::vaults::execute(&cli, action),
        Commands::Reset { force } => azkv::cli::commands::reset::execute(&cli, force),
        Commands::Completions { ref shell } => azkv::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        azkv::cli::output::error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}
