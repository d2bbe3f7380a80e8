use clap::Parser;
use taskchat_lib::Cli;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();
    match taskchat_lib::run(cli).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            log::error!("Command failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
