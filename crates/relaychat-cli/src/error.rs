use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), err);

    let msg = format!("{:#}", err).to_lowercase();

    if msg.contains("no user id") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Pass a user id with:");
        eprintln!("  {} relaychat --user <id>", "$".dimmed());
    }

    if msg.contains("connection refused") || msg.contains("error sending request") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check that the relay is running and RELAYCHAT_RELAY_URL points at it.");
    }

    std::process::exit(1);
}
