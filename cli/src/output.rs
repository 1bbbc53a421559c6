use colored::*;
use peerlink_core::ErrorKind;
use peerlink_host::SurfacedError;

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::TransportUnavailable => "transport",
        ErrorKind::Execution => "execution",
        ErrorKind::Network => "network",
        ErrorKind::Serialization => "serialization",
        ErrorKind::Peer => "peer",
        ErrorKind::Protocol => "protocol",
        ErrorKind::Configuration => "configuration",
    }
}

pub fn format_surfaced(error: &SurfacedError) -> String {
    format!(
        "{} [{}] {}",
        error.at.format("%H:%M:%S%.3f"),
        kind_label(error.kind),
        error.message
    )
}

/// Prints what the bridge surfaced during the session.
pub fn print_surfaced(errors: &[SurfacedError]) {
    if errors.is_empty() {
        println!("{}", "No errors surfaced.".green());
        return;
    }

    println!(
        "{}",
        format!("{} error(s) surfaced:", errors.len()).yellow().bold()
    );
    for error in errors {
        println!("  {}", format_surfaced(error).red());
    }
}

pub fn print_module_exit() {
    println!("{}", "Module closed its channel.".cyan());
}
