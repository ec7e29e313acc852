//! Interactive kiosk: a mounted capture page driven by stdin commands.

use crate::console;
use attend_core::{Action, CapturePage, PageExit};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskCommand {
    Run(Action),
    Status,
    Help,
    Quit,
}

const HELP_ATTENDANCE: &str = "commands: in | out | status | quit";
const HELP_ENROLL: &str = "commands: enroll <name> | status | quit";

/// Parse one input line. Enrollment and attendance kiosks accept different
/// actions.
pub fn parse_command(line: &str, enroll_mode: bool) -> Result<KioskCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match (word, enroll_mode) {
        ("status", _) => Ok(KioskCommand::Status),
        ("help" | "?", _) => Ok(KioskCommand::Help),
        ("quit" | "exit", _) => Ok(KioskCommand::Quit),
        ("in" | "check-in", false) => Ok(KioskCommand::Run(Action::CheckIn)),
        ("out" | "check-out", false) => Ok(KioskCommand::Run(Action::CheckOut)),
        // Blank names go through; the controller owns that check.
        ("enroll", true) => Ok(KioskCommand::Run(Action::Enroll {
            label: rest.to_string(),
        })),
        ("", _) => Err(String::new()),
        (other, _) => Err(format!(
            "unknown command '{other}' ({})",
            if enroll_mode { HELP_ENROLL } else { HELP_ATTENDANCE }
        )),
    }
}

/// Serve commands until `quit`, end of input, or session expiry, then
/// unmount the page.
pub async fn run(page: CapturePage, enroll_mode: bool) -> anyhow::Result<PageExit> {
    let help = if enroll_mode { HELP_ENROLL } else { HELP_ATTENDANCE };
    eprintln!("{}  {help}", page.clock());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let exit = loop {
        tokio::select! {
            reason = page.expired() => break reason,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break PageExit::Unmounted;
                };
                match parse_command(&line, enroll_mode) {
                    Ok(KioskCommand::Run(action)) => {
                        // Detached: a busy controller drops it, expiry discards it.
                        drop(page.dispatch(action));
                    }
                    Ok(KioskCommand::Status) => {
                        println!(
                            "{}  {:?}  {}",
                            page.clock(),
                            page.controller().state(),
                            console::render_action(page.last_action().as_ref())
                        );
                    }
                    Ok(KioskCommand::Help) => eprintln!("{help}"),
                    Ok(KioskCommand::Quit) => break PageExit::Unmounted,
                    Err(msg) if msg.is_empty() => {}
                    Err(msg) => eprintln!("{msg}"),
                }
            }
        }
    };

    if exit == PageExit::Expired {
        eprintln!("Sign in again with `attend login` to continue enrolling.");
    }
    page.unmount().await;
    Ok(exit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attendance_commands() {
        assert_eq!(parse_command("in", false), Ok(KioskCommand::Run(Action::CheckIn)));
        assert_eq!(
            parse_command("  check-out ", false),
            Ok(KioskCommand::Run(Action::CheckOut))
        );
        assert_eq!(parse_command("status", false), Ok(KioskCommand::Status));
        assert!(parse_command("enroll Asha", false).is_err());
    }

    #[test]
    fn test_enroll_commands() {
        assert_eq!(
            parse_command("enroll Asha K", true),
            Ok(KioskCommand::Run(Action::Enroll {
                label: "Asha K".into()
            }))
        );
        assert_eq!(
            parse_command("enroll", true),
            Ok(KioskCommand::Run(Action::Enroll { label: String::new() }))
        );
        assert!(parse_command("in", true).is_err());
        assert_eq!(parse_command("quit", true), Ok(KioskCommand::Quit));
    }

    #[test]
    fn test_blank_and_unknown_lines() {
        assert_eq!(parse_command("   ", false), Err(String::new()));
        let err = parse_command("dance", false).unwrap_err();
        assert!(err.contains("unknown command 'dance'"));
    }
}
