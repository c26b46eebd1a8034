//! One-shot command execution.

use crate::Commands;
use colored::Colorize;
use otpkey_client::{Session, TimeSync};
use std::io::{Read, Write};

/// Executes a device command and returns the formatted output.
pub fn execute<S: Read + Write>(
    session: &mut Session<S>,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        // Handled in main.rs (no session or no device command)
        Commands::Shell | Commands::Ports => unreachable!(),

        Commands::Sync => Ok(format_sync(&session.sync()?)),

        Commands::List => Ok(format_keys(&session.list_keys()?)),

        Commands::Add { name, secret } => Ok(format_reply(&session.add_key(&name, &secret)?)),

        Commands::Delete { position } => {
            let index = zero_based(position).ok_or("key positions start at 1")?;
            // Show what the position refers to before deleting it.
            let mut output = format_keys(&session.list_keys()?);
            output.push('\n');
            output.push_str(&format_reply(&session.delete_key(index)?));
            Ok(output)
        }

        Commands::Wipe { yes } => {
            if !yes {
                return Err("wipe erases every key on the device; pass --yes to confirm".into());
            }
            Ok(format_reply(&session.wipe()?))
        }
    }
}

/// Converts a 1-based position into a zero-based device index.
pub fn zero_based(position: u32) -> Option<u32> {
    position.checked_sub(1)
}

/// Formats one device reply line for display.
pub fn format_reply(line: &str) -> String {
    format!("{} {}", "[+]".green(), line)
}

/// Formats a clock sync: the timestamp sent, then the device reply.
pub fn format_sync(sync: &TimeSync) -> String {
    format!(
        "Sending timestamp: {}\n{}",
        sync.timestamp,
        format_reply(&sync.reply)
    )
}

/// Formats a key listing as a numbered list, or a notice when empty.
pub fn format_keys(keys: &[String]) -> String {
    if keys.is_empty() {
        return format!("{} {}", "[+]".green(), "No keys set".yellow());
    }
    keys.iter()
        .enumerate()
        .map(|(i, key)| format!("{} {}. {}", "[+]".green(), i + 1, key))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use otpkey_client::testing::{Probe, ScriptedStream};

    fn session(replies: &[&str]) -> (Session<ScriptedStream>, Probe) {
        let mut script = vec!["Time set\n"];
        script.extend_from_slice(replies);
        let (stream, probe) = ScriptedStream::new(script);
        let mut session = Session::from_stream("fake", stream);
        session.handshake().unwrap();
        probe.reset();
        (session, probe)
    }

    #[test]
    fn test_zero_based() {
        assert_eq!(zero_based(1), Some(0));
        assert_eq!(zero_based(3), Some(2));
        assert_eq!(zero_based(0), None);
    }

    #[test]
    fn test_format_keys() {
        colored::control::set_override(false);
        assert_eq!(format_keys(&[]), "[+] No keys set");
        let keys = vec!["GHB 123456".to_string(), "AWS 654321".to_string()];
        assert_eq!(format_keys(&keys), "[+] 1. GHB 123456\n[+] 2. AWS 654321");
        assert_eq!(format_reply("Key added"), "[+] Key added");
    }

    #[test]
    fn test_sync_command_shows_timestamp() {
        colored::control::set_override(false);
        let (mut session, probe) = session(&["Time set\n"]);
        let output = execute(&mut session, Commands::Sync).unwrap();

        let sent = probe.written_text();
        let timestamp = sent.lines().nth(1).unwrap();
        assert_eq!(output, format!("Sending timestamp: {}\n[+] Time set", timestamp));
    }

    #[test]
    fn test_list_command() {
        colored::control::set_override(false);
        let (mut session, probe) = session(&["1\n", "GHB 123456\n"]);
        let output = execute(&mut session, Commands::List).unwrap();
        assert_eq!(output, "[+] 1. GHB 123456");
        assert_eq!(probe.written(), b"get\n");
    }

    #[test]
    fn test_delete_command() {
        colored::control::set_override(false);
        let (mut session, probe) = session(&["2\n", "GHB 1\n", "AWS 2\n", "Key deleted\n"]);
        let output = execute(&mut session, Commands::Delete { position: 2 }).unwrap();
        assert!(output.ends_with("[+] Key deleted"));
        assert_eq!(probe.written(), b"get\ndel\n1\n");
    }

    #[test]
    fn test_delete_position_zero() {
        let (mut session, probe) = session(&[]);
        assert!(execute(&mut session, Commands::Delete { position: 0 }).is_err());
        assert!(probe.written().is_empty());
    }

    #[test]
    fn test_wipe_requires_confirmation() {
        let (mut session, probe) = session(&["Device wiped\n"]);
        let err = execute(&mut session, Commands::Wipe { yes: false }).unwrap_err();
        assert!(err.to_string().contains("--yes"));
        assert!(probe.written().is_empty());

        colored::control::set_override(false);
        let output = execute(&mut session, Commands::Wipe { yes: true }).unwrap();
        assert_eq!(output, "[+] Device wiped");
        assert_eq!(probe.written(), b"wipe\n");
    }

    #[test]
    fn test_add_invalid_secret() {
        let (mut session, probe) = session(&[]);
        let cmd = Commands::Add {
            name: "AB".to_string(),
            secret: "!!!".to_string(),
        };
        assert!(execute(&mut session, cmd).is_err());
        assert!(probe.written().is_empty());
    }
}
