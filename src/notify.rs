/// Subscriber notifications
/// The supervisor reports fill outcomes and terminal failures by mail. The
/// message is assembled as MIME multipart (plain-text body plus base64
/// attachments) and handed to the local mail transfer agent via `sendmail`;
/// nothing here talks SMTP directly. A console notifier stands in when mail
/// is disabled.

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub trait Notifier {
    fn notify(&self, message: &str, attachments: &[PathBuf]) -> Result<()>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, message: &str, attachments: &[PathBuf]) -> Result<()> {
        (**self).notify(message, attachments)
    }
}

/// Pipes a finished RFC-822 message into the local `sendmail` binary.
pub struct SendmailNotifier {
    from: String,
    to: Vec<String>,
}

const SENDMAIL: &str = "sendmail";
const SUBJECT: &str = "Message from LN2 Fill Server";
const BOUNDARY: &str = "ln2-autofill-boundary";

impl SendmailNotifier {
    pub fn new(from: String, to: Vec<String>) -> Self {
        Self { from, to }
    }

    fn build_message(&self, message: &str, attachments: &[PathBuf]) -> Result<String> {
        let mut msg = String::new();
        msg.push_str(&format!("From: {}\n", self.from));
        msg.push_str(&format!("To: {}\n", self.to.join(", ")));
        msg.push_str(&format!("Subject: {SUBJECT}\n"));
        msg.push_str("MIME-Version: 1.0\n");
        msg.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{BOUNDARY}\"\n\n"
        ));

        msg.push_str(&format!("--{BOUNDARY}\n"));
        msg.push_str("Content-Type: text/plain; charset=utf-8\n\n");
        msg.push_str(message);
        msg.push('\n');

        for path in attachments {
            let data = fs::read(path)
                .with_context(|| format!("Failed to read attachment {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());
            msg.push_str(&format!("--{BOUNDARY}\n"));
            msg.push_str("Content-Type: application/octet-stream\n");
            msg.push_str("Content-Transfer-Encoding: base64\n");
            msg.push_str(&format!(
                "Content-Disposition: attachment; filename=\"{name}\"\n\n"
            ));
            let encoded = BASE64.encode(&data);
            for chunk in encoded.as_bytes().chunks(76) {
                msg.push_str(std::str::from_utf8(chunk).unwrap_or(""));
                msg.push('\n');
            }
        }
        msg.push_str(&format!("--{BOUNDARY}--\n"));
        Ok(msg)
    }
}

impl Notifier for SendmailNotifier {
    fn notify(&self, message: &str, attachments: &[PathBuf]) -> Result<()> {
        crate::log_line(&format!(
            "Sending mail to subscribers ({})",
            self.to.join(", ")
        ));
        let mime = self.build_message(message, attachments)?;

        let mut child = Command::new(SENDMAIL)
            .arg("-t")
            .stdin(Stdio::piped())
            .spawn()
            .context("Failed to spawn sendmail (is an MTA installed?)")?;
        child
            .stdin
            .take()
            .context("sendmail stdin unavailable")?
            .write_all(mime.as_bytes())
            .context("Failed to write message to sendmail")?;
        let rc = child.wait().context("Failed to wait for sendmail")?;
        if !rc.success() {
            bail!("sendmail exited with {rc}");
        }
        Ok(())
    }
}

/// Console-only delivery, used when mail notification is switched off.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, attachments: &[PathBuf]) -> Result<()> {
        crate::log_line("Notification (mail disabled):");
        println!("{message}");
        for path in attachments {
            println!("[attachment: {}]", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mime_message_shape() {
        let tmp = TempDir::new().unwrap();
        let report = tmp.path().join("report.txt");
        fs::write(&report, "line 1 data").unwrap();

        let notifier = SendmailNotifier::new(
            "ln2@lab.example".to_string(),
            vec!["ops@lab.example".to_string()],
        );
        let msg = notifier
            .build_message("Looks good!\n", &[report])
            .expect("message should build");

        assert!(msg.starts_with("From: ln2@lab.example\n"));
        assert!(msg.contains("To: ops@lab.example\n"));
        assert!(msg.contains("Subject: Message from LN2 Fill Server\n"));
        assert!(msg.contains("Looks good!"));
        assert!(msg.contains("filename=\"report.txt\""));
        assert!(msg.contains(&BASE64.encode(b"line 1 data")));
        assert!(msg.trim_end().ends_with(&format!("--{BOUNDARY}--")));
    }

    #[test]
    fn test_missing_attachment_is_an_error() {
        let notifier = SendmailNotifier::new("a@b".to_string(), vec!["c@d".to_string()]);
        let err = notifier
            .build_message("hi", &[PathBuf::from("/nonexistent/file.txt")])
            .unwrap_err();
        assert!(err.to_string().contains("attachment"));
    }
}
