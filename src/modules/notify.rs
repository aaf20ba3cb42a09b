use std::io::{self, BufRead, StdinLock, Stdout, Write};
use std::time::Duration;
use derive_more::with_trait::Display;
use log::{debug, warn};
use crate::modules::errors::AdminError;

const TOAST_DURATION: Duration = Duration::from_secs(2);
const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NoticeKind {
    #[display("success")]
    Success,
    #[display("error")]
    Error,
    #[display("warning")]
    Warning,
    #[display("info")]
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("[{kind}] {title} {message}")]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    /// Toasts close on their own; dialogs wait for the user.
    pub auto_dismiss: Option<Duration>,
}

impl Notice {
    fn new(kind: NoticeKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            auto_dismiss: None,
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            auto_dismiss: Some(TOAST_DURATION),
            ..Self::new(NoticeKind::Success, title, message)
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Warning, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, title, message)
    }
}

impl From<&AdminError> for Notice {
    fn from(err: &AdminError) -> Self {
        match err {
            AdminError::Validation { report } => Notice::warning(
                "All Fields Required!",
                format!("Please fill in every required field: {report}"),
            ),
            AdminError::AlreadyExists { resource } => Notice::warning(
                "Already Exists!",
                format!("{resource} already exists! Use Edit button to update."),
            ),
            AdminError::IncompleteEntry { field } => Notice::warning(
                "Step Required!",
                format!("Please fill the current {field} entry before adding a new one."),
            ),
            AdminError::TooManyWords { field, max } => Notice::warning(
                "Word Limit!",
                format!("{field} accepts at most {max} words."),
            ),
            AdminError::TooManyEntries { .. } => Notice::warning("Limit Reached!", err.to_string()),
            AdminError::Duplicate { message } => Notice::error("Duplicate Entry", message.clone()),
            AdminError::Server { message, .. } => {
                Notice::error("Error!", message.clone().unwrap_or_else(|| GENERIC_FAILURE.to_string()))
            }
            AdminError::Transport(_) | AdminError::Decode(_) | AdminError::Envelope { .. } => {
                Notice::error("Error!", GENERIC_FAILURE)
            }
            other => Notice::error("Error!", other.to_string()),
        }
    }
}

/// Presentation seam used by controllers. Implementations hold no business
/// state beyond what they need to draw.
pub trait Notifier {
    /// Blocking yes/no question before anything irreversible.
    fn confirm_destructive(&mut self, message: &str) -> bool;
    fn notify(&mut self, notice: Notice);
    fn show_busy(&mut self, message: &str);
    fn hide_busy(&mut self);
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn confirm_destructive(&mut self, message: &str) -> bool {
        (**self).confirm_destructive(message)
    }

    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice)
    }

    fn show_busy(&mut self, message: &str) {
        (**self).show_busy(message)
    }

    fn hide_busy(&mut self) {
        (**self).hide_busy()
    }
}

/// Terminal rendering: notices go to `output`, answers are read from `input`.
pub struct ConsoleNotifier<R: BufRead, W: Write> {
    input: R,
    output: W,
    assume_yes: bool,
    busy: Option<String>,
}

impl ConsoleNotifier<StdinLock<'static>, Stdout> {
    pub fn stdio(assume_yes: bool) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), assume_yes)
    }
}

impl<R: BufRead, W: Write> ConsoleNotifier<R, W> {
    pub fn new(input: R, output: W, assume_yes: bool) -> Self {
        Self {
            input,
            output,
            assume_yes,
            busy: None,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.output, "{line}").and_then(|_| self.output.flush()) {
            warn!("Cannot write to console: {e}");
        }
    }
}

impl<R: BufRead, W: Write> Notifier for ConsoleNotifier<R, W> {
    fn confirm_destructive(&mut self, message: &str) -> bool {
        self.write_line(&format!("Are you sure? You won't be able to revert this! {message}"));
        if self.assume_yes {
            self.write_line("Yes, delete it!");
            return true;
        }
        if let Err(e) = write!(self.output, "[y/N] ").and_then(|_| self.output.flush()) {
            warn!("Cannot write to console: {e}");
        }
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                warn!("Cannot read confirmation: {e}");
                false
            }
        }
    }

    fn notify(&mut self, notice: Notice) {
        let line = match notice.kind {
            NoticeKind::Success => format!("{} {}", notice.title, notice.message),
            _ => notice.to_string(),
        };
        self.write_line(&line);
    }

    fn show_busy(&mut self, message: &str) {
        self.write_line(&format!("{message} Please wait..."));
        self.busy = Some(message.to_string());
    }

    fn hide_busy(&mut self) {
        if let Some(message) = self.busy.take() {
            debug!("Finished: {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn console(input: &str, assume_yes: bool) -> ConsoleNotifier<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleNotifier::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), assume_yes)
    }

    #[test]
    fn confirm_reads_yes_and_no() {
        assert!(console("y\n", false).confirm_destructive("Delete FAQ?"));
        assert!(console("YES\n", false).confirm_destructive("Delete FAQ?"));
        assert!(!console("n\n", false).confirm_destructive("Delete FAQ?"));
        assert!(!console("", false).confirm_destructive("Delete FAQ?"));
    }

    #[test]
    fn assume_yes_skips_the_prompt() {
        let mut console = console("", true);
        assert!(console.confirm_destructive("Delete FAQ?"));
        let out = String::from_utf8(console.into_output()).unwrap();
        assert!(out.contains("won't be able to revert"));
        assert!(!out.contains("[y/N]"));
    }

    #[test]
    fn success_notices_auto_dismiss() {
        let notice = Notice::success("Success!", "FAQ added successfully.");
        assert_eq!(notice.auto_dismiss, Some(Duration::from_secs(2)));
        assert_eq!(Notice::error("Error!", "boom").auto_dismiss, None);
    }

    #[test]
    fn errors_become_dialogs() {
        let notice = Notice::from(&AdminError::AlreadyExists { resource: "Counter".into() });
        assert_eq!(notice.kind, NoticeKind::Warning);
        assert_eq!(notice.title, "Already Exists!");
        assert_eq!(notice.message, "Counter already exists! Use Edit button to update.");

        let notice = Notice::from(&AdminError::Server { status: 500, message: None });
        assert_eq!(notice.message, GENERIC_FAILURE);

        let notice = Notice::from(&AdminError::Duplicate { message: "Heading already exists".into() });
        assert_eq!(notice.title, "Duplicate Entry");
    }

    #[test]
    fn console_prints_notices() {
        let mut console = console("", false);
        console.show_busy("Uploading Blog...");
        console.hide_busy();
        console.notify(Notice::warning("Step Required!", "Please fill the current steps entry."));
        let out = String::from_utf8(console.into_output()).unwrap();
        assert!(out.contains("Uploading Blog... Please wait..."));
        assert!(out.contains("[warning] Step Required! Please fill the current steps entry."));
    }
}
