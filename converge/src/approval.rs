//! Approval gate in front of mutating updates.
//!
//! Only structural updates of single-instance resources are gated. First-time
//! creates and fleet scaling never ask.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::Mutex;

use tracing::warn;

use crate::diff::ChangeSet;
use crate::resource::ResourceKind;

/// The exact operator answer that approves a change set.
pub const APPROVE_ANSWER: &str = "yes";

/// A pending update awaiting a decision.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalRequest<'a> {
    pub kind: ResourceKind,
    pub name: &'a str,
    /// Provider identity of the resource being updated.
    pub id: &'a str,
    pub changes: &'a ChangeSet,
}

/// Synchronous yes/no decision on a non-empty change set.
///
/// Called from a blocking thread, so implementations may wait on a terminal.
pub trait ApprovalGate: Send + Sync {
    fn approve(&self, request: &ApprovalRequest<'_>) -> bool;
}

impl<F> ApprovalGate for F
where
    F: Fn(&ApprovalRequest<'_>) -> bool + Send + Sync,
{
    fn approve(&self, request: &ApprovalRequest<'_>) -> bool {
        self(request)
    }
}

/// Case-sensitive exact match on `yes`. A trailing line ending is ignored.
pub fn is_approval(answer: &str) -> bool {
    answer.trim_end_matches(['\n', '\r']) == APPROVE_ANSWER
}

/// Approves everything without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ApprovalGate for AutoApprove {
    fn approve(&self, _request: &ApprovalRequest<'_>) -> bool {
        true
    }
}

struct PromptIo {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

/// Line-oriented prompt. Concurrent requests are asked one at a time.
pub struct PromptApproval {
    io: Mutex<PromptIo>,
}

impl PromptApproval {
    pub fn new(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Self {
            io: Mutex::new(PromptIo { input, output }),
        }
    }

    /// Prompt on the process terminal.
    pub fn stdio() -> Self {
        Self::new(Box::new(BufReader::new(io::stdin())), Box::new(io::stdout()))
    }

    fn ask(io: &mut PromptIo, request: &ApprovalRequest<'_>) -> io::Result<String> {
        writeln!(
            io.output,
            "\n{} {} ({}) has changes to apply:",
            request.kind, request.name, request.id
        )?;
        for line in request.changes.lines() {
            writeln!(io.output, "  {line}")?;
        }
        write!(io.output, "\nDo you want to apply these changes? (yes/no): ")?;
        io.output.flush()?;

        let mut answer = String::new();
        io.input.read_line(&mut answer)?;
        Ok(answer)
    }
}

impl ApprovalGate for PromptApproval {
    fn approve(&self, request: &ApprovalRequest<'_>) -> bool {
        let mut io = match self.io.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match Self::ask(&mut io, request) {
            Ok(answer) => is_approval(&answer),
            Err(e) => {
                warn!("Approval prompt failed for {} {}: {}", request.kind, request.name, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    fn sample_changes() -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.scalar("scheme", "internal", "internet-facing");
        changes
    }

    /// Writer that can be inspected after the prompt owns it.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn prompt_with(input: &str) -> (PromptApproval, SharedBuf) {
        let out = SharedBuf::default();
        let gate = PromptApproval::new(
            Box::new(Cursor::new(input.as_bytes().to_vec())),
            Box::new(out.clone()),
        );
        (gate, out)
    }

    fn request(changes: &ChangeSet) -> ApprovalRequest<'_> {
        ApprovalRequest {
            kind: ResourceKind::LoadBalancer,
            name: "edge",
            id: "arn:lb",
            changes,
        }
    }

    #[test]
    fn test_only_exact_yes_approves() {
        assert!(is_approval("yes"));
        assert!(is_approval("yes\n"));
        assert!(is_approval("yes\r\n"));
        for answer in ["", "Yes", "y", "YES", " yes", "yes please", "no"] {
            assert!(!is_approval(answer), "{answer:?} must not approve");
        }
    }

    #[test]
    fn test_prompt_renders_changes_and_accepts_yes() {
        let changes = sample_changes();
        let (gate, out) = prompt_with("yes\n");
        assert!(gate.approve(&request(&changes)));

        let printed = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(printed.contains("  scheme: internal -> internet-facing"));
        assert!(printed.contains("(yes/no)"));
    }

    #[test]
    fn test_prompt_rejects_on_eof() {
        let changes = sample_changes();
        let (gate, _) = prompt_with("");
        assert!(!gate.approve(&request(&changes)));
    }

    #[test]
    fn test_prompt_rejects_capitalized() {
        let changes = sample_changes();
        let (gate, _) = prompt_with("Yes\n");
        assert!(!gate.approve(&request(&changes)));
    }

    fn single_change_only(req: &ApprovalRequest<'_>) -> bool {
        req.changes.len() == 1
    }

    #[test]
    fn test_function_gate() {
        let changes = sample_changes();
        assert!(single_change_only.approve(&request(&changes)));
        assert!(AutoApprove.approve(&request(&changes)));
    }
}
