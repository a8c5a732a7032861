// Human approval channel for commands the safety gate flags

use crate::safety::RiskLevel;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::{info, warn};

/// What the approver gets to see
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub command: String,
    pub reason: String,
    pub risk_level: RiskLevel,
    pub agent: String,
    pub workspace: PathBuf,
}

/// Decides whether an approval-gated command may run.
/// Any failure to obtain an answer counts as a denial.
#[async_trait]
pub trait ApprovalChannel: Send {
    async fn request(&mut self, request: &ApprovalRequest) -> bool;
}

/// Fixed answer, for non-interactive runs and tests
#[derive(Debug, Clone, Copy)]
pub struct StaticApproval {
    approve: bool,
}

impl StaticApproval {
    pub fn approve() -> Self {
        Self { approve: true }
    }

    pub fn deny() -> Self {
        Self { approve: false }
    }
}

#[async_trait]
impl ApprovalChannel for StaticApproval {
    async fn request(&mut self, request: &ApprovalRequest) -> bool {
        info!(
            command = %request.command,
            approved = self.approve,
            "approval decided by static policy"
        );
        self.approve
    }
}

/// Interactive yes/no/details prompt over any line-oriented stream pair
pub struct PromptApproval<R, W> {
    input: R,
    output: W,
    timeout: Option<Duration>,
}

/// Prompt on the process console
pub type ConsoleApproval = PromptApproval<BufReader<Stdin>, Stdout>;

impl ConsoleApproval {
    pub fn console(timeout: Option<Duration>) -> Self {
        PromptApproval::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), timeout)
    }
}

impl<R, W> PromptApproval<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W, timeout: Option<Duration>) -> Self {
        Self {
            input,
            output,
            timeout,
        }
    }

    /// Consume the prompt and hand back the output sink
    pub fn into_output(self) -> W {
        self.output
    }

    async fn ask(&mut self, request: &ApprovalRequest) -> io::Result<bool> {
        let banner = format!(
            "\nHUMAN APPROVAL REQUIRED ({})\nCommand: {}\nReason: {}\nAgent: {}\n",
            request.risk_level, request.command, request.reason, request.agent
        );
        self.output.write_all(banner.as_bytes()).await?;

        loop {
            self.output
                .write_all(b"\nApprove this command? (yes/no/details): ")
                .await?;
            self.output.flush().await?;

            let mut line = String::new();
            if self.input.read_line(&mut line).await? == 0 {
                // EOF
                return Ok(false);
            }

            match line.trim().to_lowercase().as_str() {
                "yes" | "y" => {
                    self.output.write_all(b"Command approved\n").await?;
                    return Ok(true);
                }
                "no" | "n" => {
                    self.output.write_all(b"Command denied\n").await?;
                    return Ok(false);
                }
                "details" | "d" => {
                    let details = format!(
                        "\nCommand details:\n  Command: {}\n  Safety concern: {}\n  Requesting agent: {}\n  Workspace: {}\n",
                        request.command,
                        request.reason,
                        request.agent,
                        request.workspace.display()
                    );
                    self.output.write_all(details.as_bytes()).await?;
                }
                _ => {
                    self.output
                        .write_all(b"Please respond with 'yes', 'no', or 'details'\n")
                        .await?;
                }
            }
        }
    }
}

#[async_trait]
impl<R, W> ApprovalChannel for PromptApproval<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn request(&mut self, request: &ApprovalRequest) -> bool {
        let answer = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.ask(request)).await {
                Ok(answer) => answer,
                Err(_) => {
                    warn!(command = %request.command, "approval prompt timed out, denying");
                    return false;
                }
            },
            None => self.ask(request).await,
        };

        match answer {
            Ok(approved) => {
                info!(command = %request.command, approved, "approval answered");
                approved
            }
            Err(e) => {
                warn!(command = %request.command, error = %e, "approval prompt failed, denying");
                false
            }
        }
    }
}
