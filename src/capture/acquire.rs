//! Evidence acquisition: live capture and capture import
//!
//! Stored captures are named `{organization}-{case}-{sequence}.pcap`, where
//! the sequence is one more than the number of evidence files already held
//! for the case. A file is registered in the store only after it has been
//! completely written.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use filetime::FileTime;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument, warn};

use crate::analysis::{Case, EvidenceFile, EvidenceStatus};
use crate::common::{audit, sanitize_component};
use crate::database::EvidenceStore;
use crate::error::{ForensicError, ForensicResult};

/// Only this extension is accepted for import
pub const CAPTURE_EXTENSION: &str = "pcap";

/// Parameters of one live capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub packet_count: u32,
    pub interface: Option<String>,
    /// Target/filter expression tokens, e.g. `["src", "host", "10.0.0.1"]`
    pub filter: Vec<String>,
}

impl CaptureRequest {
    pub fn new(packet_count: u32, interface: Option<String>, filter: Vec<String>) -> ForensicResult<Self> {
        if packet_count == 0 {
            return Err(ForensicError::Format("packet count must be greater than zero".into()));
        }
        Ok(Self { packet_count, interface, filter })
    }

    /// Arguments for the capture tool, writing to `output`
    pub fn tool_args(&self, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-c".into(),
            self.packet_count.to_string().into(),
            "-w".into(),
            output.as_os_str().to_os_string(),
        ];
        if let Some(ref iface) = self.interface {
            args.push("-i".into());
            args.push(iface.into());
        }
        if !self.filter.is_empty() {
            args.push(self.filter.join(" ").into());
        }
        args
    }
}

/// `{organization}-{case}-{sequence}.pcap`
pub fn evidence_filename(organization: &str, case_name: &str, sequence: u64) -> String {
    format!(
        "{}-{}-{}.{}",
        sanitize_component(organization),
        sanitize_component(case_name),
        sequence,
        CAPTURE_EXTENSION
    )
}

/// Whether a path carries the accepted capture extension (case-insensitive)
pub fn has_capture_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(CAPTURE_EXTENSION))
        .unwrap_or(false)
}

/// Brings capture files into evidence storage
pub struct CaptureAcquirer<'a> {
    store: &'a dyn EvidenceStore,
    evidence_dir: PathBuf,
    capture_tool: PathBuf,
    timeout: Duration,
}

impl<'a> CaptureAcquirer<'a> {
    pub fn new(
        store: &'a dyn EvidenceStore,
        evidence_dir: impl Into<PathBuf>,
        capture_tool: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            evidence_dir: evidence_dir.into(),
            capture_tool: capture_tool.into(),
            timeout,
        }
    }

    /// Next free evidence path for a case. Refuses to reuse an existing file.
    fn next_evidence_path(&self, case: &Case) -> ForensicResult<PathBuf> {
        let sequence = self.store.evidence_count(&case.case_name)? + 1;
        let path = self
            .evidence_dir
            .join(evidence_filename(&case.organization_name, &case.case_name, sequence));
        if path.exists() {
            return Err(ForensicError::persist(format!(
                "{} already exists in evidence storage; refusing to overwrite",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Run a live capture and register the result as `collected` evidence
    #[instrument(skip(self, case, request), fields(case = %case.case_name, count = request.packet_count))]
    pub fn capture(&self, case: &Case, request: &CaptureRequest) -> ForensicResult<EvidenceFile> {
        let output = self.next_evidence_path(case)?;
        let args = request.tool_args(&output);
        debug!(tool = %self.capture_tool.display(), ?args, "Starting live capture");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ForensicError::Capture(format!("runtime: {}", e)))?;

        let outcome = runtime.block_on(run_time_boxed(&self.capture_tool, args, self.timeout));
        if let Err(e) = outcome {
            discard_partial(&output);
            return Err(e);
        }
        if !output.is_file() {
            return Err(ForensicError::Capture(format!(
                "capture tool reported success but {} was not written",
                output.display()
            )));
        }

        let size = std::fs::metadata(&output).map(|m| m.len()).ok();
        let evidence = match self
            .store
            .insert_evidence(&case.case_name, &output, EvidenceStatus::Collected)
        {
            Ok(ev) => ev,
            Err(e) => {
                discard_partial(&output);
                return Err(e);
            }
        };

        audit::log_evidence_acquired(&case.case_name, EvidenceStatus::Collected.as_str(), None, &output, size);
        info!(path = %output.display(), "{} packets captured", request.packet_count);
        Ok(evidence)
    }

    /// Copy an external capture into storage as `imported` evidence
    #[instrument(skip(self, case, source), fields(case = %case.case_name, source = %source.display()))]
    pub fn import(&self, case: &Case, source: &Path) -> ForensicResult<EvidenceFile> {
        if !has_capture_extension(source) {
            return Err(ForensicError::Format(format!(
                "{}: only .{} files can be imported",
                source.display(),
                CAPTURE_EXTENSION
            )));
        }
        if !source.is_file() {
            return Err(ForensicError::not_found(format!("capture file {}", source.display())));
        }

        let target = self.next_evidence_path(case)?;
        let bytes = std::fs::copy(source, &target).map_err(|e| {
            discard_partial(&target);
            ForensicError::io(&target, e)
        })?;

        if let Ok(meta) = std::fs::metadata(source) {
            let mtime = FileTime::from_last_modification_time(&meta);
            let atime = FileTime::from_last_access_time(&meta);
            if let Err(e) = filetime::set_file_times(&target, atime, mtime) {
                warn!(error = %e, "Could not preserve source timestamps");
            }
        }

        let evidence = match self
            .store
            .insert_evidence(&case.case_name, &target, EvidenceStatus::Imported)
        {
            Ok(ev) => ev,
            Err(e) => {
                discard_partial(&target);
                return Err(e);
            }
        };

        audit::log_evidence_acquired(
            &case.case_name,
            EvidenceStatus::Imported.as_str(),
            Some(source),
            &target,
            Some(bytes),
        );
        info!(path = %target.display(), bytes, "Capture imported");
        Ok(evidence)
    }
}

/// Run the capture tool, killing it if it outlives `limit`
async fn run_time_boxed(tool: &Path, args: Vec<OsString>, limit: Duration) -> ForensicResult<()> {
    let mut child = tokio::process::Command::new(tool)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ForensicError::Capture(format!("failed to start {}: {}", tool.display(), e)))?;

    let mut stderr_pipe = child.stderr.take();
    let finished = {
        let wait = async {
            let mut stderr = String::new();
            if let Some(ref mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut stderr).await;
            }
            (child.wait().await, stderr)
        };
        tokio::time::timeout(limit, wait).await
    };

    match finished {
        Ok((Ok(status), _)) if status.success() => Ok(()),
        Ok((Ok(status), stderr)) => Err(ForensicError::Capture(format!(
            "{} exited with {}: {}",
            tool.display(),
            status,
            stderr.trim()
        ))),
        Ok((Err(e), _)) => Err(ForensicError::Capture(e.to_string())),
        Err(_) => {
            warn!(timeout_secs = limit.as_secs(), "Capture stalled; killing capture process");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill capture process");
            }
            Err(ForensicError::Capture(format!(
                "timed out after {}s and was killed",
                limit.as_secs()
            )))
        }
    }
}

fn discard_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove partial evidence file");
        }
    }
}
