use tokio::sync::mpsc;

use crate::types::PerGroupResult;

/// Messages the orchestrator emits as a submission progresses. The broadcaster
/// is the only thing that knows how these map onto the sync endpoint's two
/// routes (`/message`, `/group`).
pub enum StatusMessage {
    Compiling(String),
    CompilationError(String, String),
    JudgedTest(String, usize),
    GroupResult(String, usize, PerGroupResult),
    Complete(String),
}

/// Single-consumer task that serializes status updates into HTTP POSTs
/// against the configured sync endpoint. New relative to the teacher (which
/// returns results synchronously over HTTP, with nothing to stream) — built
/// from `tokio::mpsc` + `reqwest`, promoted here to a real dependency since
/// this is core, not test-only, functionality.
pub struct Broadcaster;

impl Broadcaster {
    pub fn spawn(sync_base_url: String) -> Handle {
        let (tx, rx) = mpsc::channel(1024);
        tokio::spawn(run(sync_base_url, rx));
        Handle { tx }
    }
}

async fn run(base_url: String, mut rx: mpsc::Receiver<StatusMessage>) {
    let client = reqwest::Client::new();
    while let Some(msg) = rx.recv().await {
        dispatch(&client, &base_url, msg).await;
    }
}

async fn dispatch(client: &reqwest::Client, base_url: &str, msg: StatusMessage) {
    let (path, body) = match msg {
        StatusMessage::Compiling(id) => (
            "/message",
            serde_json::json!({"SubmissionID": id, "Message": "Compiling"}),
        ),
        StatusMessage::CompilationError(id, reason) => (
            "/message",
            serde_json::json!({"SubmissionID": id, "Message": format!("Compilation Error: {reason}")}),
        ),
        StatusMessage::JudgedTest(id, test_index) => (
            "/message",
            serde_json::json!({"SubmissionID": id, "Message": format!("Judged test #{}", test_index + 1)}),
        ),
        StatusMessage::GroupResult(id, group_index, result) => (
            "/group",
            serde_json::json!({"SubmissionID": id, "GroupIndex": group_index, "Results": result}),
        ),
        StatusMessage::Complete(id) => (
            "/message",
            serde_json::json!({"SubmissionID": id, "Message": "Complete"}),
        ),
    };

    let url = format!("{base_url}{path}");
    match client.post(&url).json(&body).send().await {
        Ok(resp) if !resp.status().is_success() => {
            log::warn!("sync endpoint {url} responded with {}", resp.status());
        }
        Err(e) => log::warn!("failed to post status update to {url}: {e}"),
        _ => {}
    }
}

/// Cheap, cloneable producer handle. Sends never block the grading pipeline
/// for more than a channel push — a full channel logs and drops the update
/// rather than stalling a worker.
#[derive(Clone)]
pub struct Handle {
    tx: mpsc::Sender<StatusMessage>,
}

impl Handle {
    pub fn compiling(&self, submission_id: &str) {
        self.send(StatusMessage::Compiling(submission_id.to_string()));
    }

    pub fn compilation_error(&self, submission_id: &str, reason: &str) {
        self.send(StatusMessage::CompilationError(
            submission_id.to_string(),
            reason.to_string(),
        ));
    }

    pub fn judged_test(&self, submission_id: &str, test_index: usize) {
        self.send(StatusMessage::JudgedTest(
            submission_id.to_string(),
            test_index,
        ));
    }

    pub fn group_result(&self, submission_id: &str, group_index: usize, result: PerGroupResult) {
        self.send(StatusMessage::GroupResult(
            submission_id.to_string(),
            group_index,
            result,
        ));
    }

    pub fn complete(&self, submission_id: &str) {
        self.send(StatusMessage::Complete(submission_id.to_string()));
    }

    fn send(&self, msg: StatusMessage) {
        if self.tx.try_send(msg).is_err() {
            log::warn!("status broadcaster channel full or closed; dropping update");
        }
    }
}
