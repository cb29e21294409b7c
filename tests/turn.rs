//! End-to-end turn driver tests
//!
//! These run the driver loop on a paused tokio clock against mock
//! collaborators that record every call, so full listen/send/speak
//! cycles complete instantly and in a deterministic order.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use kotoba_gateway::turn::{
    ChatBackend, SpeechRecognizer, SpeechSynthesizer, TtsOutcome, TurnDriver, TurnHandle,
    TurnTiming,
};
use kotoba_gateway::{Error, Result};

type CallLog = Arc<Mutex<Vec<String>>>;

fn log(calls: &CallLog, entry: impl Into<String>) {
    calls.lock().unwrap().push(entry.into());
}

fn snapshot(calls: &CallLog) -> Vec<String> {
    calls.lock().unwrap().clone()
}

/// Wait until the call log satisfies a predicate
///
/// Sleeps auto-advance under the paused clock, so this resolves as soon
/// as the driver and its spawned effect tasks go idle.
async fn wait_for(calls: &CallLog, pred: impl Fn(&[String]) -> bool) {
    for _ in 0..200 {
        if pred(&calls.lock().unwrap()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition never met; calls: {:?}", snapshot(calls));
}

struct MockRecognizer {
    calls: CallLog,
    /// Number of `start` calls that fail before one succeeds
    failures: Mutex<usize>,
}

impl MockRecognizer {
    fn new(calls: CallLog) -> Self {
        Self {
            calls,
            failures: Mutex::new(0),
        }
    }

    fn failing_first(calls: CallLog, failures: usize) -> Self {
        Self {
            calls,
            failures: Mutex::new(failures),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn start(&self) -> Result<()> {
        log(&self.calls, "recognizer.start");
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(Error::Recognizer("audio device busy".to_string()));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        log(&self.calls, "recognizer.stop");
        Ok(())
    }
}

struct MockBackend {
    calls: CallLog,
    reply: String,
    /// Sends block until a permit is added; starts open unless gated
    gate: Semaphore,
}

impl MockBackend {
    fn new(calls: CallLog, reply: &str) -> Self {
        Self {
            calls,
            reply: reply.to_string(),
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
        }
    }

    fn gated(calls: CallLog, reply: &str) -> Self {
        Self {
            calls,
            reply: reply.to_string(),
            gate: Semaphore::new(0),
        }
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn send(&self, utterance: &str) -> Result<String> {
        log(&self.calls, format!("backend.send:{utterance}"));
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| Error::Chat("backend closed".to_string()))?;
        Ok(self.reply.clone())
    }
}

struct MockSynthesizer {
    calls: CallLog,
    /// When gated, `speak` blocks until `stop` is called and resolves
    /// `Stopped`, mimicking cancelled playback
    gate: Option<Semaphore>,
}

impl MockSynthesizer {
    fn new(calls: CallLog) -> Self {
        Self { calls, gate: None }
    }

    fn blocking(calls: CallLog) -> Self {
        Self {
            calls,
            gate: Some(Semaphore::new(0)),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn speak(&self, text: &str) -> Result<TtsOutcome> {
        log(&self.calls, format!("synthesizer.speak:{text}"));
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| Error::Tts("synthesizer closed".to_string()))?;
            return Ok(TtsOutcome::Stopped);
        }
        Ok(TtsOutcome::Completed)
    }

    async fn stop(&self) -> Result<()> {
        log(&self.calls, "synthesizer.stop");
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
        Ok(())
    }
}

fn spawn_driver(
    recognizer: Arc<MockRecognizer>,
    backend: Arc<MockBackend>,
    synthesizer: Arc<MockSynthesizer>,
) -> (TurnHandle, tokio::task::JoinHandle<()>) {
    let (driver, handle) = TurnDriver::new(TurnTiming::default(), recognizer, backend, synthesizer);
    let task = tokio::spawn(driver.run());
    (handle, task)
}

fn count(calls: &[String], entry: &str) -> usize {
    calls.iter().filter(|c| c.as_str() == entry).count()
}

#[tokio::test(start_paused = true)]
async fn test_full_turn_cycle() {
    let calls: CallLog = Arc::default();
    let recognizer = Arc::new(MockRecognizer::new(calls.clone()));
    let backend = Arc::new(MockBackend::new(calls.clone(), "hello back"));
    let synthesizer = Arc::new(MockSynthesizer::new(calls.clone()));
    let (handle, _task) = spawn_driver(recognizer, backend, synthesizer);

    handle.start_session().await.unwrap();
    wait_for(&calls, |c| count(c, "recognizer.start") == 1).await;
    handle.partial_transcript("hello").await.unwrap();

    // Silence window elapses, the utterance goes out, the reply is
    // spoken, and after the resume delay the recognizer restarts
    wait_for(&calls, |c| count(c, "recognizer.start") == 2).await;

    let calls = snapshot(&calls);
    assert_eq!(
        calls,
        vec![
            "recognizer.start",
            "backend.send:hello",
            "recognizer.stop",
            "synthesizer.speak:hello back",
            "recognizer.start",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_utterance_during_send_is_dropped() {
    let calls: CallLog = Arc::default();
    let recognizer = Arc::new(MockRecognizer::new(calls.clone()));
    let backend = Arc::new(MockBackend::gated(calls.clone(), "reply"));
    let synthesizer = Arc::new(MockSynthesizer::new(calls.clone()));
    let (handle, _task) = spawn_driver(recognizer, backend.clone(), synthesizer);

    handle.start_session().await.unwrap();
    wait_for(&calls, |c| count(c, "recognizer.start") == 1).await;
    handle.partial_transcript("first").await.unwrap();
    wait_for(&calls, |c| count(c, "backend.send:first") == 1).await;

    // More speech while the first send is still pending; its silence
    // window elapses but no second send goes out
    handle.partial_transcript("second").await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(count(&snapshot(&calls), "backend.send:second"), 0);

    backend.release();
    wait_for(&calls, |c| count(c, "synthesizer.speak:reply") == 1).await;
    assert_eq!(count(&snapshot(&calls), "backend.send:second"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_barge_in_cancels_playback() {
    let calls: CallLog = Arc::default();
    let recognizer = Arc::new(MockRecognizer::new(calls.clone()));
    let backend = Arc::new(MockBackend::new(calls.clone(), "a long reply"));
    let synthesizer = Arc::new(MockSynthesizer::blocking(calls.clone()));
    let (handle, _task) = spawn_driver(recognizer, backend, synthesizer);

    handle.start_session().await.unwrap();
    wait_for(&calls, |c| count(c, "recognizer.start") == 1).await;
    handle.partial_transcript("hi").await.unwrap();
    wait_for(&calls, |c| count(c, "synthesizer.speak:a long reply") == 1).await;

    // User speaks over the playback: it is cancelled and the
    // recognizer restarts
    handle.partial_transcript("wait").await.unwrap();
    wait_for(&calls, |c| count(c, "synthesizer.stop") == 1).await;
    wait_for(&calls, |c| count(c, "recognizer.start") == 2).await;

    // The restarted recognizer keeps streaming the interruption, which
    // commits as the next utterance
    handle.partial_transcript("wait a moment").await.unwrap();
    wait_for(&calls, |c| count(c, "backend.send:wait a moment") == 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_recognizer_start_retries_after_failure() {
    let calls: CallLog = Arc::default();
    let recognizer = Arc::new(MockRecognizer::failing_first(calls.clone(), 2));
    let backend = Arc::new(MockBackend::new(calls.clone(), "reply"));
    let synthesizer = Arc::new(MockSynthesizer::new(calls.clone()));
    let (handle, _task) = spawn_driver(recognizer, backend, synthesizer);

    handle.start_session().await.unwrap();

    // Two failed starts, each retried after the fixed delay
    wait_for(&calls, |c| count(c, "recognizer.start") == 3).await;
}

#[tokio::test(start_paused = true)]
async fn test_no_speech_error_does_not_retry() {
    let calls: CallLog = Arc::default();
    let recognizer = Arc::new(MockRecognizer::new(calls.clone()));
    let backend = Arc::new(MockBackend::new(calls.clone(), "reply"));
    let synthesizer = Arc::new(MockSynthesizer::new(calls.clone()));
    let (handle, _task) = spawn_driver(recognizer, backend, synthesizer);

    handle.start_session().await.unwrap();
    wait_for(&calls, |c| count(c, "recognizer.start") == 1).await;

    handle.recognizer_error("No speech detected").await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(count(&snapshot(&calls), "recognizer.start"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_session_stops_recognizer() {
    let calls: CallLog = Arc::default();
    let recognizer = Arc::new(MockRecognizer::new(calls.clone()));
    let backend = Arc::new(MockBackend::new(calls.clone(), "reply"));
    let synthesizer = Arc::new(MockSynthesizer::new(calls.clone()));
    let (handle, _task) = spawn_driver(recognizer, backend, synthesizer);

    handle.start_session().await.unwrap();
    wait_for(&calls, |c| count(c, "recognizer.start") == 1).await;
    handle.partial_transcript("hm").await.unwrap();

    handle.stop_session().await.unwrap();
    wait_for(&calls, |c| count(c, "recognizer.stop") == 1).await;

    // The armed silence timer was cancelled: no send ever goes out
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(
        snapshot(&calls)
            .iter()
            .all(|c| !c.starts_with("backend.send")),
        "calls: {:?}",
        snapshot(&calls)
    );
}

#[tokio::test(start_paused = true)]
async fn test_driver_exits_when_handles_drop() {
    let calls: CallLog = Arc::default();
    let recognizer = Arc::new(MockRecognizer::new(calls.clone()));
    let backend = Arc::new(MockBackend::new(calls.clone(), "reply"));
    let synthesizer = Arc::new(MockSynthesizer::new(calls.clone()));
    let (handle, task) = spawn_driver(recognizer, backend, synthesizer);

    handle.start_session().await.unwrap();
    handle.stop_session().await.unwrap();
    drop(handle);

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("driver loop should exit once all handles drop")
        .unwrap();
}
