use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;

use super::{OcrError, OcrLanguage, OcrResult, TextRecognizer};

/// Pixels under a freshly created region, bound for recognition.
#[derive(Debug, Clone)]
pub struct RecognitionJob {
    pub region_id: u64,
    pub pixels: RgbaImage,
}

#[derive(Debug)]
pub struct RecognitionOutcome {
    pub region_id: u64,
    pub result: OcrResult<String>,
}

/// Runs recognition jobs on worker threads and queues their outcomes.
///
/// Workers never touch editor state. Outcomes wait in the channel until the
/// owning thread drains them with [`try_next`](Self::try_next) or
/// [`next_timeout`](Self::next_timeout) and decides whether they still apply.
pub struct RecognitionDispatcher {
    recognizer: Option<Arc<dyn TextRecognizer>>,
    language: OcrLanguage,
    tx: Sender<RecognitionOutcome>,
    rx: Receiver<RecognitionOutcome>,
    in_flight: usize,
}

impl RecognitionDispatcher {
    pub fn new(recognizer: Option<Arc<dyn TextRecognizer>>, language: OcrLanguage) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            recognizer,
            language,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn language(&self) -> OcrLanguage {
        self.language
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Queues `job`. Without a recognizer the job fails immediately with
    /// [`OcrError::Unavailable`] through the same outcome channel.
    pub fn dispatch(&mut self, job: RecognitionJob) {
        self.in_flight += 1;
        let RecognitionJob { region_id, pixels } = job;

        let Some(recognizer) = self.recognizer.clone() else {
            tracing::debug!(region_id, "no recognizer configured");
            let _ = self.tx.send(RecognitionOutcome {
                region_id,
                result: Err(OcrError::Unavailable),
            });
            return;
        };

        let tx = self.tx.clone();
        let language = self.language;
        tracing::debug!(region_id, language = language.as_str(), "dispatching recognition");
        std::thread::spawn(move || {
            let result = recognizer
                .recognize(&pixels, language)
                .map(|text| text.trim().to_string());
            let _ = tx.send(RecognitionOutcome { region_id, result });
        });
    }

    pub fn try_next(&mut self) -> Option<RecognitionOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(self.settle(outcome)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Blocks for at most `timeout` waiting for the next outcome.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<RecognitionOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Some(self.settle(outcome)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn settle(&mut self, outcome: RecognitionOutcome) -> RecognitionOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        outcome
    }
}

impl std::fmt::Debug for RecognitionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionDispatcher")
            .field("available", &self.is_available())
            .field("language", &self.language)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    struct EchoDimensions;

    impl TextRecognizer for EchoDimensions {
        fn recognize(&self, image: &RgbaImage, language: OcrLanguage) -> OcrResult<String> {
            Ok(format!("  {}x{} {}\n", image.width(), image.height(), language.as_str()))
        }
    }

    struct AlwaysFails;

    impl TextRecognizer for AlwaysFails {
        fn recognize(&self, _image: &RgbaImage, _language: OcrLanguage) -> OcrResult<String> {
            Err(OcrError::Recognition {
                message: "model crashed".to_string(),
            })
        }
    }

    fn job(region_id: u64) -> RecognitionJob {
        RecognitionJob {
            region_id,
            pixels: RgbaImage::new(12, 7),
        }
    }

    #[test]
    fn dispatch_delivers_trimmed_text_for_the_job_region() {
        let mut dispatcher =
            RecognitionDispatcher::new(Some(Arc::new(EchoDimensions)), OcrLanguage::Chinese);
        dispatcher.dispatch(job(42));
        assert_eq!(dispatcher.in_flight(), 1);

        let outcome = dispatcher.next_timeout(WAIT).expect("worker should finish");
        assert_eq!(outcome.region_id, 42);
        assert_eq!(outcome.result.unwrap(), "12x7 chinese");
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn missing_recognizer_fails_without_spawning() {
        let mut dispatcher = RecognitionDispatcher::new(None, OcrLanguage::English);
        assert!(!dispatcher.is_available());
        dispatcher.dispatch(job(3));

        let outcome = dispatcher.try_next().expect("failure is queued immediately");
        assert_eq!(outcome.region_id, 3);
        assert!(matches!(outcome.result, Err(OcrError::Unavailable)));
    }

    #[test]
    fn recognizer_errors_are_reported_as_outcomes() {
        let mut dispatcher =
            RecognitionDispatcher::new(Some(Arc::new(AlwaysFails)), OcrLanguage::English);
        dispatcher.dispatch(job(8));
        let outcome = dispatcher.next_timeout(WAIT).expect("worker should finish");
        assert!(matches!(outcome.result, Err(OcrError::Recognition { .. })));
    }

    #[test]
    fn next_timeout_returns_immediately_when_idle() {
        let mut dispatcher = RecognitionDispatcher::new(None, OcrLanguage::English);
        assert!(dispatcher.next_timeout(WAIT).is_none());
        assert!(dispatcher.try_next().is_none());
    }
}
