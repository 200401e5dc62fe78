// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Lifecycle management for the source parsing engine.
//!
//! Extraction goes through a [`TextStructureExtractor`], which may need an
//! expensive one-time setup before it can parse. [`Engine`] owns one
//! extractor and tracks its lifecycle (`Uninitialized` → `Initializing` →
//! `Ready`), making sure that concurrent callers share a single
//! initialization instead of each starting their own.
//!
//! The built-in [`PythonExtractor`] needs no setup, so its engine becomes
//! ready on first use. Tests and embedders can plug in their own extractor.

use crate::parser::{self, ParseError, ParsedExport};
use log::{debug, warn};
use snafu::prelude::*;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Error raised when an extractor fails to initialize.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum InitError {
    /// The extractor could not be brought up.
    #[snafu(display("failed to initialize parsing engine: {message}"))]
    Unavailable {
        /// Why initialization failed.
        message: String,
    },
}

/// Something that can turn export source text into a conversation.
pub trait TextStructureExtractor: Send + Sync {
    /// Performs one-time setup. Called at most once per successful
    /// [`Engine`] lifecycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the extractor cannot be made ready.
    fn initialize(&self) -> Result<(), InitError>;

    /// Extracts the conversation from `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be parsed or has no usable
    /// `contents` list.
    fn parse(&self, source: &str) -> Result<ParsedExport, ParseError>;
}

/// The built-in extractor, backed by the crate's own Python parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonExtractor;

impl TextStructureExtractor for PythonExtractor {
    fn initialize(&self) -> Result<(), InitError> {
        Ok(())
    }

    fn parse(&self, source: &str) -> Result<ParsedExport, ParseError> {
        parser::parse_export(source)
    }
}

/// Observable lifecycle state of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Initialization has not been attempted, or the last attempt failed.
    Uninitialized,
    /// An initialization is in flight.
    Initializing,
    /// The extractor is ready to parse.
    Ready,
}

/// What to do when extraction is requested before the engine is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadyPolicy {
    /// Initialize (or wait for the in-flight initialization) first.
    #[default]
    Wait,
    /// Refuse with [`EngineError::NotReady`].
    FailFast,
}

/// Error type for [`Engine::extract`].
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum EngineError {
    /// The engine was not ready and the policy said not to wait.
    #[snafu(display("Parsing engine is not ready. Please wait for initialization to complete."))]
    NotReady,

    /// Initialization was attempted and failed.
    #[snafu(transparent)]
    Init {
        /// The initialization failure.
        source: InitError,
    },

    /// The extractor rejected the source.
    #[snafu(transparent)]
    Parse {
        /// The extraction failure.
        source: ParseError,
    },
}

#[derive(Debug)]
enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
    Failed(InitError),
}

/// An extractor together with its lifecycle.
#[derive(Debug)]
pub struct Engine<E> {
    extractor: E,
    state: Mutex<Lifecycle>,
    changed: Condvar,
}

impl Default for Engine<PythonExtractor> {
    fn default() -> Self {
        Self::new(PythonExtractor)
    }
}

impl<E> Engine<E> {
    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ends an in-flight initialization and wakes everyone waiting on it.
    fn settle(&self, next: Lifecycle) {
        *self.lock() = next;
        self.changed.notify_all();
    }
}

/// Settles an in-flight initialization even if the extractor panics.
struct InFlight<'a, E> {
    engine: &'a Engine<E>,
    settled: bool,
}

impl<E> InFlight<'_, E> {
    fn settle(mut self, next: Lifecycle) {
        self.settled = true;
        self.engine.settle(next);
    }
}

impl<E> Drop for InFlight<'_, E> {
    fn drop(&mut self) {
        if !self.settled {
            self.engine.settle(Lifecycle::Failed(InitError::Unavailable {
                message: "extractor panicked during initialization".to_owned(),
            }));
        }
    }
}

impl<E: TextStructureExtractor> Engine<E> {
    /// Wraps `extractor` in an uninitialized engine.
    pub const fn new(extractor: E) -> Self {
        Self {
            extractor,
            state: Mutex::new(Lifecycle::Uninitialized),
            changed: Condvar::new(),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> EngineState {
        match *self.lock() {
            Lifecycle::Uninitialized | Lifecycle::Failed(_) => EngineState::Uninitialized,
            Lifecycle::Initializing => EngineState::Initializing,
            Lifecycle::Ready => EngineState::Ready,
        }
    }

    /// Whether [`Engine::extract`] can run without initializing first.
    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Brings the extractor up, or waits for an initialization already in
    /// flight.
    ///
    /// Returns immediately once ready. Callers arriving during an in-flight
    /// initialization block until it finishes and receive its outcome. A
    /// failure leaves the engine uninitialized, so a later call retries.
    ///
    /// # Errors
    ///
    /// Returns the extractor's initialization error.
    pub fn initialize(&self) -> Result<(), InitError> {
        let mut state = self.lock();
        let mut waited = false;
        loop {
            match &*state {
                Lifecycle::Ready => return Ok(()),
                Lifecycle::Failed(err) if waited => return Err(err.clone()),
                Lifecycle::Uninitialized | Lifecycle::Failed(_) => break,
                Lifecycle::Initializing => {}
            }
            waited = true;
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state = Lifecycle::Initializing;
        drop(state);

        debug!("initializing parsing engine");
        let in_flight = InFlight {
            engine: self,
            settled: false,
        };
        let outcome = self.extractor.initialize();

        in_flight.settle(match &outcome {
            Ok(()) => Lifecycle::Ready,
            Err(err) => {
                warn!("{err}");
                Lifecycle::Failed(err.clone())
            }
        });
        outcome
    }

    /// Extracts the conversation from `source` under the given readiness
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotReady`] under [`ReadyPolicy::FailFast`] when
    /// the engine is not ready, or the initialization or extraction error.
    pub fn extract(&self, source: &str, policy: ReadyPolicy) -> Result<ParsedExport, EngineError> {
        match policy {
            ReadyPolicy::Wait => self.initialize()?,
            ReadyPolicy::FailFast => ensure!(self.is_ready(), NotReadySnafu),
        }
        Ok(self.extractor.parse(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, mpsc};
    use std::thread;
    use std::time::Duration;

    /// Extractor that counts initializations and can fail the first few.
    #[derive(Default)]
    struct FakeExtractor {
        inits: AtomicUsize,
        failures_left: AtomicUsize,
        delay: Duration,
    }

    impl FakeExtractor {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                ..Self::default()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn inits(&self) -> usize {
            self.inits.load(Ordering::SeqCst)
        }
    }

    impl TextStructureExtractor for FakeExtractor {
        fn initialize(&self) -> Result<(), InitError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return UnavailableSnafu {
                    message: "runtime download failed",
                }
                .fail();
            }
            Ok(())
        }

        fn parse(&self, _source: &str) -> Result<ParsedExport, ParseError> {
            Ok(ParsedExport::default())
        }
    }

    #[test]
    fn starts_uninitialized() {
        let engine = Engine::new(FakeExtractor::default());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(!engine.is_ready());
    }

    #[test]
    fn initialize_is_idempotent() {
        let engine = Engine::new(FakeExtractor::default());
        engine.initialize().unwrap();
        engine.initialize().unwrap();

        assert!(engine.is_ready());
        assert_eq!(engine.extractor.inits(), 1);
    }

    #[test]
    fn concurrent_initialization_runs_once() {
        let engine = Arc::new(Engine::new(FakeExtractor::slow(Duration::from_millis(50))));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    engine.initialize()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(engine.extractor.inits(), 1);
        assert_eq!(engine.state(), EngineState::Ready);
    }

    /// Extractor whose initialization blocks until released, then fails.
    struct Gated {
        inits: AtomicUsize,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl TextStructureExtractor for Gated {
        fn initialize(&self) -> Result<(), InitError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            let _ = self.release.lock().unwrap().recv();
            UnavailableSnafu {
                message: "gate closed",
            }
            .fail()
        }

        fn parse(&self, _source: &str) -> Result<ParsedExport, ParseError> {
            Ok(ParsedExport::default())
        }
    }

    #[test]
    fn waiters_share_the_failure() {
        let (release, gate) = mpsc::channel();
        let engine = Arc::new(Engine::new(Gated {
            inits: AtomicUsize::new(0),
            release: Mutex::new(gate),
        }));

        let initiator = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.initialize())
        };
        while engine.state() != EngineState::Initializing {
            thread::yield_now();
        }

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || engine.initialize())
            })
            .collect();
        thread::sleep(Duration::from_millis(100));
        release.send(()).unwrap();

        let expected = initiator.join().unwrap().unwrap_err();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap().unwrap_err(), expected);
        }
        assert_eq!(engine.extractor.inits.load(Ordering::SeqCst), 1);
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn failure_is_surfaced_and_retry_is_manual() {
        let engine = Engine::new(FakeExtractor::failing(1));

        let err = engine.initialize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to initialize parsing engine: runtime download failed"
        );
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(engine.extractor.inits(), 1);

        engine.initialize().unwrap();
        assert!(engine.is_ready());
        assert_eq!(engine.extractor.inits(), 2);
    }

    /// Extractor that panics on its first initialization.
    #[derive(Default)]
    struct PanicsOnce {
        calls: AtomicUsize,
    }

    impl TextStructureExtractor for PanicsOnce {
        fn initialize(&self) -> Result<(), InitError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("extractor crashed");
            }
            Ok(())
        }

        fn parse(&self, _source: &str) -> Result<ParsedExport, ParseError> {
            Ok(ParsedExport::default())
        }
    }

    #[test]
    fn panicking_initialization_can_be_retried() {
        let engine = Arc::new(Engine::new(PanicsOnce::default()));

        let crashed = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.initialize()).join()
        };
        assert!(crashed.is_err());
        assert_eq!(engine.state(), EngineState::Uninitialized);

        let (done, finished) = mpsc::channel();
        {
            let engine = Arc::clone(&engine);
            thread::spawn(move || done.send(engine.initialize()));
        }
        let retried = finished.recv_timeout(Duration::from_secs(2));
        assert_eq!(retried, Ok(Ok(())));
        assert!(engine.is_ready());
    }

    #[test]
    fn waiter_sees_panic_as_failure() {
        let engine = Engine::new(PanicsOnce::default());
        *engine.lock() = Lifecycle::Initializing;

        thread::scope(|scope| {
            let waiter = scope.spawn(|| engine.initialize());
            thread::sleep(Duration::from_millis(50));
            let in_flight = InFlight {
                engine: &engine,
                settled: false,
            };
            drop(in_flight);

            let err = waiter.join().unwrap().unwrap_err();
            assert!(err.to_string().contains("panicked"));
        });
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn fail_fast_refuses_before_ready() {
        let engine = Engine::new(FakeExtractor::default());

        let err = engine.extract("contents = []", ReadyPolicy::FailFast).unwrap_err();
        assert_eq!(err, EngineError::NotReady);
        assert_eq!(engine.extractor.inits(), 0);

        engine.initialize().unwrap();
        assert!(engine.extract("contents = []", ReadyPolicy::FailFast).is_ok());
    }

    #[test]
    fn wait_policy_initializes_on_demand() {
        let engine = Engine::new(FakeExtractor::default());

        assert!(engine.extract("contents = []", ReadyPolicy::Wait).is_ok());
        assert!(engine.is_ready());
        assert_eq!(engine.extractor.inits(), 1);
    }

    #[test]
    fn wait_policy_surfaces_init_failure() {
        let engine = Engine::new(FakeExtractor::failing(1));

        let err = engine.extract("contents = []", ReadyPolicy::Wait).unwrap_err();
        assert!(matches!(err, EngineError::Init { .. }));
    }

    #[test]
    fn python_extractor_parses_through_engine() {
        let engine = Engine::default();
        let parsed = engine
            .extract(
                "contents = [types.Content(role='user', parts=[types.Part.from_text(text='Hi')])]",
                ReadyPolicy::Wait,
            )
            .unwrap();
        assert_eq!(parsed.messages.len(), 1);

        let err = engine.extract("x = 1", ReadyPolicy::FailFast).unwrap_err();
        assert_eq!(
            err,
            EngineError::Parse {
                source: ParseError::NotFound
            }
        );
    }
}
