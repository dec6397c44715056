//! Audible siren devices.
//!
//! The console owns exactly one device, injected wherever alerts are
//! observed. Starting an already sounding device is a no-op so overlapping
//! triggers never stack playback.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{info, warn};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AdminError;

pub trait SirenDevice: Send + Sync {
    /// Starts looping playback. Idempotent while already sounding.
    fn start_loop(&self) -> Result<(), AdminError>;

    /// Stops playback immediately and rewinds.
    fn stop(&self);

    fn is_sounding(&self) -> bool;
}

#[cfg(feature = "audio")]
pub use self::audio::RodioSiren;

#[cfg(feature = "audio")]
mod audio {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::PathBuf;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        Arc, Mutex,
    };
    use std::thread;

    use log::{error, warn};
    use rodio::source::SineWave;
    use rodio::{Decoder, OutputStream, Sink, Source};

    use super::SirenDevice;
    use crate::error::AdminError;

    enum SirenCommand {
        Start,
        Stop,
    }

    /// Plays the siren through the default audio output on a dedicated thread.
    pub struct RodioSiren {
        sound: Option<PathBuf>,
        tx: Mutex<Option<Sender<SirenCommand>>>,
        sounding: Arc<AtomicBool>,
    }

    impl RodioSiren {
        /// `sound` is an audio file to loop; `None` plays a generated tone.
        pub fn new(sound: Option<PathBuf>) -> Self {
            Self {
                sound,
                tx: Mutex::new(None),
                sounding: Arc::new(AtomicBool::new(false)),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<SirenCommand>, AdminError> {
            let mut slot = self
                .tx
                .lock()
                .map_err(|e| AdminError::Audio(e.to_string()))?;
            if let Some(tx) = slot.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<SirenCommand>();
            let sounding = Arc::clone(&self.sounding);
            let sound = self.sound.clone();

            // rodio output streams are not Send, so they live on this thread only
            thread::Builder::new()
                .name("siren-audio".to_string())
                .spawn(move || {
                    let mut _stream: Option<OutputStream> = None;
                    let mut sink: Option<Sink> = None;

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            SirenCommand::Start => {
                                if sink.is_some() {
                                    continue;
                                }
                                match open_looping_sink(sound.as_ref()) {
                                    Ok((stream, new_sink)) => {
                                        _stream = Some(stream);
                                        sink = Some(new_sink);
                                    }
                                    Err(err) => {
                                        error!("{err}");
                                        sounding.store(false, Ordering::SeqCst);
                                    }
                                }
                            }
                            SirenCommand::Stop => {
                                if let Some(old) = sink.take() {
                                    old.stop();
                                }
                                _stream = None;
                            }
                        }
                    }
                })
                .map_err(|e| AdminError::Audio(format!("failed to spawn audio thread: {e}")))?;

            *slot = Some(tx.clone());
            Ok(tx)
        }
    }

    fn open_looping_sink(sound: Option<&PathBuf>) -> Result<(OutputStream, Sink), AdminError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| AdminError::Audio(format!("no audio output: {e}")))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| AdminError::Audio(format!("failed to create audio sink: {e}")))?;

        match sound {
            Some(path) => {
                let file = File::open(path)
                    .map_err(|e| AdminError::Audio(format!("{}: {e}", path.display())))?;
                let source = Decoder::new(BufReader::new(file))
                    .map_err(|e| AdminError::Audio(format!("{}: {e}", path.display())))?;
                sink.append(source.repeat_infinite());
            }
            None => sink.append(SineWave::new(880.0).amplify(0.25)),
        }

        Ok((stream, sink))
    }

    impl SirenDevice for RodioSiren {
        fn start_loop(&self) -> Result<(), AdminError> {
            if self.sounding.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            let tx = match self.ensure_thread() {
                Ok(tx) => tx,
                Err(err) => {
                    self.sounding.store(false, Ordering::SeqCst);
                    return Err(err);
                }
            };
            tx.send(SirenCommand::Start).map_err(|_| {
                self.sounding.store(false, Ordering::SeqCst);
                AdminError::Audio("audio thread is gone".to_string())
            })
        }

        fn stop(&self) {
            if !self.sounding.swap(false, Ordering::SeqCst) {
                return;
            }
            let tx = self.tx.lock().ok().and_then(|slot| slot.clone());
            if let Some(tx) = tx {
                if tx.send(SirenCommand::Stop).is_err() {
                    warn!("audio thread is gone; nothing to stop");
                }
            }
        }

        fn is_sounding(&self) -> bool {
            self.sounding.load(Ordering::SeqCst)
        }
    }

}

type BellOutput = Arc<Mutex<Box<dyn Write + Send>>>;

const BELL_PERIOD: Duration = Duration::from_secs(1);

/// Terminal bell for hosts without an audio device. Rings once a second
/// until stopped.
pub struct BellSiren {
    out: BellOutput,
    period: Duration,
    sounding: Arc<AtomicBool>,
    repeat: Mutex<Option<CancellationToken>>,
}

impl Default for BellSiren {
    fn default() -> Self {
        Self::from_writer(Box::new(std::io::stderr()))
    }
}

impl BellSiren {
    fn from_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            period: BELL_PERIOD,
            sounding: Arc::new(AtomicBool::new(false)),
            repeat: Mutex::new(None),
        }
    }

    fn repeat_slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.repeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ring(out: &BellOutput) -> std::io::Result<()> {
    let mut out = out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    out.write_all(b"\x07")?;
    out.flush()
}

impl SirenDevice for BellSiren {
    fn start_loop(&self) -> Result<(), AdminError> {
        if self.sounding.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(err) = ring(&self.out) {
            self.sounding.store(false, Ordering::SeqCst);
            return Err(AdminError::Audio(err.to_string()));
        }

        let token = CancellationToken::new();
        if let Some(previous) = self.repeat_slot().replace(token.clone()) {
            previous.cancel();
        }

        match Handle::try_current() {
            Ok(handle) => {
                let out = Arc::clone(&self.out);
                let period = self.period;
                let next_ring = Instant::now() + period;
                handle.spawn(async move {
                    let mut ticker = tokio::time::interval_at(next_ring, period);
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                if let Err(err) = ring(&out) {
                                    warn!("terminal bell failed: {err}");
                                    break;
                                }
                            }
                            _ = token.cancelled() => break,
                        }
                    }
                });
            }
            Err(_) => warn!("no async runtime; the terminal bell rings once"),
        }

        info!("siren sounding (terminal bell)");
        Ok(())
    }

    fn stop(&self) {
        if let Some(token) = self.repeat_slot().take() {
            token.cancel();
        }
        if self.sounding.swap(false, Ordering::SeqCst) {
            info!("siren silenced");
        }
    }

    fn is_sounding(&self) -> bool {
        self.sounding.load(Ordering::SeqCst)
    }
}
