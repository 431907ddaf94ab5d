//! Text-to-speech playback
//!
//! Playback is handed to an external program. Callers learn about progress by
//! draining [`SpeechEvent`]s with [`Speaker::poll_events`].

use std::collections::VecDeque;
use std::io::Write;
use std::process::{Child, Command, Stdio};

use anyhow::{anyhow, Result};

/// Characters used for markdown emphasis, dropped before speaking.
const MARKUP_CHARS: [char; 4] = ['*', '_', '`', '~'];

pub fn strip_markup(text: &str) -> String {
    text.chars().filter(|c| !MARKUP_CHARS.contains(c)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Ended,
    Failed(String),
}

pub trait Speaker: Send {
    /// Start speaking `text`, replacing any current utterance.
    fn speak(&mut self, text: &str);
    fn pause(&mut self);
    fn resume(&mut self);
    fn cancel(&mut self);
    fn is_speaking(&mut self) -> bool;
    fn poll_events(&mut self) -> Vec<SpeechEvent>;
}

/// Speaks nothing. Used when no TTS program is available.
#[derive(Debug, Default)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn speak(&mut self, _text: &str) {}
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn cancel(&mut self) {}
    fn is_speaking(&mut self) -> bool {
        false
    }
    fn poll_events(&mut self) -> Vec<SpeechEvent> {
        Vec::new()
    }
}

/// Runs `program args...` per utterance and writes the text to its stdin.
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
    events: VecDeque<SpeechEvent>,
}

impl CommandSpeaker {
    /// `command` is the program followed by its leading arguments.
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("Speech command is empty"))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            child: None,
            events: VecDeque::new(),
        })
    }

    /// Platform default: `say` on macOS, `espeak --stdin` elsewhere.
    pub fn platform_default() -> Self {
        let (program, args) = if cfg!(target_os = "macos") {
            ("say", Vec::new())
        } else {
            ("espeak", vec!["--stdin".to_string()])
        };
        Self {
            program: program.to_string(),
            args,
            child: None,
            events: VecDeque::new(),
        }
    }

    fn signal(&self, signal: &str) {
        let Some(child) = &self.child else { return };

        if cfg!(unix) {
            let status = Command::new("kill")
                .arg(signal)
                .arg(child.id().to_string())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if let Err(e) = status {
                log::warn!("Could not send {signal} to speech process: {e}");
            }
        } else {
            log::debug!("Pausing speech is not supported on this platform");
        }
    }

    fn reap(&mut self) {
        let Some(child) = self.child.as_mut() else { return };

        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) if status.success() => {
                self.child = None;
                self.events.push_back(SpeechEvent::Ended);
            }
            Ok(Some(status)) => {
                self.child = None;
                self.events
                    .push_back(SpeechEvent::Failed(format!("{} exited with {}", self.program, status)));
            }
            Err(e) => {
                self.child = None;
                self.events.push_back(SpeechEvent::Failed(e.to_string()));
            }
        }
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, text: &str) {
        self.cancel();

        // Text on stdin, so replies starting with `-` are never parsed as options
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                log::debug!("Speaking with {} (pid {})", self.program, child.id());
                if let Some(mut stdin) = child.stdin.take() {
                    let text = strip_markup(text);
                    std::thread::spawn(move || {
                        if let Err(e) = stdin.write_all(text.as_bytes()) {
                            log::debug!("Speech input closed early: {e}");
                        }
                    });
                }
                self.child = Some(child);
                self.events.push_back(SpeechEvent::Started);
            }
            Err(e) => {
                log::warn!("Could not start {}: {}", self.program, e);
                self.events.push_back(SpeechEvent::Failed(e.to_string()));
            }
        }
    }

    fn pause(&mut self) {
        self.signal("-STOP");
    }

    fn resume(&mut self) {
        self.signal("-CONT");
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            self.events.push_back(SpeechEvent::Ended);
        }
    }

    fn is_speaking(&mut self) -> bool {
        self.reap();
        self.child.is_some()
    }

    fn poll_events(&mut self) -> Vec<SpeechEvent> {
        self.reap();
        self.events.drain(..).collect()
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        self.cancel();
    }
}
