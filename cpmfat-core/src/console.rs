//! Console I/O.
//!
//! `CpmConsole` is the character device behind the simulated machine's
//! console primitives, with `HeadlessConsole` for tests. `Console` is the
//! utility-side view: line output and prompts issued through the native
//! console calls of the bridge.

use std::collections::VecDeque;

use crate::bdos::{BdosFunction, CTRL_Z, DIRIO_WAIT};
use crate::bridge::Bridge;

/// Console interface for CP/M character I/O.
pub trait CpmConsole {
    /// Write a character to console output.
    fn write(&mut self, ch: u8);

    /// Check if a key is available (non-blocking).
    fn has_key(&self) -> bool;

    /// Get next key from buffer. Returns None if no key available.
    fn get_key(&mut self) -> Option<u8>;

    /// Wait for a key (blocking). End of input is reported as Ctrl-Z.
    fn wait_for_key(&mut self) -> u8 {
        loop {
            if let Some(key) = self.get_key() {
                return key;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}

/// Headless console for testing - captures output, provides queued input.
#[derive(Default)]
pub struct HeadlessConsole {
    output: Vec<u8>,
    input: VecDeque<u8>,
}

impl HeadlessConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-queued input.
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            output: Vec::new(),
            input: input.iter().copied().collect(),
        }
    }

    /// Queue a string as input.
    pub fn queue_string(&mut self, s: &str) {
        self.input.extend(s.bytes());
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output as string (lossy UTF-8 conversion).
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}

impl CpmConsole for HeadlessConsole {
    fn write(&mut self, ch: u8) {
        self.output.push(ch);
    }

    fn has_key(&self) -> bool {
        !self.input.is_empty()
    }

    fn get_key(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn wait_for_key(&mut self) -> u8 {
        self.input.pop_front().unwrap_or(CTRL_Z)
    }
}

const CR: u8 = 0x0D;
const LF: u8 = 0x0A;
const BS: u8 = 0x08;
const DEL: u8 = 0x7F;

/// Line-oriented console over the native console calls.
#[derive(Clone)]
pub struct Console {
    bridge: Bridge,
}

impl Console {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    fn put(&self, ch: u8) {
        self.bridge.bdos(BdosFunction::ConsoleOutput, ch as u16);
    }

    /// Write text, expanding each `\n` to CR LF.
    pub fn print(&self, text: &str) {
        for b in text.bytes() {
            if b == LF {
                self.put(CR);
            }
            self.put(b);
        }
    }

    /// Wait for one key. `None` at end of input.
    pub fn read_key(&self) -> Option<u8> {
        match self.bridge.bdos(BdosFunction::DirectConsoleIO, DIRIO_WAIT) {
            CTRL_Z => None,
            key => Some(key),
        }
    }

    /// Read one line with echo. `None` when input ends before any character.
    pub fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        loop {
            match self.read_key() {
                None if line.is_empty() => return None,
                None | Some(CR) | Some(LF) => break,
                Some(BS) | Some(DEL) => {
                    if line.pop().is_some() {
                        self.print("\x08 \x08");
                    }
                }
                Some(key) if (0x20..0x7F).contains(&key) => {
                    self.put(key);
                    line.push(key as char);
                }
                Some(_) => {}
            }
        }
        Some(line)
    }

    /// Show `prompt` and read a yes/no answer. Only a line starting with
    /// `Y` or `y` confirms; end of input declines.
    pub fn confirm(&self, prompt: &str) -> bool {
        self.print(prompt);
        let answer = self.read_line();
        matches!(answer.as_deref().and_then(|a| a.chars().next()), Some('Y' | 'y'))
    }

    /// BDOS version word of the native system.
    pub fn system_version(&self) -> u16 {
        self.bridge.bdos_word(BdosFunction::ReturnVersion, 0)
    }
}
