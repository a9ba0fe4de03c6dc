//! Console device backed by the host terminal.

use std::io::{IsTerminal, Read, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use cpmfat_core::CpmConsole;

const CTRL_Z: u8 = 0x1A;

/// Console over stdout and the keyboard. When stdin is not a terminal,
/// input is read from it byte by byte and its end reads as Ctrl-Z.
pub struct TerminalConsole {
    interactive: bool,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal(),
        }
    }

    fn read_piped(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        match std::io::stdin().read(&mut byte) {
            Ok(1) if byte[0] == b'\n' => 0x0D,
            Ok(1) => byte[0],
            _ => CTRL_Z,
        }
    }

    fn read_terminal(&mut self) -> u8 {
        let raw = enable_raw_mode().is_ok();
        let key = loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if let Some(ch) = translate_key(key.code, key.modifiers) {
                        break ch;
                    }
                }
                Ok(_) => {}
                Err(_) => break CTRL_Z,
            }
        };
        if raw {
            let _ = disable_raw_mode();
        }
        key
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate crossterm key events to console codes. Ctrl-C ends input.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<u8> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            return match c.to_ascii_uppercase() {
                'C' | 'Z' => Some(CTRL_Z),
                upper if upper.is_ascii_uppercase() => Some(upper as u8 - 64),
                _ => None,
            };
        }
    }

    match code {
        KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
        KeyCode::Enter => Some(0x0D),
        KeyCode::Backspace => Some(0x08),
        KeyCode::Tab => Some(0x09),
        KeyCode::Esc => Some(0x1B),
        _ => None,
    }
}

impl CpmConsole for TerminalConsole {
    fn write(&mut self, ch: u8) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = match ch {
            // Backspace
            0x08 => handle.write_all(b"\x08"),
            // Bell
            0x07 => handle.write_all(b"\x07"),
            _ => handle.write_all(&[ch]),
        };
        let _ = handle.flush();
    }

    fn has_key(&self) -> bool {
        self.interactive && event::poll(Duration::from_millis(0)).unwrap_or(false)
    }

    fn get_key(&mut self) -> Option<u8> {
        if self.has_key() {
            return Some(self.read_terminal());
        }
        None
    }

    fn wait_for_key(&mut self) -> u8 {
        if self.interactive {
            self.read_terminal()
        } else {
            self.read_piped()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_key() {
        assert_eq!(translate_key(KeyCode::Char('y'), KeyModifiers::NONE), Some(b'y'));
        assert_eq!(translate_key(KeyCode::Enter, KeyModifiers::NONE), Some(0x0D));
        assert_eq!(translate_key(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(CTRL_Z));
        assert_eq!(translate_key(KeyCode::Char('a'), KeyModifiers::CONTROL), Some(1));
        assert_eq!(translate_key(KeyCode::F(1), KeyModifiers::NONE), None);
    }

    #[test]
    fn test_piped_console_never_polls_keyboard() {
        let mut console = TerminalConsole { interactive: false };
        assert!(!console.has_key());
        assert_eq!(console.get_key(), None);
    }
}
