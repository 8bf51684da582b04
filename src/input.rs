use crossterm::event::{poll, read, Event, KeyCode};
use crossterm::terminal;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;
use crate::interpreter::{Chip8Interpreter, KEY_COUNT};
use crate::video::Framebuffer;

/// what a key on the host keyboard does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlButton {
    /// one of the 16 keypad keys
    Hex(u8),
    Quit,
    Pause,
    Step,
}

/// keypad on the left-hand side of a qwerty keyboard, plus emulator controls
const CHIP8_CONVENTIONAL_KEYMAP: [(char, ControlButton); 19] = [
    ('x', ControlButton::Hex(0x00)),
    ('1', ControlButton::Hex(0x01)),
    ('2', ControlButton::Hex(0x02)),
    ('3', ControlButton::Hex(0x03)),
    ('q', ControlButton::Hex(0x04)),
    ('w', ControlButton::Hex(0x05)),
    ('e', ControlButton::Hex(0x06)),
    ('a', ControlButton::Hex(0x07)),
    ('s', ControlButton::Hex(0x08)),
    ('d', ControlButton::Hex(0x09)),
    ('z', ControlButton::Hex(0x0a)),
    ('c', ControlButton::Hex(0x0b)),
    ('4', ControlButton::Hex(0x0c)),
    ('r', ControlButton::Hex(0x0d)),
    ('f', ControlButton::Hex(0x0e)),
    ('v', ControlButton::Hex(0x0f)),
    (' ', ControlButton::Pause),
    ('h', ControlButton::Quit),
    ('i', ControlButton::Step),
];

/// fold ASCII upper case letters to lower case, leave everything else alone
pub fn to_lower(key: char) -> char {
    if key.is_ascii_uppercase() {
        key.to_ascii_lowercase()
    } else {
        key
    }
}

/// case-insensitive lookup from host keys to controls
pub struct KeyMap {
    keys: HashMap<char, ControlButton>,
}

impl KeyMap {
    pub fn new(config: &[(char, ControlButton)]) -> Self {
        KeyMap {
            keys: config.iter().map(|(c, b)| (to_lower(*c), *b)).collect(),
        }
    }

    pub fn get(&self, key: char) -> Option<ControlButton> {
        self.keys.get(&to_lower(key)).copied()
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        KeyMap::new(&CHIP8_CONVENTIONAL_KEYMAP)
    }
}

/// reads keypresses
pub trait Input {
    /// drain every control pressed since the last call
    fn poll_controls(&mut self) -> Result<Vec<ControlButton>>;
}

/// Input from the terminal, using crossterm in raw mode. Terminals only report
/// key-down (and auto-repeat), never key-up.
pub struct StdinInput {
    keymap: KeyMap,
}

impl StdinInput {
    pub fn new(keymap: KeyMap) -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(StdinInput { keymap })
    }
}

impl Drop for StdinInput {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("could not leave raw mode: {}", e);
        }
    }
}

impl Input for StdinInput {
    fn poll_controls(&mut self) -> Result<Vec<ControlButton>> {
        let mut controls = Vec::new();
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => match evt.code {
                    KeyCode::Char(key) => match self.keymap.get(key) {
                        Some(control) => controls.push(control),
                        None => log::warn!("can't map {:?} to a keypad key", key),
                    },
                    KeyCode::Esc => controls.push(ControlButton::Quit),
                    code => log::warn!("unmapped key event {:?}", code),
                },
                _ => log::debug!("ignoring non-key terminal event"),
            }
        }
        Ok(controls)
    }
}

/// dummy Input implementation for testing; hands out one batch per call
pub struct DummyInput {
    batches: Vec<Vec<ControlButton>>,
}

impl DummyInput {
    pub fn new(mut batches: Vec<Vec<ControlButton>>) -> Self {
        batches.reverse();
        DummyInput { batches }
    }
}

impl Input for DummyInput {
    fn poll_controls(&mut self) -> Result<Vec<ControlButton>> {
        Ok(self.batches.pop().unwrap_or_default())
    }
}

/// Turns key-down-only events into held keys: a pressed key stays down on the
/// machine for `hold_frames` frames after its last event, then is released.
pub struct KeyLatch {
    hold_frames: u32,
    remaining: [u32; KEY_COUNT],
}

impl KeyLatch {
    pub fn new(hold_frames: u32) -> Self {
        KeyLatch {
            hold_frames,
            remaining: [0; KEY_COUNT],
        }
    }

    /// press any keys in `controls`, age the rest; call once per frame
    pub fn update<F: Framebuffer>(
        &mut self,
        vm: &mut Chip8Interpreter<F>,
        controls: &[ControlButton],
    ) -> Result<()> {
        for held in self.remaining.iter_mut() {
            *held = held.saturating_sub(1);
        }
        for control in controls {
            if let ControlButton::Hex(key) = control {
                if let Some(held) = self.remaining.get_mut(*key as usize) {
                    *held = self.hold_frames;
                }
            }
        }
        for (key, held) in self.remaining.iter().enumerate() {
            if *held > 0 {
                vm.press(key as u8)?;
            } else {
                vm.release(key as u8)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_lower() {
        assert_eq!(to_lower('A'), 'a');
        assert_eq!(to_lower('Z'), 'z');
        assert_eq!(to_lower('q'), 'q');
        assert_eq!(to_lower('4'), '4');
        assert_eq!(to_lower(' '), ' ');
    }

    #[test]
    fn test_keymap_covers_keypad() {
        let map = KeyMap::default();
        let mut hex: Vec<u8> = CHIP8_CONVENTIONAL_KEYMAP
            .iter()
            .filter_map(|(c, _)| match map.get(*c) {
                Some(ControlButton::Hex(k)) => Some(k),
                _ => None,
            })
            .collect();
        hex.sort_unstable();
        assert_eq!(hex, (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn test_keymap_is_case_insensitive() {
        let map = KeyMap::default();
        assert_eq!(map.get('W'), Some(ControlButton::Hex(0x5)));
        assert_eq!(map.get('w'), Some(ControlButton::Hex(0x5)));
        assert_eq!(map.get('H'), Some(ControlButton::Quit));
        assert_eq!(map.get('?'), None);
    }

    #[test]
    fn test_keymap_folds_config_case() {
        let map = KeyMap::new(&[('P', ControlButton::Pause)]);
        assert_eq!(map.get('p'), Some(ControlButton::Pause));
    }

    #[test]
    fn test_dummy_input_batches() -> Result<()> {
        let mut input = DummyInput::new(vec![vec![ControlButton::Pause], vec![]]);
        assert_eq!(input.poll_controls()?, vec![ControlButton::Pause]);
        assert!(input.poll_controls()?.is_empty());
        assert!(input.poll_controls()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_latch_holds_then_releases() -> Result<()> {
        let mut vm = Chip8Interpreter::new()?;
        let mut input = DummyInput::new(vec![vec![ControlButton::Hex(0xA), ControlButton::Quit]]);
        let mut latch = KeyLatch::new(2);

        latch.update(&mut vm, &input.poll_controls()?)?;
        assert!(vm.pressed(0xA)?);
        latch.update(&mut vm, &input.poll_controls()?)?;
        assert!(vm.pressed(0xA)?);
        latch.update(&mut vm, &input.poll_controls()?)?;
        assert!(!vm.pressed(0xA)?);
        Ok(())
    }

    #[test]
    fn test_repeat_events_keep_key_down() -> Result<()> {
        let mut vm = Chip8Interpreter::new()?;
        let mut latch = KeyLatch::new(1);
        for _ in 0..5 {
            latch.update(&mut vm, &[ControlButton::Hex(0x3)])?;
            assert!(vm.pressed(0x3)?);
        }
        latch.update(&mut vm, &[])?;
        assert!(!vm.pressed(0x3)?);
        Ok(())
    }
}
