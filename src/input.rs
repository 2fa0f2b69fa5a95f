use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{Camera, CameraError, Movement};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(Self::Character(ch.to_ascii_uppercase()));
            }
            if ch.is_ascii_digit() {
                return Some(Self::Digit(ch as u8 - b'0'));
            }
        }
        if let Some(function) = name.strip_prefix('F').or_else(|| name.strip_prefix('f')) {
            if let Ok(index) = function.parse::<u8>() {
                if (1..=25).contains(&index) {
                    return Some(Self::Function(index));
                }
            }
        }
        None
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "Escape" | "Esc" => Escape,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for the non-character keys a binding can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
}

/// What a bound key does while the viewer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Move(Movement),
    Quit,
}

impl FromStr for Action {
    type Err = CameraError;

    /// Accepts `quit` or any camera movement name.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.trim().eq_ignore_ascii_case("quit") {
            return Ok(Action::Quit);
        }
        name.parse::<Movement>().map(Action::Move)
    }
}

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("unknown key name {0:?}")]
    UnknownKey(String),
    #[error(transparent)]
    Action(#[from] CameraError),
}

/// Key to action table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    bindings: HashMap<KeyCode, Action>,
}

impl Default for KeyBindings {
    /// WASD movement and Escape to quit.
    fn default() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(KeyCode::Character('W'), Action::Move(Movement::Forward));
        bindings.insert(KeyCode::Character('S'), Action::Move(Movement::Backward));
        bindings.insert(KeyCode::Character('A'), Action::Move(Movement::Left));
        bindings.insert(KeyCode::Character('D'), Action::Move(Movement::Right));
        bindings.insert(KeyCode::Named(NamedKey::Escape), Action::Quit);
        Self { bindings }
    }
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub fn bind(&mut self, key: KeyCode, action: Action) -> Option<Action> {
        self.bindings.insert(key, action)
    }

    /// Binds by name, e.g. `("W", "forward")`.
    pub fn bind_names(&mut self, key: &str, action: &str) -> Result<(), BindingError> {
        let code = KeyCode::from_name(key.trim())
            .ok_or_else(|| BindingError::UnknownKey(key.to_string()))?;
        let action = action.parse::<Action>()?;
        self.bind(code, action);
        Ok(())
    }

    pub fn action(&self, key: KeyCode) -> Option<Action> {
        self.bindings.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Keys currently held down.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_key_down_by_name(&self, name: &str) -> bool {
        KeyCode::from_name(name).is_some_and(|key| self.is_key_down(key))
    }

    /// Moves the camera for every held movement key. Returns `true` when a
    /// held key asks to quit.
    pub fn apply(&self, bindings: &KeyBindings, camera: &mut Camera, delta_time: f32) -> bool {
        let mut quit = false;
        for key in &self.keys {
            match bindings.action(*key) {
                Some(Action::Move(direction)) => camera.process_keyboard(direction, delta_time),
                Some(Action::Quit) => quit = true,
                None => {}
            }
        }
        quit
    }
}
