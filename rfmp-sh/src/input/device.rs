//! Linux input event devices
//!
//! USB card readers present themselves as keyboards. Reading the event device
//! directly means scans arrive even when no terminal has focus.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Size of `struct input_event` on 64-bit Linux (16-byte timeval + 8)
pub const EVENT_SIZE: usize = 24;

pub const EV_KEY: u16 = 1;
const KEY_PRESS: i32 = 1;

pub const DEVICES_LIST: &str = "/proc/bus/input/devices";

/// One decoded `input_event`; the timestamp is not used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    /// Decode one native-endian record
    pub fn decode(record: &[u8]) -> Option<Self> {
        if record.len() < EVENT_SIZE {
            return None;
        }
        let kind = u16::from_ne_bytes([record[16], record[17]]);
        let code = u16::from_ne_bytes([record[18], record[19]]);
        let value = i32::from_ne_bytes([record[20], record[21], record[22], record[23]]);
        Some(Self { kind, code, value })
    }

    /// Character produced by a key press; None for releases, repeats and
    /// unmapped keys
    pub fn key_char(&self) -> Option<char> {
        if self.kind != EV_KEY || self.value != KEY_PRESS {
            return None;
        }
        keycode_to_char(self.code)
    }
}

/// Linux key code → character (US layout, no modifiers)
pub fn keycode_to_char(code: u16) -> Option<char> {
    const DIGIT_ROW: &[u8] = b"1234567890";
    const TOP_ROW: &[u8] = b"qwertyuiop";
    const HOME_ROW: &[u8] = b"asdfghjkl";
    const BOTTOM_ROW: &[u8] = b"zxcvbnm";

    let code = code as usize;
    let ch = match code {
        2..=11 => DIGIT_ROW[code - 2],
        16..=25 => TOP_ROW[code - 16],
        30..=38 => HOME_ROW[code - 30],
        44..=50 => BOTTOM_ROW[code - 44],
        // KEY_ENTER, KEY_KPENTER
        28 | 96 => b'\n',
        // Keypad
        71 => b'7',
        72 => b'8',
        73 => b'9',
        75 => b'4',
        76 => b'5',
        77 => b'6',
        79 => b'1',
        80 => b'2',
        81 => b'3',
        82 => b'0',
        _ => return None,
    };
    Some(ch as char)
}

/// Find the reader's event device in the text of `/proc/bus/input/devices`
///
/// Blocks are separated by blank lines; the first block matching any
/// pattern (case-insensitive) that lists an `eventN` handler wins.
pub fn find_reader_device(devices: &str, patterns: &[String]) -> Option<PathBuf> {
    let patterns: Vec<String> = patterns
        .iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    for block in devices.split("\n\n") {
        let mut lowered = block.to_lowercase();
        if let Some(id) = usb_id(block) {
            lowered.push('\n');
            lowered.push_str(&id);
        }
        let Some(pattern) = patterns.iter().find(|p| lowered.contains(p.as_str())) else {
            continue;
        };

        let handler = block
            .lines()
            .filter_map(|line| line.trim().strip_prefix("H: Handlers="))
            .flat_map(|handlers| handlers.split_whitespace())
            .find(|h| h.len() > 5 && h.starts_with("event") && h[5..].chars().all(|c| c.is_ascii_digit()));

        if let Some(handler) = handler {
            debug!(pattern = %pattern, handler, "Matched input device");
            return Some(Path::new("/dev/input").join(handler));
        }
    }
    None
}

/// "vendor:product" from a block's `I:` line, as `lsusb` prints it
fn usb_id(block: &str) -> Option<String> {
    let info = block.lines().find_map(|line| line.trim().strip_prefix("I: "))?;
    let field = |name: &str| {
        info.split_whitespace()
            .find_map(|kv| kv.strip_prefix(name))
            .map(|v| v.to_lowercase())
    };
    Some(format!("{}:{}", field("Vendor=")?, field("Product=")?))
}

/// Look for a card reader among the system's input devices
pub fn detect_reader(patterns: &[String]) -> Option<PathBuf> {
    let devices = match std::fs::read_to_string(DEVICES_LIST) {
        Ok(text) => text,
        Err(e) => {
            debug!("Cannot read {}: {}", DEVICES_LIST, e);
            return None;
        }
    };

    let found = find_reader_device(&devices, patterns);
    if let Some(path) = &found {
        info!("Detected card reader at {}", path.display());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = "\
I: Bus=0011 Vendor=0001 Product=0001 Version=ab41
N: Name=\"AT Translated Set 2 keyboard\"
P: Phys=isa0060/serio0/input0
H: Handlers=sysrq kbd event0 leds
B: EV=120013

I: Bus=0003 Vendor=ffff Product=0035 Version=0110
N: Name=\"Sycreader RFID Technology Co., Ltd SYC ID&IC USB Reader\"
P: Phys=usb-0000:01:00.0-1.3/input0
H: Handlers=sysrq kbd leds event3
B: EV=120013
";

    fn record(kind: u16, code: u16, value: i32) -> Vec<u8> {
        let mut bytes = vec![0u8; 16];
        bytes.extend_from_slice(&kind.to_ne_bytes());
        bytes.extend_from_slice(&code.to_ne_bytes());
        bytes.extend_from_slice(&value.to_ne_bytes());
        bytes
    }

    fn default_patterns() -> Vec<String> {
        crate::config::ScanConfig::default().device_patterns
    }

    #[test]
    fn test_decode_key_press() {
        let event = InputEvent::decode(&record(EV_KEY, 2, 1)).unwrap();
        assert_eq!(event, InputEvent { kind: EV_KEY, code: 2, value: 1 });
        assert_eq!(event.key_char(), Some('1'));
    }

    #[test]
    fn test_release_repeat_and_sync_are_ignored() {
        assert_eq!(InputEvent::decode(&record(EV_KEY, 2, 0)).unwrap().key_char(), None);
        assert_eq!(InputEvent::decode(&record(EV_KEY, 2, 2)).unwrap().key_char(), None);
        assert_eq!(InputEvent::decode(&record(0, 0, 0)).unwrap().key_char(), None);
        // MSC_SCAN carries the scancode, not a key press
        assert_eq!(InputEvent::decode(&record(4, 4, 458782)).unwrap().key_char(), None);
    }

    #[test]
    fn test_short_record_is_rejected() {
        assert_eq!(InputEvent::decode(&[0u8; 10]), None);
    }

    #[test]
    fn test_keymap() {
        let digits: String = (2..=11).filter_map(keycode_to_char).collect();
        assert_eq!(digits, "1234567890");
        assert_eq!(keycode_to_char(28), Some('\n'));
        assert_eq!(keycode_to_char(16), Some('q'));
        assert_eq!(keycode_to_char(50), Some('m'));
        assert_eq!(keycode_to_char(82), Some('0'));
        assert_eq!(keycode_to_char(42), None); // left shift
    }

    #[test]
    fn test_find_reader_by_name_pattern() {
        assert_eq!(
            find_reader_device(DEVICES, &default_patterns()),
            Some(PathBuf::from("/dev/input/event3"))
        );
    }

    #[test]
    fn test_pattern_match_is_case_insensitive() {
        let patterns = vec!["sycreader".to_string()];
        assert_eq!(
            find_reader_device(DEVICES, &patterns),
            Some(PathBuf::from("/dev/input/event3"))
        );
    }

    #[test]
    fn test_find_reader_by_usb_id() {
        let patterns = vec!["FFFF:0035".to_string()];
        assert_eq!(
            find_reader_device(DEVICES, &patterns),
            Some(PathBuf::from("/dev/input/event3"))
        );
    }

    #[test]
    fn test_no_reader_present() {
        let keyboard_only = DEVICES.split("\n\n").next().unwrap();
        assert_eq!(find_reader_device(keyboard_only, &default_patterns()), None);
    }
}
