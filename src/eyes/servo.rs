/*
 * @file servo.rs
 * @brief Neck servo controller
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Neck servo controller reached over a serial port.
//!
//! Packets are `$` followed by three zero-padded 3-digit fields; the pan
//! angle travels in the third field.

use std::io::Write;
use std::time::Duration;

use serialport::SerialPort;
use tracing::{info, warn};

use crate::error::Result;

/// Read/write timeout of the serial link.
const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Delay after raising DTR/RTS so the controller finishes resetting.
const SERIAL_BOOT_DELAY: Duration = Duration::from_millis(150);

pub const CENTER_ANGLE: i32 = 90;
pub const MIN_ANGLE: i32 = 60;
pub const MAX_ANGLE: i32 = 120;

/// Corrections at or below this magnitude leave the servo alone.
const DEADBAND: i32 = 2;

/// Digits per packet field.
const FIELD_DIGITS: usize = 3;

/// Formats a controller packet, e.g. `[0, 0, 90]` → `$000000090`.
pub fn encode_packet(values: &[i32]) -> String {
    let mut packet = String::from("$");
    for value in values {
        packet.push_str(&format!("{:0width$}", value, width = FIELD_DIGITS));
    }
    packet
}

/// Pan servo that follows PID corrections.
pub struct NeckServo {
    port: Box<dyn Write + Send>,
    angle: i32,
}

impl NeckServo {
    /// Opens the controller at `path`.
    ///
    /// # Details
    /// On macOS a `/dev/tty.*` path that fails to open is retried through
    /// its `/dev/cu.*` callout twin. DTR and RTS are raised afterwards and
    /// the controller gets a short boot delay.
    ///
    /// # Errors
    /// Returns the error of the first attempt when no port could be opened.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let mut port = match open_port(path, baud) {
            Ok(port) => port,
            Err(primary) => {
                let Some(callout) = callout_variant(path) else {
                    return Err(primary);
                };
                match open_port(&callout, baud) {
                    Ok(port) => {
                        warn!(primary = path, fallback = %callout, "servo port unavailable, using callout device");
                        port
                    }
                    Err(_) => return Err(primary),
                }
            }
        };
        let _ = port.write_data_terminal_ready(true);
        let _ = port.write_request_to_send(true);
        std::thread::sleep(SERIAL_BOOT_DELAY);
        info!(path, baud, "servo controller connected");
        Ok(Self::from_writer(Box::new(port)))
    }

    /// Wraps an already open link.
    pub fn from_writer(port: Box<dyn Write + Send>) -> Self {
        Self {
            port,
            angle: CENTER_ANGLE,
        }
    }

    /// Last angle written, in degrees.
    pub fn angle(&self) -> i32 {
        self.angle
    }

    /// Applies a PID correction.
    ///
    /// # Returns
    /// `true` when a new angle was sent.
    pub fn nudge(&mut self, correction: i32) -> Result<bool> {
        if correction.abs() <= DEADBAND {
            return Ok(false);
        }
        self.angle = (self.angle + correction).clamp(MIN_ANGLE, MAX_ANGLE);
        self.send_angle()?;
        Ok(true)
    }

    /// Turns the head back to the middle.
    pub fn center(&mut self) -> Result<()> {
        self.angle = CENTER_ANGLE;
        self.send_angle()
    }

    fn send_angle(&mut self) -> Result<()> {
        let packet = encode_packet(&[0, 0, self.angle]);
        self.port.write_all(packet.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }
}

impl Drop for NeckServo {
    fn drop(&mut self) {
        match self.center() {
            Ok(()) => info!("servo centred"),
            Err(err) => warn!(%err, "servo reset failed"),
        }
    }
}

fn open_port(path: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    Ok(serialport::new(path, baud).timeout(SERIAL_TIMEOUT).open()?)
}

/// Converts a macOS `/dev/tty.*` path to its `/dev/cu.*` callout twin.
fn callout_variant(path: &str) -> Option<String> {
    let suffix = path.strip_prefix("/dev/tty.")?;
    Some(format!("/dev/cu.{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    #[test]
    fn packet_format() {
        assert_eq!(encode_packet(&[0, 0, 90]), "$000000090");
        assert_eq!(encode_packet(&[1, 22, 120]), "$001022120");
    }

    #[test]
    fn small_corrections_are_ignored() {
        let capture = Capture::default();
        let mut servo = NeckServo::from_writer(Box::new(capture.clone()));
        assert!(!servo.nudge(2).expect("nudge"));
        assert!(!servo.nudge(-2).expect("nudge"));
        assert_eq!(servo.angle(), 90);
        assert_eq!(capture.text(), "");
        drop(servo);
        assert_eq!(capture.text(), "$000000090");
    }

    #[test]
    fn angle_is_clamped() {
        let capture = Capture::default();
        let mut servo = NeckServo::from_writer(Box::new(capture.clone()));
        assert!(servo.nudge(50).expect("nudge"));
        assert_eq!(servo.angle(), 120);
        assert!(servo.nudge(-100).expect("nudge"));
        assert_eq!(servo.angle(), 60);
        drop(servo);
        assert_eq!(capture.text(), "$000000120$000000060$000000090");
    }

    #[test]
    fn callout_paths() {
        assert_eq!(
            callout_variant("/dev/tty.usbmodem1"),
            Some("/dev/cu.usbmodem1".to_string())
        );
        assert_eq!(callout_variant("/dev/ttyUSB0"), None);
    }
}
