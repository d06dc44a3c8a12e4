use anyhow::{Result, anyhow};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

use crate::{control::PointerSink, types::ScreenSize};

/// System pointer driven through enigo.
pub struct EnigoPointer {
    enigo: Enigo,
}

impl EnigoPointer {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|err| anyhow!("failed to connect to the pointer backend: {err:?}"))?;
        Ok(Self { enigo })
    }

    pub fn screen_size(&self) -> Option<ScreenSize> {
        match self.enigo.main_display() {
            Ok((width, height)) if width > 0 && height > 0 => Some(ScreenSize {
                width: width as u32,
                height: height as u32,
            }),
            Ok((width, height)) => {
                log::warn!("main display reports a {width}x{height} screen");
                None
            }
            Err(err) => {
                log::warn!("failed to query main display size: {err:?}");
                None
            }
        }
    }
}

impl PointerSink for EnigoPointer {
    fn move_cursor(&mut self, x: i32, y: i32) {
        if let Err(err) = self.enigo.move_mouse(x, y, Coordinate::Abs) {
            log::warn!("pointer move to ({x}, {y}) failed: {err:?}");
        }
    }

    fn grab(&mut self) {
        if let Err(err) = self.enigo.button(Button::Left, Direction::Press) {
            log::warn!("pointer press failed: {err:?}");
        }
    }

    fn release(&mut self) {
        if let Err(err) = self.enigo.button(Button::Left, Direction::Release) {
            log::warn!("pointer release failed: {err:?}");
        }
    }
}

/// Dry-run sink: logs what would have been sent to the pointer.
#[derive(Debug, Default)]
pub struct LogPointer {
    last: Option<(i32, i32)>,
}

impl PointerSink for LogPointer {
    fn move_cursor(&mut self, x: i32, y: i32) {
        if self.last != Some((x, y)) {
            log::info!("move ({x}, {y})");
            self.last = Some((x, y));
        }
    }

    fn grab(&mut self) {
        log::info!("press");
    }

    fn release(&mut self) {
        log::info!("release");
    }
}

/// Screen size as seen by the pointer backend, or the 1920x1080 fallback.
pub fn detect_screen_size(pointer: Option<&EnigoPointer>) -> ScreenSize {
    let probe;
    let pointer = match pointer {
        Some(pointer) => Some(pointer),
        None => {
            probe = EnigoPointer::new().ok();
            probe.as_ref()
        }
    };
    pointer
        .and_then(EnigoPointer::screen_size)
        .unwrap_or_else(|| {
            log::warn!(
                "screen size unavailable, assuming {}x{}",
                ScreenSize::FALLBACK.width,
                ScreenSize::FALLBACK.height
            );
            ScreenSize::FALLBACK
        })
}
