//! Screen source: the capability that produces raw display samples.
//!
//! The engine consumes this as a port so tests can drive the pipeline
//! with synthetic frames. The production implementation is a GDI
//! screen grabber.
//!
//! # Platform
//!
//! [`GdiScreenSource`] is **Windows-only**. On other platforms the type
//! is still defined but construction fails at runtime.

use async_trait::async_trait;

use crate::error::GlintError;
use crate::types::{RawFrame, ScreenSize};

// ── ScreenSource ─────────────────────────────────────────────────

/// Produces raw frames of the host display.
#[async_trait]
pub trait ScreenSource: Send {
    /// Real display dimensions. Read once at engine creation.
    fn size(&self) -> ScreenSize;

    /// Grab the next raw frame.
    async fn capture(&mut self) -> Result<RawFrame, GlintError>;
}

// ── GdiScreenSource ──────────────────────────────────────────────

/// GDI-based grabber for the primary display.
///
/// Each capture BitBlts the desktop into a memory bitmap and reads the
/// pixels back as top-down BGRA rows.
pub struct GdiScreenSource {
    size: ScreenSize,
}

#[cfg(target_os = "windows")]
mod platform {
    use super::*;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
        DIB_RGB_COLORS, SRCCOPY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    impl GdiScreenSource {
        /// Probe the primary display.
        pub fn new() -> Result<Self, GlintError> {
            let (width, height) = unsafe {
                (
                    GetSystemMetrics(SM_CXSCREEN),
                    GetSystemMetrics(SM_CYSCREEN),
                )
            };
            if width <= 0 || height <= 0 {
                return Err(GlintError::Capture("GetSystemMetrics returned 0".into()));
            }
            Ok(Self {
                size: ScreenSize::new(width as u32, height as u32),
            })
        }

        fn grab(&self) -> Result<RawFrame, GlintError> {
            let width = self.size.width as i32;
            let height = self.size.height as i32;

            unsafe {
                let screen_dc = GetDC(HWND::default());
                let mem_dc = CreateCompatibleDC(screen_dc);
                let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
                let old = SelectObject(mem_dc, bitmap);

                let blit = BitBlt(mem_dc, 0, 0, width, height, screen_dc, 0, 0, SRCCOPY);

                let mut info = BITMAPINFO {
                    bmiHeader: BITMAPINFOHEADER {
                        biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                        biWidth: width,
                        // Negative height requests top-down row order.
                        biHeight: -height,
                        biPlanes: 1,
                        biBitCount: 32,
                        biCompression: BI_RGB.0,
                        ..Default::default()
                    },
                    ..Default::default()
                };

                let mut data = vec![0u8; (width * height * 4) as usize];
                let copied = GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    height as u32,
                    Some(data.as_mut_ptr() as *mut _),
                    &mut info,
                    DIB_RGB_COLORS,
                );

                SelectObject(mem_dc, old);
                let _ = DeleteObject(bitmap);
                let _ = DeleteDC(mem_dc);
                ReleaseDC(HWND::default(), screen_dc);

                if blit.is_err() {
                    return Err(GlintError::Capture("BitBlt failed".into()));
                }
                if copied == 0 {
                    return Err(GlintError::Capture("GetDIBits returned 0".into()));
                }

                Ok(RawFrame::new(
                    self.size.width,
                    self.size.height,
                    crate::types::FrameEncoding::Bgra8 {
                        stride: self.size.width * 4,
                    },
                    data,
                ))
            }
        }
    }

    #[async_trait]
    impl ScreenSource for GdiScreenSource {
        fn size(&self) -> ScreenSize {
            self.size
        }

        async fn capture(&mut self) -> Result<RawFrame, GlintError> {
            self.grab()
        }
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
impl GdiScreenSource {
    /// GDI capture is only available on Windows.
    pub fn new() -> Result<Self, GlintError> {
        Err(GlintError::Capture(
            "GDI screen capture is only available on Windows".into(),
        ))
    }
}

#[cfg(not(target_os = "windows"))]
#[async_trait]
impl ScreenSource for GdiScreenSource {
    fn size(&self) -> ScreenSize {
        self.size
    }

    async fn capture(&mut self) -> Result<RawFrame, GlintError> {
        Err(GlintError::Capture("not supported on this platform".into()))
    }
}
