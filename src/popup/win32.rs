//! Native Win32 call popup
//!
//! Each popup runs on its own UI thread with its own message loop. The
//! controller talks to it only through `PostMessageW`; the window reports
//! back by sending [`ControllerMessage`]s on the controller's channel.
//! Caller icons are downloaded on a short-lived worker thread and picked up
//! by the next repaint.

use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Dwm::{
    DwmSetWindowAttribute, DWMWA_WINDOW_CORNER_PREFERENCE, DWMWCP_ROUND,
    DWM_WINDOW_CORNER_PREFERENCE,
};
use windows::Win32::Graphics::Gdi::*;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::*;

use super::icon::{fetch_icon, IconImage};
use super::{CallSurface, ControllerMessage, SurfaceFactory, WindowId};
use crate::error::{CallRingError, CallRingResult};
use crate::ring::RingStarted;

const POPUP_CLASS: &str = "CallRingPopupClass";
const POPUP_TITLE: &str = "Incoming call";
const FONT_FACE: &str = "Segoe UI";

const WM_CALL_REFRESH: u32 = WM_APP + 1;
const WM_CALL_SHOW: u32 = WM_APP + 2;
const WM_CALL_RESIZE: u32 = WM_APP + 3;

const VK_ESCAPE: usize = 0x1B;

/// Height of the answer / decline strip at the bottom of the popup
const BUTTON_STRIP: i32 = 56;
const SCREEN_MARGIN: i32 = 16;
const AVATAR_DIAMETER: i32 = 80;
const AVATAR_TOP: i32 = 28;
const BACKGROUND: [u8; 3] = [17, 18, 20];

static CLASS_REGISTERED: OnceCell<()> = OnceCell::new();

/// State shared between the controller-side handle and the UI thread
struct Shared {
    hwnd: AtomicIsize,
    alive: AtomicBool,
    data: Mutex<Option<RingStarted>>,
    icon: Mutex<IconSlot>,
}

/// The icon most recently requested, and its bitmap once downloaded
#[derive(Default)]
struct IconSlot {
    url: Option<String>,
    image: Option<IconImage>,
}

impl Shared {
    fn post(&self, msg: u32, wparam: WPARAM, lparam: LPARAM) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        let raw = self.hwnd.load(Ordering::SeqCst);
        if raw == 0 {
            return;
        }
        let hwnd = HWND(raw as *mut std::ffi::c_void);
        unsafe {
            if let Err(e) = PostMessageW(hwnd, msg, wparam, lparam) {
                debug!("Popup gone before message 0x{:X}: {}", msg, e);
            }
        }
    }
}

/// Per-window state stored in `GWLP_USERDATA`
struct PopupContext {
    id: WindowId,
    shared: Arc<Shared>,
    events: Sender<ControllerMessage>,
}

pub struct Win32SurfaceFactory {
    events: Sender<ControllerMessage>,
}

impl Win32SurfaceFactory {
    pub fn new(events: Sender<ControllerMessage>) -> Self {
        Self { events }
    }
}

impl SurfaceFactory for Win32SurfaceFactory {
    fn open(&mut self, id: WindowId, width: u32, height: u32) -> CallRingResult<Box<dyn CallSurface>> {
        let shared = Arc::new(Shared {
            hwnd: AtomicIsize::new(0),
            alive: AtomicBool::new(true),
            data: Mutex::new(None),
            icon: Mutex::new(IconSlot::default()),
        });

        let ctx = PopupContext {
            id,
            shared: shared.clone(),
            events: self.events.clone(),
        };
        std::thread::Builder::new()
            .name(format!("call-popup-{}", id.get()))
            .spawn(move || {
                let events = ctx.events.clone();
                let shared = ctx.shared.clone();
                if let Err(e) = run_popup(ctx, width as i32, height as i32) {
                    warn!("Call popup {} failed: {}", id, e);
                    shared.alive.store(false, Ordering::SeqCst);
                    let _ = events.send(ControllerMessage::Closed(id));
                }
            })
            .map_err(|e| CallRingError::Popup(format!("failed to spawn popup thread: {}", e)))?;

        Ok(Box::new(Win32Surface { id, shared }))
    }
}

/// Controller-side handle to a popup window
struct Win32Surface {
    id: WindowId,
    shared: Arc<Shared>,
}

impl Win32Surface {
    /// Start downloading `url` unless it is already loaded or on its way
    fn request_icon(&self, url: &str) {
        {
            let mut icon = self.shared.icon.lock();
            if icon.url.as_deref() == Some(url) {
                return;
            }
            *icon = IconSlot {
                url: Some(url.to_string()),
                image: None,
            };
        }

        let id = self.id;
        let shared = self.shared.clone();
        let url = url.to_string();
        let spawned = std::thread::Builder::new()
            .name(format!("call-icon-{}", id.get()))
            .spawn(move || {
                let image = match fetch_icon(&url, AVATAR_DIAMETER as u32, BACKGROUND) {
                    Ok(image) => image,
                    Err(e) => {
                        warn!("No icon for popup {}, showing initial: {}", id, e);
                        return;
                    }
                };
                {
                    let mut icon = shared.icon.lock();
                    if icon.url.as_deref() != Some(url.as_str()) {
                        // A newer call replaced this one meanwhile
                        return;
                    }
                    icon.image = Some(image);
                }
                shared.post(WM_CALL_REFRESH, WPARAM(0), LPARAM(0));
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn icon loader for popup {}: {}", id, e);
        }
    }
}

impl CallSurface for Win32Surface {
    fn id(&self) -> WindowId {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    fn send_call_data(&self, data: &RingStarted) {
        *self.shared.data.lock() = Some(data.clone());
        if let Some(url) = data.icon_url.as_deref() {
            self.request_icon(url);
        }
        self.shared.post(WM_CALL_REFRESH, WPARAM(0), LPARAM(0));
    }

    fn show(&self) {
        self.shared.post(WM_CALL_SHOW, WPARAM(0), LPARAM(0));
    }

    fn resize(&self, width: u32, height: u32) {
        self.shared.post(WM_CALL_RESIZE, WPARAM(width as usize), LPARAM(height as isize));
    }

    fn close(&self) {
        // Pairs with the check in `run_popup`: either the UI thread sees
        // `alive == false` or we see its hwnd.
        self.shared.alive.store(false, Ordering::SeqCst);
        let raw = self.shared.hwnd.load(Ordering::SeqCst);
        if raw != 0 {
            let hwnd = HWND(raw as *mut std::ffi::c_void);
            unsafe {
                let _ = PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0));
            }
        }
    }
}

/// Create the popup window and pump its messages until it is destroyed
fn run_popup(ctx: PopupContext, width: i32, height: i32) -> CallRingResult<()> {
    CLASS_REGISTERED.get_or_try_init(|| unsafe { register_popup_class() })?;

    let id = ctx.id;
    let shared = ctx.shared.clone();
    let events = ctx.events.clone();
    let (x, y) = popup_origin(width, height);

    unsafe {
        let class = to_wide(POPUP_CLASS);
        let title = to_wide(POPUP_TITLE);
        let hinstance = GetModuleHandleW(None)?;

        let hwnd = CreateWindowExW(
            WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
            PCWSTR(class.as_ptr()),
            PCWSTR(title.as_ptr()),
            WS_POPUP,
            x,
            y,
            width,
            height,
            None,
            None,
            hinstance,
            None,
        )?;

        SetWindowLongPtrW(hwnd, GWLP_USERDATA, Box::into_raw(Box::new(ctx)) as isize);

        let corner_preference = DWMWCP_ROUND;
        let _ = DwmSetWindowAttribute(
            hwnd,
            DWMWA_WINDOW_CORNER_PREFERENCE,
            &corner_preference as *const _ as *const _,
            std::mem::size_of::<DWM_WINDOW_CORNER_PREFERENCE>() as u32,
        );

        shared.hwnd.store(hwnd.0 as isize, Ordering::SeqCst);
        if !shared.alive.load(Ordering::SeqCst) {
            // Closed while we were still creating it
            let _ = DestroyWindow(hwnd);
            return Ok(());
        }

        info!("Call popup {} created", id);
        let _ = events.send(ControllerMessage::Ready(id));

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    debug!("Call popup {} message loop ended", id);
    Ok(())
}

/// Register the popup window class
unsafe fn register_popup_class() -> CallRingResult<()> {
    let class_name = to_wide(POPUP_CLASS);
    let hinstance = GetModuleHandleW(None)?;

    let wc = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        style: CS_HREDRAW | CS_VREDRAW | CS_DROPSHADOW,
        lpfnWndProc: Some(popup_wnd_proc),
        hInstance: hinstance.into(),
        hCursor: LoadCursorW(None, IDC_HAND)?,
        lpszClassName: PCWSTR(class_name.as_ptr()),
        hbrBackground: HBRUSH::default(),
        ..Default::default()
    };

    if RegisterClassExW(&wc) == 0 {
        return Err(CallRingError::Popup("failed to register popup window class".into()));
    }
    Ok(())
}

/// Bottom-right corner of the primary work area
fn popup_origin(width: i32, height: i32) -> (i32, i32) {
    unsafe {
        let mut rect = RECT::default();
        let found = SystemParametersInfoW(
            SPI_GETWORKAREA,
            0,
            Some(&mut rect as *mut _ as *mut _),
            SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
        );
        if found.is_err() {
            rect.right = GetSystemMetrics(SM_CXSCREEN);
            rect.bottom = GetSystemMetrics(SM_CYSCREEN);
        }
        (
            rect.right - width - SCREEN_MARGIN,
            rect.bottom - height - SCREEN_MARGIN,
        )
    }
}

unsafe extern "system" fn popup_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let Some(ctx) = popup_context(hwnd) else {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    };

    match msg {
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);
            let data = ctx.shared.data.lock().clone();
            let icon = ctx.shared.icon.lock();
            let wanted = data.as_ref().and_then(|d| d.icon_url.as_deref());
            let image = icon.image.as_ref().filter(|_| icon.url.as_deref() == wanted);
            paint_popup(hdc, hwnd, data.as_ref(), image);
            drop(icon);
            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }

        WM_CALL_REFRESH => {
            let _ = InvalidateRect(hwnd, None, false);
            LRESULT(0)
        }

        WM_CALL_SHOW => {
            // Activate so Escape reaches the popup without a click first
            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = SetWindowPos(hwnd, HWND_TOPMOST, 0, 0, 0, 0, SWP_NOMOVE | SWP_NOSIZE);
            let _ = SetForegroundWindow(hwnd);
            let _ = InvalidateRect(hwnd, None, false);
            LRESULT(0)
        }

        WM_CALL_RESIZE => {
            let width = wparam.0 as i32;
            let height = lparam.0 as i32;
            let mut rect = RECT::default();
            let _ = GetWindowRect(hwnd, &mut rect);
            // Grow upwards so the popup stays anchored to the screen corner
            let _ = SetWindowPos(
                hwnd,
                HWND_TOPMOST,
                rect.right - width,
                rect.bottom - height,
                width,
                height,
                SWP_NOACTIVATE,
            );
            let _ = InvalidateRect(hwnd, None, true);
            LRESULT(0)
        }

        WM_LBUTTONUP => {
            let x = (lparam.0 & 0xFFFF) as i16 as i32;
            let y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;
            let mut rect = RECT::default();
            let _ = GetClientRect(hwnd, &mut rect);
            if let Some(response) = click_response(x, y, rect.right, rect.bottom) {
                let _ = ctx.events.send(response);
            }
            LRESULT(0)
        }

        WM_KEYDOWN => {
            if let Some(response) = key_response(wparam.0) {
                let _ = ctx.events.send(response);
            }
            LRESULT(0)
        }

        WM_DESTROY => {
            let id = ctx.id;
            let events = ctx.events.clone();
            let shared = ctx.shared.clone();
            free_popup_context(hwnd);
            shared.alive.store(false, Ordering::SeqCst);
            shared.hwnd.store(0, Ordering::SeqCst);
            let _ = events.send(ControllerMessage::Closed(id));
            PostQuitMessage(0);
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Decline on the left half of the button strip, answer on the right
fn click_response(x: i32, y: i32, width: i32, height: i32) -> Option<ControllerMessage> {
    if y < height - BUTTON_STRIP || y >= height {
        return None;
    }
    Some(if x < width / 2 {
        ControllerMessage::Dismiss
    } else {
        ControllerMessage::Answer
    })
}

fn key_response(vk: usize) -> Option<ControllerMessage> {
    (vk == VK_ESCAPE).then_some(ControllerMessage::Dismiss)
}

/// Paint the popup: caller icon, name, channel, and the answer / decline strip
unsafe fn paint_popup(hdc: HDC, hwnd: HWND, data: Option<&RingStarted>, icon: Option<&IconImage>) {
    let mut rect = RECT::default();
    let _ = GetClientRect(hwnd, &mut rect);
    let width = rect.right - rect.left;
    let height = rect.bottom - rect.top;

    let bg_brush = CreateSolidBrush(rgb(BACKGROUND[0], BACKGROUND[1], BACKGROUND[2]));
    FillRect(hdc, &rect, bg_brush);
    let _ = DeleteObject(bg_brush);

    SetBkMode(hdc, TRANSPARENT);

    let (name, channel) = match data {
        Some(d) => (d.display_name.as_str(), d.channel_name.as_str()),
        None => ("", ""),
    };

    let diameter = AVATAR_DIAMETER;
    let cx = width / 2;
    let top = AVATAR_TOP;
    match icon {
        Some(icon) => blit_icon(hdc, icon, cx - icon.size as i32 / 2, top),
        None => {
            // Initial in a circle until the icon arrives
            let avatar_brush = CreateSolidBrush(rgb(88, 101, 242));
            let old_brush = SelectObject(hdc, avatar_brush);
            let old_pen = SelectObject(hdc, GetStockObject(NULL_PEN));
            let _ = Ellipse(hdc, cx - diameter / 2, top, cx + diameter / 2, top + diameter);
            let _ = SelectObject(hdc, old_pen);
            let _ = SelectObject(hdc, old_brush);
            let _ = DeleteObject(avatar_brush);

            let initial: String = name.chars().next().map(|c| c.to_uppercase().collect()).unwrap_or_default();
            draw_centered(
                hdc,
                &initial,
                RECT { left: cx - diameter / 2, top, right: cx + diameter / 2, bottom: top + diameter },
                34,
                FW_SEMIBOLD.0 as i32,
                rgb(255, 255, 255),
            );
        }
    }

    let text_top = top + diameter + 14;
    draw_centered(
        hdc,
        name,
        RECT { left: 12, top: text_top, right: width - 12, bottom: text_top + 24 },
        18,
        FW_SEMIBOLD.0 as i32,
        rgb(242, 243, 245),
    );
    if channel != name {
        draw_centered(
            hdc,
            channel,
            RECT { left: 12, top: text_top + 24, right: width - 12, bottom: text_top + 42 },
            13,
            FW_NORMAL.0 as i32,
            rgb(181, 186, 193),
        );
    }
    draw_centered(
        hdc,
        "Incoming call...",
        RECT { left: 12, top: text_top + 44, right: width - 12, bottom: text_top + 62 },
        12,
        FW_NORMAL.0 as i32,
        rgb(148, 155, 164),
    );

    // Decline on the left, answer on the right
    let strip_top = height - BUTTON_STRIP;
    let half = width / 2;
    let buttons = [
        (RECT { left: 8, top: strip_top + 8, right: half - 4, bottom: height - 8 }, rgb(218, 55, 60), "Decline"),
        (RECT { left: half + 4, top: strip_top + 8, right: width - 8, bottom: height - 8 }, rgb(35, 165, 90), "Answer"),
    ];
    for (button, color, label) in buttons {
        let brush = CreateSolidBrush(color);
        FillRect(hdc, &button, brush);
        let _ = DeleteObject(brush);
        draw_centered(hdc, label, button, 14, FW_SEMIBOLD.0 as i32, rgb(255, 255, 255));
    }
}

/// Copy a pre-composited icon onto the popup at `(x, y)`
unsafe fn blit_icon(hdc: HDC, icon: &IconImage, x: i32, y: i32) {
    let size = icon.size as i32;
    let bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: size,
            biHeight: -size, // top-down
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0 as u32,
            ..Default::default()
        },
        bmiColors: [RGBQUAD::default(); 1],
    };
    SetDIBitsToDevice(
        hdc,
        x,
        y,
        icon.size,
        icon.size,
        0,
        0,
        0,
        icon.size,
        icon.bgra.as_ptr() as *const std::ffi::c_void,
        &bmi,
        DIB_RGB_COLORS,
    );
}

unsafe fn draw_centered(hdc: HDC, text: &str, mut rect: RECT, size: i32, weight: i32, color: COLORREF) {
    if text.is_empty() {
        return;
    }
    let face = to_wide(FONT_FACE);
    let font = CreateFontW(
        size, 0, 0, 0, weight, 0, 0, 0,
        DEFAULT_CHARSET.0 as u32, 0, 0, CLEARTYPE_QUALITY.0 as u32, 0,
        PCWSTR(face.as_ptr()),
    );
    let old_font = SelectObject(hdc, font);
    SetTextColor(hdc, color);

    let mut wide: Vec<u16> = text.encode_utf16().collect();
    DrawTextW(
        hdc,
        &mut wide,
        &mut rect,
        DT_CENTER | DT_VCENTER | DT_SINGLELINE | DT_END_ELLIPSIS,
    );

    let _ = SelectObject(hdc, old_font);
    let _ = DeleteObject(font);
}

fn popup_context(hwnd: HWND) -> Option<&'static PopupContext> {
    unsafe {
        let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const PopupContext;
        if ptr.is_null() { None } else { Some(&*ptr) }
    }
}

fn free_popup_context(hwnd: HWND) {
    unsafe {
        let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *mut PopupContext;
        if !ptr.is_null() {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            drop(Box::from_raw(ptr));
        }
    }
}

fn rgb(r: u8, g: u8, b: u8) -> COLORREF {
    COLORREF(r as u32 | (g as u32) << 8 | (b as u32) << 16)
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
