//! Deterministic mock render engine.
//!
//! Simulates a page without launching a browser. Screenshots are real PNG
//! images whose pixels derive from the current URL and scroll offset, so
//! any state change is observable in the encoded bytes. Used by the test
//! suite and as the default engine when no browser adapter is configured.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgba, RgbaImage};
use tokio::sync::{Mutex, RwLock};

use crate::engine::render::{EngineError, EngineSpawner, RenderEngine, BLANK_URL};

/// Mutable page state behind the mock.
#[derive(Debug, Clone)]
struct PageState {
    url: String,
    scroll_x: i64,
    scroll_y: i64,
    click_count: u64,
    keys_pressed: Vec<String>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            url: BLANK_URL.to_string(),
            scroll_x: 0,
            scroll_y: 0,
            click_count: 0,
            keys_pressed: Vec::new(),
        }
    }
}

/// In-process render engine for tests and browserless runs.
pub struct MockRenderEngine {
    state: RwLock<PageState>,
    closed: RwLock<bool>,
    /// Ordered log of mutating operations, for serialization assertions.
    op_log: Mutex<Vec<String>>,
    /// When set, the next navigate call fails with this message.
    fail_next_navigation: Mutex<Option<String>>,
    /// When set, the next navigate call sleeps this long first.
    delay_next_navigation: Mutex<Option<Duration>>,
    viewport: (u32, u32),
}

impl MockRenderEngine {
    pub fn new(viewport: (u32, u32)) -> Self {
        Self {
            state: RwLock::new(PageState::default()),
            closed: RwLock::new(false),
            op_log: Mutex::new(Vec::new()),
            fail_next_navigation: Mutex::new(None),
            delay_next_navigation: Mutex::new(None),
            viewport,
        }
    }

    async fn ensure_open(&self) -> Result<(), EngineError> {
        if *self.closed.read().await {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    async fn log_op(&self, op: String) {
        self.op_log.lock().await.push(op);
    }

    /// Returns the ordered log of mutating operations applied so far.
    pub async fn operations(&self) -> Vec<String> {
        self.op_log.lock().await.clone()
    }

    /// Arranges for the next `navigate` call to fail.
    pub async fn fail_next_navigation(&self, message: impl Into<String>) {
        *self.fail_next_navigation.lock().await = Some(message.into());
    }

    /// Arranges for the next `navigate` call to stall for `delay` before
    /// completing, simulating a page that is slow to load.
    pub async fn delay_next_navigation(&self, delay: Duration) {
        *self.delay_next_navigation.lock().await = Some(delay);
    }

    /// Number of clicks the page has received.
    pub async fn click_count(&self) -> u64 {
        self.state.read().await.click_count
    }

    /// Keys the page has received, in order.
    pub async fn keys_pressed(&self) -> Vec<String> {
        self.state.read().await.keys_pressed.clone()
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }

    /// A browser resolves a bare origin to its root path; mirror that so
    /// navigating to "https://example.com" reports "https://example.com/".
    fn resolve_url(url: &str) -> String {
        if let Some(rest) = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
        {
            if !rest.contains('/') {
                return format!("{}/", url);
            }
        }
        url.to_string()
    }

    fn hash(bytes: &[u8]) -> u64 {
        // FNV-1a, enough to vary pixels per state.
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
        h
    }
}

#[async_trait]
impl RenderEngine for MockRenderEngine {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.ensure_open().await?;

        if let Some(message) = self.fail_next_navigation.lock().await.take() {
            return Err(EngineError::Navigation(message));
        }

        if let Some(delay) = self.delay_next_navigation.lock().await.take() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        state.url = Self::resolve_url(url);
        state.scroll_x = 0;
        state.scroll_y = 0;
        drop(state);

        self.log_op(format!("navigate:{}", url)).await;
        Ok(())
    }

    async fn click(&self, x_fraction: f64, y_fraction: f64) -> Result<(), EngineError> {
        self.ensure_open().await?;

        let mut state = self.state.write().await;
        state.click_count += 1;
        drop(state);

        self.log_op(format!("click:{:.3},{:.3}", x_fraction, y_fraction))
            .await;
        Ok(())
    }

    async fn scroll_by(&self, dx: i32, dy: i32) -> Result<(), EngineError> {
        self.ensure_open().await?;

        let mut state = self.state.write().await;
        state.scroll_x = (state.scroll_x + dx as i64).max(0);
        state.scroll_y = (state.scroll_y + dy as i64).max(0);
        drop(state);

        self.log_op(format!("scroll:{},{}", dx, dy)).await;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), EngineError> {
        self.ensure_open().await?;

        let mut state = self.state.write().await;
        state.keys_pressed.push(key.to_string());
        drop(state);

        self.log_op(format!("keypress:{}", key)).await;
        Ok(())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, EngineError> {
        self.ensure_open().await?;

        let state = self.state.read().await.clone();

        // Render at 1/8 of the configured viewport; tests only need
        // state-dependent PNG bytes, not full-resolution frames.
        let w = (self.viewport.0 / 8).max(1);
        let h = (self.viewport.1 / 8).max(1);
        let seed = Self::hash(
            format!("{}|{}|{}", state.url, state.scroll_x, state.scroll_y).as_bytes(),
        );

        let mut img = RgbaImage::new(w, h);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let v = seed
                .wrapping_mul(31)
                .wrapping_add((x as u64) << 16 | y as u64);
            *pixel = Rgba([
                (v >> 16) as u8,
                (v >> 8) as u8,
                v as u8,
                255,
            ]);
        }

        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png)
            .map_err(|e| EngineError::Action(format!("png encoding failed: {}", e)))?;
        Ok(buf.into_inner())
    }

    async fn current_url(&self) -> Result<String, EngineError> {
        self.ensure_open().await?;
        Ok(self.state.read().await.url.clone())
    }

    async fn close(&self) -> Result<bool, EngineError> {
        let mut closed = self.closed.write().await;
        if *closed {
            return Ok(false);
        }
        *closed = true;
        Ok(true)
    }
}

/// Spawner producing [`MockRenderEngine`] instances.
///
/// Keeps handles to every engine it has spawned so tests can inspect
/// per-room engine state after the fact.
#[derive(Default)]
pub struct MockEngineSpawner {
    spawned: Mutex<Vec<Arc<MockRenderEngine>>>,
}

impl MockEngineSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engines spawned so far, in creation order.
    pub async fn engines(&self) -> Vec<Arc<MockRenderEngine>> {
        self.spawned.lock().await.clone()
    }
}

#[async_trait]
impl EngineSpawner for MockEngineSpawner {
    async fn spawn(&self, viewport: (u32, u32)) -> Result<Arc<dyn RenderEngine>, EngineError> {
        let engine = Arc::new(MockRenderEngine::new(viewport));
        self.spawned.lock().await.push(engine.clone());
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn navigate_resolves_bare_origin() {
        let engine = MockRenderEngine::new((1280, 720));
        engine.navigate("https://example.com").await.unwrap();
        assert_eq!(
            engine.current_url().await.unwrap(),
            "https://example.com/"
        );

        engine.navigate("https://example.com/about").await.unwrap();
        assert_eq!(
            engine.current_url().await.unwrap(),
            "https://example.com/about"
        );
    }

    #[tokio::test]
    async fn screenshot_changes_with_state() {
        let engine = MockRenderEngine::new((1280, 720));
        engine.navigate("https://example.com").await.unwrap();
        let before = engine.screenshot_png().await.unwrap();
        assert!(!before.is_empty());

        engine.scroll_by(0, 200).await.unwrap();
        let after = engine.screenshot_png().await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn operations_fail_after_close() {
        let engine = MockRenderEngine::new((1280, 720));
        assert!(engine.close().await.unwrap());
        // Second close reports already-closed.
        assert!(!engine.close().await.unwrap());

        assert!(matches!(
            engine.navigate("https://example.com").await,
            Err(EngineError::Closed)
        ));
        assert!(matches!(
            engine.screenshot_png().await,
            Err(EngineError::Closed)
        ));
    }

    #[tokio::test]
    async fn navigation_failure_is_one_shot() {
        let engine = MockRenderEngine::new((1280, 720));
        engine.fail_next_navigation("dns error").await;

        assert!(matches!(
            engine.navigate("https://bad.example").await,
            Err(EngineError::Navigation(_))
        ));
        // Next attempt succeeds again.
        engine.navigate("https://example.com").await.unwrap();
    }

    #[tokio::test]
    async fn navigation_delay_is_one_shot() {
        let engine = MockRenderEngine::new((1280, 720));
        engine.delay_next_navigation(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        engine.navigate("https://example.com").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));

        let started = std::time::Instant::now();
        engine.navigate("https://example.com/fast").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn screenshot_size_tracks_viewport() {
        let engine = MockRenderEngine::new((1280, 720));
        engine.navigate("https://example.com").await.unwrap();
        let png = engine.screenshot_png().await.unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(image::GenericImageView::dimensions(&img), (160, 90));

        let small = MockRenderEngine::new((640, 480));
        let png = small.screenshot_png().await.unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(image::GenericImageView::dimensions(&img), (80, 60));
    }

    #[tokio::test]
    async fn op_log_records_order() {
        let engine = MockRenderEngine::new((1280, 720));
        engine.navigate("https://example.com").await.unwrap();
        engine.click(0.5, 0.5).await.unwrap();
        engine.scroll_by(0, 100).await.unwrap();
        engine.press_key("Enter").await.unwrap();

        let ops = engine.operations().await;
        assert_eq!(ops.len(), 4);
        assert!(ops[0].starts_with("navigate:"));
        assert!(ops[1].starts_with("click:"));
        assert!(ops[2].starts_with("scroll:"));
        assert_eq!(ops[3], "keypress:Enter");
    }
}
