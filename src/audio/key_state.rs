//! Optional keyboard activity probe.
//!
//! Platforms that can sample key state (X11 etc.) plug in a [`KeyStateProbe`]; the
//! record loop forwards the result to the frame buffer as typing status. Without one
//! the device reports "not typing".

pub trait KeyStateProbe: Send {
    /// True if any key went down since the previous call.
    fn key_pressed(&mut self) -> bool;
}

/// Diffs successive 256-bit key maps, the way X11's `XQueryKeymap` reports them.
pub struct KeymapDiff<F> {
    query: F,
    previous: [u8; 32],
}

impl<F> KeymapDiff<F>
where
    F: FnMut() -> Option<[u8; 32]> + Send,
{
    pub fn new(query: F) -> Self {
        Self {
            query,
            previous: [0; 32],
        }
    }
}

impl<F> KeyStateProbe for KeymapDiff<F>
where
    F: FnMut() -> Option<[u8; 32]> + Send,
{
    fn key_pressed(&mut self) -> bool {
        let Some(current) = (self.query)() else {
            return false;
        };
        // 只关心新按下的键
        let pressed = current
            .iter()
            .zip(self.previous.iter())
            .any(|(now, before)| now & !before != 0);
        self.previous = current;
        pressed
    }
}
